//! Multi-producer stress tests against a single draining consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use midisend_core::{event_queue_with_capacity, MidiMessage};

const PRODUCERS: u8 = 4;
const PER_PRODUCER: u16 = 1000;

/// Unique per (producer, index): channel carries the producer, data bytes the index.
fn tagged(producer: u8, index: u16) -> MidiMessage {
    let hi = (index / 128) as u8;
    let lo = (index % 128) as u8;
    MidiMessage::from_bytes(&[0x90 | producer, hi, lo]).unwrap()
}

#[test]
fn concurrent_producers_lose_and_duplicate_nothing() {
    // Large enough that no push can fail.
    let (producer, mut consumer) = event_queue_with_capacity(4096);
    let finished = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let producer = producer.clone();
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    assert!(producer.try_push(tagged(p, i)));
                }
                finished.fetch_add(1, Ordering::Release);
            })
        })
        .collect();

    let mut consumed = Vec::with_capacity(PRODUCERS as usize * PER_PRODUCER as usize);
    loop {
        let done = finished.load(Ordering::Acquire) == PRODUCERS as usize;
        consumer.drain_into(&mut consumed, 64);
        if done && consumer.is_empty() {
            // One more pass picks up anything published after the check.
            consumer.drain_into(&mut consumed, usize::MAX);
            break;
        }
        thread::yield_now();
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        consumed.len(),
        PRODUCERS as usize * PER_PRODUCER as usize
    );

    let mut counts: HashMap<MidiMessage, usize> = HashMap::new();
    for msg in &consumed {
        *counts.entry(*msg).or_default() += 1;
    }
    for p in 0..PRODUCERS {
        for i in 0..PER_PRODUCER {
            assert_eq!(counts.get(&tagged(p, i)), Some(&1), "producer {} index {}", p, i);
        }
    }
}

#[test]
fn per_producer_order_is_preserved() {
    let (producer, mut consumer) = event_queue_with_capacity(8192);

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let producer = producer.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    while !producer.try_push(tagged(p, i)) {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut consumed = Vec::new();
    consumer.drain_into(&mut consumed, usize::MAX);

    let mut next = [0u16; PRODUCERS as usize];
    for msg in consumed {
        let bytes = msg.as_bytes();
        let p = (bytes[0] & 0x0F) as usize;
        let index = bytes[1] as u16 * 128 + bytes[2] as u16;
        assert_eq!(index, next[p], "producer {} out of order", p);
        next[p] += 1;
    }
    assert!(next.iter().all(|&n| n == PER_PRODUCER));
}

#[test]
fn small_queue_under_pressure_never_corrupts() {
    // Pushes may fail here; whatever is accepted must arrive intact and once.
    let (producer, mut consumer) = event_queue_with_capacity(16);
    let accepted = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let producer = producer.clone();
            let accepted = Arc::clone(&accepted);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    if producer.try_push(tagged(p, i)) {
                        accepted.fetch_add(1, Ordering::Relaxed);
                    }
                }
                finished.fetch_add(1, Ordering::Release);
            })
        })
        .collect();

    let mut consumed = Vec::new();
    while finished.load(Ordering::Acquire) < PRODUCERS as usize || !consumer.is_empty() {
        consumer.drain_into(&mut consumed, 8);
        assert!(consumer.len() <= 16);
    }
    for handle in handles {
        handle.join().unwrap();
    }
    consumer.drain_into(&mut consumed, usize::MAX);

    assert_eq!(consumed.len(), accepted.load(Ordering::Relaxed));
    let mut seen = std::collections::HashSet::new();
    for msg in consumed {
        assert!(seen.insert(msg), "duplicate {}", msg);
    }
}
