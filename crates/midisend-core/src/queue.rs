//! Lock-free bounded queue handing MIDI messages to the realtime thread.
//!
//! - Producers: any number of non-realtime threads (`EventProducer` is `Clone`)
//! - Consumer: exactly one, the server's process callback (`EventConsumer`)
//!
//! Backed by `crossbeam`'s `ArrayQueue`: producers claim a slot with a
//! compare-and-swap on the tail, the consumer advances the head, and neither
//! side ever waits on the other. A full queue fails the push; an empty queue
//! ends the drain.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::message::MidiMessage;

/// Slots in a queue built by [`event_queue`].
pub const DEFAULT_CAPACITY: usize = 256;

/// Bounded queue of [`MidiMessage`]s. Allocated once, never resized.
///
/// Use [`split`](Self::split) to get the producer and consumer halves.
pub struct EventQueue {
    slots: ArrayQueue<MidiMessage>,
}

impl EventQueue {
    /// # Panics
    /// If `capacity` is zero or not a power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "event queue capacity must be a power of two, got {}",
            capacity
        );
        Self {
            slots: ArrayQueue::new(capacity),
        }
    }

    /// Consumes the queue, returning its two halves.
    pub fn split(self) -> (EventProducer, EventConsumer) {
        let queue = Arc::new(self);
        (
            EventProducer {
                queue: Arc::clone(&queue),
            },
            EventConsumer { queue },
        )
    }

    /// Fixed number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Approximate while producers or the consumer are running.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// Destination for drained messages.
///
/// The consumer asks [`has_room`](Self::has_room) before a message leaves the
/// queue, so a sink without room leaves it at the head for the next drain.
pub trait EventSink {
    /// Whether one more message of up to [`MAX_MESSAGE_LEN`] bytes fits now.
    ///
    /// [`MAX_MESSAGE_LEN`]: crate::MAX_MESSAGE_LEN
    fn has_room(&self) -> bool;

    /// Takes a message. Only called right after `has_room` returned `true`.
    fn accept(&mut self, message: MidiMessage);
}

/// Collects everything. Allocates, so not for the realtime thread.
impl EventSink for Vec<MidiMessage> {
    fn has_room(&self) -> bool {
        true
    }

    fn accept(&mut self, message: MidiMessage) {
        self.push(message);
    }
}

/// Adapts a closure into an unbounded [`EventSink`].
pub struct SinkFn<F>(pub F);

impl<F> EventSink for SinkFn<F>
where
    F: FnMut(MidiMessage),
{
    #[inline]
    fn has_room(&self) -> bool {
        true
    }

    #[inline]
    fn accept(&mut self, message: MidiMessage) {
        (self.0)(message)
    }
}

/// Producer side -- push from non-realtime threads. Clone freely.
#[derive(Clone)]
pub struct EventProducer {
    queue: Arc<EventQueue>,
}

impl EventProducer {
    /// Returns `false` if the queue is full; the message is dropped.
    /// Never blocks.
    #[inline]
    pub fn try_push(&self, message: MidiMessage) -> bool {
        self.queue.slots.push(message).is_ok()
    }

    /// Messages waiting for the consumer. Approximate under concurrency.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Fixed number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl std::fmt::Debug for EventProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventProducer").field(&self.queue).finish()
    }
}

/// Consumer side -- drain from the realtime thread. There is exactly one.
pub struct EventConsumer {
    queue: Arc<EventQueue>,
}

impl EventConsumer {
    /// Moves up to `max_count` messages into `sink`, oldest first, stopping
    /// early when the queue is empty or the sink has no room. Returns the
    /// number of messages moved.
    ///
    /// RT-safe: no allocation (given an RT-safe sink), no locks, at most
    /// `max_count` iterations.
    pub fn drain_into<S>(&mut self, sink: &mut S, max_count: usize) -> usize
    where
        S: EventSink + ?Sized,
    {
        let mut count = 0;
        while count < max_count && sink.has_room() {
            let Some(message) = self.queue.slots.pop() else {
                break;
            };
            sink.accept(message);
            count += 1;
        }
        count
    }

    /// Removes the oldest message, if any.
    #[inline]
    pub fn pop(&mut self) -> Option<MidiMessage> {
        self.queue.slots.pop()
    }

    /// Messages waiting. Approximate while producers are running.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Fixed number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl std::fmt::Debug for EventConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventConsumer").field(&self.queue).finish()
    }
}

/// Queue with [`DEFAULT_CAPACITY`] slots, already split.
pub fn event_queue() -> (EventProducer, EventConsumer) {
    event_queue_with_capacity(DEFAULT_CAPACITY)
}

/// # Panics
/// If `capacity` is zero or not a power of two.
pub fn event_queue_with_capacity(capacity: usize) -> (EventProducer, EventConsumer) {
    EventQueue::with_capacity(capacity).split()
}
