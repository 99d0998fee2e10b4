//! Realtime process callback: event queue -> period output buffer.

use midisend_core::{EventConsumer, EventSink, MidiMessage, MAX_MESSAGE_LEN};

use crate::server::PeriodBuffer;

/// Owns the consumer side of a client's event queue. The server calls
/// [`process`](Self::process) once per period on its realtime thread.
///
/// RT-safe: no allocation, no locks, no I/O, no logging.
pub struct OutputProcessor {
    consumer: EventConsumer,
    max_events_per_period: usize,
}

impl OutputProcessor {
    pub(crate) fn new(consumer: EventConsumer, max_events_per_period: usize) -> Self {
        Self {
            consumer,
            max_events_per_period,
        }
    }

    /// Clears `buffer`, then writes queued messages at frame 0 in FIFO order
    /// until the per-period limit is hit, the buffer is full, or the queue is
    /// empty. Whatever does not fit stays queued for the next period.
    pub fn process(&mut self, _frames: u32, buffer: &mut dyn PeriodBuffer) -> usize {
        buffer.clear();
        let mut sink = BufferSink { buffer };
        self.consumer
            .drain_into(&mut sink, self.max_events_per_period)
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.consumer.len()
    }

    #[inline]
    pub fn max_events_per_period(&self) -> usize {
        self.max_events_per_period
    }
}

impl std::fmt::Debug for OutputProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputProcessor")
            .field("pending", &self.pending())
            .field("max_events_per_period", &self.max_events_per_period)
            .finish()
    }
}

struct BufferSink<'a> {
    buffer: &'a mut dyn PeriodBuffer,
}

impl EventSink for BufferSink<'_> {
    #[inline]
    fn has_room(&self) -> bool {
        self.buffer.max_event_size() >= MAX_MESSAGE_LEN
    }

    #[inline]
    fn accept(&mut self, message: MidiMessage) {
        // Room was checked before the message left the queue.
        let _ = self.buffer.write(0, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::BufferFull;
    use midisend_core::event_queue_with_capacity;

    /// Fixed-capacity buffer standing in for the server's.
    struct TestBuffer {
        events: Vec<(u32, MidiMessage)>,
        capacity: usize,
        clears: usize,
    }

    impl TestBuffer {
        fn new(capacity: usize) -> Self {
            Self {
                events: Vec::with_capacity(capacity),
                capacity,
                clears: 0,
            }
        }
    }

    impl PeriodBuffer for TestBuffer {
        fn clear(&mut self) {
            self.events.clear();
            self.clears += 1;
        }

        fn write(&mut self, frame: u32, message: &MidiMessage) -> Result<(), BufferFull> {
            if self.events.len() >= self.capacity {
                return Err(BufferFull);
            }
            self.events.push((frame, *message));
            Ok(())
        }

        fn max_event_size(&self) -> usize {
            if self.events.len() < self.capacity {
                MAX_MESSAGE_LEN
            } else {
                0
            }
        }
    }

    fn note(pitch: u8) -> MidiMessage {
        MidiMessage::note_on(pitch, 100, 0).unwrap()
    }

    #[test]
    fn test_writes_in_order_at_frame_zero() {
        let (producer, consumer) = event_queue_with_capacity(16);
        let mut processor = OutputProcessor::new(consumer, 16);
        let mut buffer = TestBuffer::new(16);

        producer.try_push(note(50));
        producer.try_push(note(53));

        assert_eq!(processor.process(256, &mut buffer), 2);
        assert_eq!(buffer.events, vec![(0, note(50)), (0, note(53))]);
        assert_eq!(buffer.clears, 1);
    }

    #[test]
    fn test_period_limit_leaves_rest_queued() {
        let (producer, consumer) = event_queue_with_capacity(16);
        let mut processor = OutputProcessor::new(consumer, 2);
        let mut buffer = TestBuffer::new(16);

        for pitch in 0..5 {
            producer.try_push(note(pitch));
        }

        assert_eq!(processor.process(256, &mut buffer), 2);
        assert_eq!(processor.pending(), 3);
        assert_eq!(processor.process(256, &mut buffer), 2);
        assert_eq!(buffer.events, vec![(0, note(2)), (0, note(3))]);
        assert_eq!(processor.process(256, &mut buffer), 1);
        assert_eq!(buffer.events, vec![(0, note(4))]);
        assert_eq!(processor.process(256, &mut buffer), 0);
        assert!(buffer.events.is_empty());
    }

    #[test]
    fn test_full_buffer_leaves_rest_queued() {
        let (producer, consumer) = event_queue_with_capacity(16);
        let mut processor = OutputProcessor::new(consumer, 100);
        let mut buffer = TestBuffer::new(3);

        for pitch in 0..4 {
            producer.try_push(note(pitch));
        }

        assert_eq!(processor.process(64, &mut buffer), 3);
        assert_eq!(processor.pending(), 1);
        assert_eq!(processor.process(64, &mut buffer), 1);
        assert_eq!(buffer.events, vec![(0, note(3))]);
    }

    #[test]
    fn test_empty_queue_still_clears_buffer() {
        let (_producer, consumer) = event_queue_with_capacity(4);
        let mut processor = OutputProcessor::new(consumer, 4);
        let mut buffer = TestBuffer::new(4);
        buffer.events.push((7, note(1)));

        assert_eq!(processor.process(128, &mut buffer), 0);
        assert!(buffer.events.is_empty());
    }
}
