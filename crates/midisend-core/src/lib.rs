//! Core types for midisend.
//!
//! - **Messages**: fixed-size MIDI 1.0 wire messages and the channel-voice encoder
//! - **Event queue**: bounded lock-free hand-off from caller threads to the
//!   realtime process callback
//!
//! Nothing here allocates after construction or takes a lock, so both halves
//! are safe to use from a realtime audio thread.
//!
//! # Example
//!
//! ```
//! use midisend_core::{event_queue_with_capacity, MidiMessage};
//!
//! let (producer, mut consumer) = event_queue_with_capacity(16);
//! let msg = MidiMessage::note_on(60, 100, 0)?;
//! assert!(producer.try_push(msg));
//!
//! let mut drained = Vec::new();
//! assert_eq!(consumer.drain_into(&mut drained, 10), 1);
//! assert_eq!(drained[0].as_bytes(), &[0x90, 60, 100]);
//! # Ok::<(), midisend_core::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod message;
pub use message::{
    MidiMessage, NoteBuilder, DEFAULT_NOTE_OFF_VELOCITY, DEFAULT_NOTE_ON_VELOCITY,
    MAX_MESSAGE_LEN,
};

pub mod queue;
pub use queue::{
    event_queue, event_queue_with_capacity, EventConsumer, EventProducer, EventQueue, EventSink,
    SinkFn, DEFAULT_CAPACITY,
};
