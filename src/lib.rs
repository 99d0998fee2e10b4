//! # midisend - Realtime MIDI output
//!
//! Send MIDI messages from ordinary threads to an output port of a low-latency
//! audio server without ever blocking the server's realtime thread.
//!
//! ## Architecture
//!
//! midisend is an umbrella crate over:
//! - **midisend-core** - MIDI message encoding and the lock-free event queue
//! - **midisend-client** - Server connection, output port, process callback
//!
//! ## Quick Start
//!
//! ```
//! use midisend::prelude::*;
//!
//! let server = OfflineServer::default();
//! let client = Client::open_with(server.clone(), ClientConfig::new("keys"))?;
//!
//! let chord = [50, 53, 57, 60];
//! for pitch in chord {
//!     let _ = client.send(MidiMessage::note_on_builder(pitch).velocity(50).build()?)?;
//! }
//! server.run_period();
//! assert_eq!(server.take_captured("keys").len(), chord.len());
//! # Ok::<(), midisend::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `jack` - JACK backend; `Client::open` then connects to JACK instead of
//!   the in-process offline server

pub use midisend_core as core;

pub use midisend_core::{
    event_queue, event_queue_with_capacity, EventConsumer, EventProducer, EventQueue, EventSink,
    MidiMessage, NoteBuilder, SinkFn,
};

pub use midisend_client as client;

pub use midisend_client::{
    AudioServer, CapturedEvent, Client, ClientConfig, ClientConfigBuilder, ClientError,
    ClockHandle, Delivery, LifecycleEvent, OfflineServer, OfflineServerConfig, OutputProcessor,
    PeriodBuffer, ServerConnection, Stage,
};

#[cfg(feature = "jack")]
pub use midisend_client::JackServer;

pub mod error;
pub use error::{Error, Result};

pub mod prelude {
    // Client
    pub use crate::{Client, ClientConfig, Delivery};

    // Messages
    pub use crate::MidiMessage;

    // Servers
    pub use crate::{OfflineServer, OfflineServerConfig};

    #[cfg(feature = "jack")]
    pub use crate::JackServer;
}
