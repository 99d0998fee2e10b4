//! Realtime-safe MIDI output client.
//!
//! A [`Client`] registers with an audio server, owns one MIDI output port and
//! forwards messages queued from any thread into the port buffer on the
//! server's realtime thread. The realtime side never allocates, locks or logs.
//!
//! Server backends:
//! - [`OfflineServer`]: in-process, software clock, event capture
//! - `JackServer`: JACK, with the `jack` feature

pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod server;

pub use callback::OutputProcessor;
pub use client::{Client, Delivery};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_CLIENT_NAME, DEFAULT_PORT_NAME};
pub use error::{ClientError, Error, Result, Stage};
pub use server::{
    AudioServer, BufferFull, CapturedEvent, ClockHandle, ConnectOptions, DefaultServer,
    LifecycleEvent, OfflineServer, OfflineServerConfig, PeriodBuffer, ServerConnection, Status,
    MIN_PERIOD,
};

#[cfg(feature = "jack")]
pub use server::{JackConnection, JackServer};

pub use midisend_core::MidiMessage;
