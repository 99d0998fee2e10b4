//! Boundary to the audio server.
//!
//! A client is built in four steps against a [`ServerConnection`]: connect,
//! register the output port, hand over the process callback, activate. The
//! server then calls [`OutputProcessor::process`] once per period on its own
//! realtime thread with that period's MIDI output buffer.
//!
//! - [`OfflineServer`]: in-process server with a software clock, capture and
//!   failure injection
//! - `JackServer`: JACK (feature `jack`)

mod offline;
pub use offline::{
    CapturedEvent, ClockHandle, LifecycleEvent, OfflineConnection, OfflinePort, OfflineServer,
    OfflineServerConfig, MIN_PERIOD,
};

#[cfg(feature = "jack")]
mod jack;
#[cfg(feature = "jack")]
pub use self::jack::{JackConnection, JackServer};

use midisend_core::MidiMessage;

use crate::callback::OutputProcessor;

/// Status code reported by the server. Zero means no detail.
pub type Status = i32;

/// The period's output buffer has no room for another event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull;

/// Per-period MIDI output buffer, as handed to the process callback.
///
/// Implementations must not allocate or block: they run on the realtime thread.
pub trait PeriodBuffer {
    /// Discard anything written earlier in this period.
    fn clear(&mut self);

    /// Write `message` at `frame` within the period.
    fn write(&mut self, frame: u32, message: &MidiMessage) -> Result<(), BufferFull>;

    /// Largest event that still fits in this period, in bytes. Zero once the
    /// buffer is full.
    fn max_event_size(&self) -> usize;
}

/// Options passed to [`AudioServer::connect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Fail instead of starting a server when none is running.
    pub no_start_server: bool,
}

/// An audio server clients can connect to.
pub trait AudioServer {
    type Connection: ServerConnection;

    /// Opens a connection under `name`; the server may assign another name.
    fn connect(&self, name: &str, options: ConnectOptions) -> Result<Self::Connection, Status>;
}

/// One open connection to the server.
///
/// Dropping a connection must release everything it still holds, the same
/// as `disconnect`.
pub trait ServerConnection: Send + 'static {
    type Port: Send + 'static;

    /// Name the server assigned; may differ from the requested one.
    fn client_name(&self) -> &str;

    /// Registers the MIDI output port.
    fn register_output_port(&mut self, name: &str) -> Result<Self::Port, Status>;

    /// On error the connection releases `port` itself.
    fn register_process_callback(
        &mut self,
        port: Self::Port,
        processor: OutputProcessor,
    ) -> Result<(), Status>;

    /// Starts calling the process callback every period.
    fn activate(&mut self) -> Result<(), Status>;

    /// Once this returns the process callback never runs again.
    fn deactivate(&mut self);

    /// Releases the callback, ports and the connection, in that order.
    fn disconnect(self);
}

/// Server used by `Client::open`: JACK with feature `jack`, otherwise the
/// offline server.
#[cfg(feature = "jack")]
pub type DefaultServer = JackServer;

/// Server used by `Client::open`: JACK with feature `jack`, otherwise the
/// offline server.
#[cfg(not(feature = "jack"))]
pub type DefaultServer = OfflineServer;

#[cfg(feature = "jack")]
pub(crate) fn default_server() -> DefaultServer {
    JackServer
}

/// A private server nobody else can drive, so it runs its own clock.
#[cfg(not(feature = "jack"))]
pub(crate) fn default_server() -> DefaultServer {
    OfflineServer::clocked()
}
