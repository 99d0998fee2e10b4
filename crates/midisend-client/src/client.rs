//! The MIDI output client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use midisend_core::{EventProducer, EventQueue, MidiMessage};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::callback::OutputProcessor;
use crate::config::ClientConfig;
use crate::error::{ClientError, Error, Result, Stage};
use crate::server::{default_server, AudioServer, ConnectOptions, DefaultServer, ServerConnection};

/// What happened to a message handed to [`Client::send_message`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the next period.
    Queued,
    /// The event queue was full; the message was discarded.
    Dropped,
}

impl Delivery {
    /// `true` for [`Delivery::Queued`].
    pub fn is_queued(self) -> bool {
        self == Delivery::Queued
    }
}

/// A client registered with the audio server, owning one MIDI output port.
///
/// A `Client` only exists once every construction stage succeeded. Messages
/// sent from any thread are queued and written to the output port at the
/// start of the next period. `Client` is `Sync`, so it can be shared across
/// threads behind an `Arc` without further locking.
///
/// ```
/// use midisend_client::{Client, ClientConfig, OfflineServer};
///
/// let server = OfflineServer::default();
/// let client = Client::open_with(server.clone(), ClientConfig::new("keys"))?;
/// let _ = client.send_message(&[0x90, 60, 100])?;
/// server.run_period();
/// assert_eq!(server.take_captured("keys")[0].message.as_bytes(), &[0x90, 60, 100]);
/// client.close();
/// # Ok::<(), midisend_client::Error>(())
/// ```
pub struct Client<S: AudioServer = DefaultServer> {
    server: S,
    name: String,
    port_name: String,
    producer: EventProducer,
    open: AtomicBool,
    dropped: AtomicU64,
    connection: Mutex<Option<S::Connection>>,
}

impl Client<DefaultServer> {
    /// Opens a client named `name` on the default server with default settings.
    ///
    /// Without the `jack` feature this is a private [`OfflineServer`] that runs
    /// its own clock while the client is open; reach it through
    /// [`server`](Client::server) to inspect what was written.
    ///
    /// [`OfflineServer`]: crate::OfflineServer
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with(default_server(), ClientConfig::new(name))
    }
}

impl<S: AudioServer> Client<S> {
    /// Connects to `server`, registers the output port and process callback,
    /// and activates. If a stage fails, everything acquired so far is
    /// released in reverse order and the failing stage is reported.
    pub fn open_with(server: S, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        debug!(stage = %Stage::Connect, client = %config.name, "opening client");
        let options = ConnectOptions {
            no_start_server: config.no_start_server,
        };
        let mut connection = server
            .connect(&config.name, options)
            .map_err(|status| failed(Stage::Connect, status))?;

        debug!(stage = %Stage::RegisterPort, port = %config.port_name, "opening client");
        let port = match connection.register_output_port(&config.port_name) {
            Ok(port) => port,
            Err(status) => return Err(abort(connection, Stage::RegisterPort, status)),
        };

        let (producer, consumer) = EventQueue::with_capacity(config.queue_capacity).split();
        let processor = OutputProcessor::new(consumer, config.max_events_per_period);

        debug!(stage = %Stage::RegisterCallback, "opening client");
        if let Err(status) = connection.register_process_callback(port, processor) {
            return Err(abort(connection, Stage::RegisterCallback, status));
        }

        debug!(stage = %Stage::Activate, "opening client");
        if let Err(status) = connection.activate() {
            return Err(abort(connection, Stage::Activate, status));
        }

        let name = connection.client_name().to_string();
        info!(
            client = %name,
            port = %config.port_name,
            capacity = config.queue_capacity,
            "client opened"
        );

        Ok(Self {
            server,
            name,
            port_name: config.port_name,
            producer,
            open: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Queues raw MIDI bytes (1 to 3, starting with a status byte).
    ///
    /// Validation comes first: bad data is `InvalidArgument` even on a closed
    /// client. A full queue is not an error, see [`Delivery::Dropped`].
    pub fn send_message(&self, data: &[u8]) -> Result<Delivery> {
        let message = MidiMessage::from_bytes(data)?;
        self.send(message)
    }

    /// Queues an already built message.
    ///
    /// `Queued` means the message is in the queue, not yet written; a later
    /// [`close`](Self::close) discards whatever is still pending. A send that
    /// races with `close` returns `ClientClosed`, whether or not its message
    /// made it out before the callback stopped.
    pub fn send(&self, message: MidiMessage) -> Result<Delivery> {
        if !self.open.load(Ordering::Acquire) {
            return Err(Error::ClientClosed);
        }

        trace!(client = %self.name, "sending message: {}", message);
        if self.producer.try_push(message) {
            if !self.open.load(Ordering::Acquire) {
                return Err(Error::ClientClosed);
            }
            Ok(Delivery::Queued)
        } else {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(client = %self.name, %message, dropped, "event queue full, message dropped");
            Ok(Delivery::Dropped)
        }
    }

    /// Deactivates, then releases the port and the connection. Safe to call
    /// more than once; only the first call does anything. Once it returns the
    /// process callback never runs again.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(mut connection) = self.connection.lock().take() {
            connection.deactivate();
            connection.disconnect();
        }
        info!(
            client = %self.name,
            dropped = self.dropped_count(),
            "client closed"
        );
    }

    /// Name the server assigned, which may differ from the requested one.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the MIDI output port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// `false` once [`close`](Self::close) has started.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Messages queued but not yet written. Approximate while other threads
    /// are sending.
    pub fn pending(&self) -> usize {
        self.producer.len()
    }

    /// Messages dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Event queue slots.
    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    /// The server this client was opened on.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: AudioServer> Drop for Client<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: AudioServer> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("port_name", &self.port_name)
            .field("open", &self.is_open())
            .field("pending", &self.pending())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

fn failed(stage: Stage, status: crate::server::Status) -> Error {
    warn!(%stage, status, "client open failed");
    ClientError::at(stage, status).into()
}

/// Tears down a partially built connection. The connection already released
/// anything the failed stage acquired.
fn abort<C: ServerConnection>(connection: C, stage: Stage, status: crate::server::Status) -> Error {
    let mut connection = connection;
    connection.deactivate();
    connection.disconnect();
    failed(stage, status)
}
