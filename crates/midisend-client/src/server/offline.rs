//! In-process audio server.
//!
//! Behaves like a minimal realtime server without touching audio hardware:
//! periods are run either by a software clock thread or one at a time with
//! [`OfflineServer::run_period`], every event written to a period buffer is
//! captured for inspection, and any construction stage can be told to fail
//! with a given status code. Connection lifecycle steps are recorded in
//! order so teardown can be checked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use midisend_core::{MidiMessage, MAX_MESSAGE_LEN};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AudioServer, BufferFull, ConnectOptions, PeriodBuffer, ServerConnection, Status};
use crate::callback::OutputProcessor;
use crate::error::Stage;

/// Status returned when a connection is used after it was released.
const STATUS_GONE: Status = -1;
/// Status returned when a second output port is requested.
const STATUS_PORT_EXISTS: Status = -2;
/// Status returned when the clock thread cannot be spawned.
const STATUS_NO_CLOCK: Status = -3;

/// Shortest period the clock runs at, whatever the configuration says.
pub const MIN_PERIOD: Duration = Duration::from_micros(50);

/// Settings for an [`OfflineServer`]. Missing fields take the defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineServerConfig {
    /// Frames per second, used to turn `period_frames` into wall time.
    pub sample_rate: u32,
    /// Frames per period, passed to the process callback.
    pub period_frames: u32,
    /// Events one period buffer holds; further writes fail.
    pub buffer_events: usize,
    /// Captured events kept per client until taken.
    pub capture_capacity: usize,
    /// Run periods from a clock thread whenever at least one client is
    /// active. When false, periods run only through
    /// [`OfflineServer::run_period`] or [`OfflineServer::start_clock`].
    pub run_clock: bool,
}

impl Default for OfflineServerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            period_frames: 256,
            buffer_events: 128,
            capture_capacity: 4096,
            run_clock: false,
        }
    }
}

impl OfflineServerConfig {
    /// Wall time of one period. Zero frames or a zero sample rate count as
    /// one, and the result is never shorter than [`MIN_PERIOD`].
    pub fn period_duration(&self) -> Duration {
        let frames = self.period_frames.max(1) as f64;
        let rate = self.sample_rate.max(1) as f64;
        Duration::from_secs_f64(frames / rate).max(MIN_PERIOD)
    }
}

/// An event as it left a client's output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedEvent {
    /// Index of the server period it was written in.
    pub period: u64,
    /// Frame offset within that period.
    pub frame: u32,
    pub message: MidiMessage,
}

/// One step in a connection's life, as recorded by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connected { client: String },
    PortRegistered { client: String, port: String },
    CallbackRegistered { client: String },
    Activated { client: String },
    Deactivated { client: String },
    CallbackReleased { client: String },
    PortUnregistered { client: String, port: String },
    Disconnected { client: String },
}

impl LifecycleEvent {
    /// Name of the client the step belongs to.
    pub fn client(&self) -> &str {
        match self {
            LifecycleEvent::Connected { client }
            | LifecycleEvent::PortRegistered { client, .. }
            | LifecycleEvent::CallbackRegistered { client }
            | LifecycleEvent::Activated { client }
            | LifecycleEvent::Deactivated { client }
            | LifecycleEvent::CallbackReleased { client }
            | LifecycleEvent::PortUnregistered { client, .. }
            | LifecycleEvent::Disconnected { client } => client,
        }
    }
}

struct OfflineBuffer {
    events: Vec<(u32, MidiMessage)>,
    capacity: usize,
}

impl OfflineBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }
}

impl PeriodBuffer for OfflineBuffer {
    fn clear(&mut self) {
        self.events.clear();
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

struct ClientSlot {
    id: u64,
    name: String,
    port: Option<String>,
    processor: Option<OutputProcessor>,
    active: bool,
    buffer: OfflineBuffer,
    capture: HeapProd<CapturedEvent>,
}

struct Capture {
    client: String,
    consumer: HeapCons<CapturedEvent>,
}

struct OfflineShared {
    config: OfflineServerConfig,
    /// Held for the whole of a period, so deactivation waits for a running callback.
    clients: Mutex<Vec<ClientSlot>>,
    captures: Mutex<Vec<Capture>>,
    failures: Mutex<HashMap<Stage, Status>>,
    lifecycle: Mutex<Vec<LifecycleEvent>>,
    /// Clock started for `run_clock`. Lock before `clients` when both are needed.
    clock: Mutex<Option<ClockHandle>>,
    next_id: AtomicU64,
    periods: AtomicU64,
    capture_overflows: AtomicU64,
}

impl OfflineShared {
    fn check(&self, stage: Stage) -> Result<(), Status> {
        match self.failures.lock().get(&stage) {
            Some(&status) => {
                debug!(%stage, status, "offline server failing stage");
                Err(status)
            }
            None => Ok(()),
        }
    }

    fn log(&self, event: LifecycleEvent) {
        self.lifecycle.lock().push(event);
    }

    fn active_count(&self) -> usize {
        self.clients.lock().iter().filter(|slot| slot.active).count()
    }

    /// Stops the `run_clock` thread once no client is active.
    fn stop_idle_clock(&self) {
        let handle = {
            let mut clock = self.clock.lock();
            if self.active_count() > 0 {
                return;
            }
            clock.take()
        };
        if handle.is_some() {
            debug!("offline server clock stopped, no active clients");
        }
        drop(handle);
    }

    fn run_period(&self) -> usize {
        let period = self.periods.fetch_add(1, Ordering::Relaxed);
        let frames = self.config.period_frames;
        let mut written = 0;

        let mut clients = self.clients.lock();
        for slot in clients.iter_mut().filter(|slot| slot.active) {
            let Some(processor) = slot.processor.as_mut() else {
                continue;
            };
            processor.process(frames, &mut slot.buffer);

            for &(frame, message) in &slot.buffer.events {
                let event = CapturedEvent {
                    period,
                    frame,
                    message,
                };
                if slot.capture.try_push(event).is_err() {
                    self.capture_overflows.fetch_add(1, Ordering::Relaxed);
                }
                written += 1;
            }
        }
        written
    }
}

fn spawn_clock(shared: &Arc<OfflineShared>) -> std::io::Result<ClockHandle> {
    let (commands, receiver) = bounded(1);
    let weak = Arc::downgrade(shared);
    let period = shared.config.period_duration();

    let thread = thread::Builder::new()
        .name("offline-server-clock".to_string())
        .spawn(move || clock_thread(weak, receiver, period))?;

    debug!(?period, "offline server clock started");
    Ok(ClockHandle {
        commands,
        thread: Some(thread),
    })
}

fn ensure_clock(shared: &Arc<OfflineShared>) -> std::io::Result<()> {
    let mut clock = shared.clock.lock();
    if clock.is_none() {
        *clock = Some(spawn_clock(shared)?);
    }
    Ok(())
}

/// In-process server for tests, demos and machines without an audio server.
///
/// Clone is cheap (Arc internally); clones are the same server.
///
/// ```
/// use midisend_client::{OfflineServer, Stage};
///
/// let server = OfflineServer::default();
/// server.fail_at(Stage::Activate, 5);
/// assert_eq!(server.live_clients(), 0);
/// ```
#[derive(Clone)]
pub struct OfflineServer {
    shared: Arc<OfflineShared>,
}

impl OfflineServer {
    pub fn new(config: OfflineServerConfig) -> Self {
        Self {
            shared: Arc::new(OfflineShared {
                config,
                clients: Mutex::new(Vec::new()),
                captures: Mutex::new(Vec::new()),
                failures: Mutex::new(HashMap::new()),
                lifecycle: Mutex::new(Vec::new()),
                clock: Mutex::new(None),
                next_id: AtomicU64::new(0),
                periods: AtomicU64::new(0),
                capture_overflows: AtomicU64::new(0),
            }),
        }
    }

    /// Default settings with `run_clock` on: periods run by themselves while
    /// any client is active.
    pub fn clocked() -> Self {
        Self::new(OfflineServerConfig {
            run_clock: true,
            ..OfflineServerConfig::default()
        })
    }

    pub fn config(&self) -> &OfflineServerConfig {
        &self.shared.config
    }

    /// Make `stage` fail with `status` until cleared.
    pub fn fail_at(&self, stage: Stage, status: Status) {
        self.shared.failures.lock().insert(stage, status);
    }

    /// Undo every [`fail_at`](Self::fail_at).
    pub fn clear_failures(&self) {
        self.shared.failures.lock().clear();
    }

    /// Run one period for every active client. Returns the number of events
    /// written across all output ports.
    pub fn run_period(&self) -> usize {
        self.shared.run_period()
    }

    /// Drive periods from a background thread at the configured period length
    /// until the returned handle is stopped or dropped.
    pub fn start_clock(&self) -> std::io::Result<ClockHandle> {
        spawn_clock(&self.shared)
    }

    /// Whether the `run_clock` thread is currently running.
    pub fn clock_running(&self) -> bool {
        self.shared.clock.lock().is_some()
    }

    /// Periods run so far.
    pub fn periods(&self) -> u64 {
        self.shared.periods.load(Ordering::Relaxed)
    }

    /// Events that did not fit in a client's capture buffer.
    pub fn capture_overflows(&self) -> u64 {
        self.shared.capture_overflows.load(Ordering::Relaxed)
    }

    /// Removes and returns everything captured so far for `client`.
    ///
    /// Captures outlive the connection until taken. When a new client takes
    /// over a released name, whatever the earlier client left is discarded.
    pub fn take_captured(&self, client: &str) -> Vec<CapturedEvent> {
        let mut captures = self.shared.captures.lock();
        let mut events = Vec::new();
        for capture in captures.iter_mut().filter(|c| c.client == client) {
            while let Some(event) = capture.consumer.try_pop() {
                events.push(event);
            }
        }
        events
    }

    /// Every lifecycle step recorded so far, oldest first.
    pub fn lifecycle(&self) -> Vec<LifecycleEvent> {
        self.shared.lifecycle.lock().clone()
    }

    /// Lifecycle steps of one client name.
    pub fn lifecycle_of(&self, client: &str) -> Vec<LifecycleEvent> {
        self.shared
            .lifecycle
            .lock()
            .iter()
            .filter(|event| event.client() == client)
            .cloned()
            .collect()
    }

    /// Connections not yet released.
    pub fn live_clients(&self) -> usize {
        self.shared.clients.lock().len()
    }

    /// Output ports still registered.
    pub fn live_ports(&self) -> usize {
        self.shared
            .clients
            .lock()
            .iter()
            .filter(|slot| slot.port.is_some())
            .count()
    }

    /// Clients whose callback runs each period.
    pub fn active_clients(&self) -> usize {
        self.shared.active_count()
    }
}

impl Default for OfflineServer {
    fn default() -> Self {
        Self::new(OfflineServerConfig::default())
    }
}

impl std::fmt::Debug for OfflineServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineServer")
            .field("config", &self.shared.config)
            .field("periods", &self.periods())
            .finish()
    }
}

/// Same-named clients get `-01`, `-02`, ... appended.
fn unique_name(clients: &[ClientSlot], requested: &str) -> String {
    let taken = |name: &str| clients.iter().any(|slot| slot.name == name);
    if !taken(requested) {
        return requested.to_string();
    }
    (1u32..)
        .map(|n| format!("{}-{:02}", requested, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| requested.to_string())
}

impl AudioServer for OfflineServer {
    type Connection = OfflineConnection;

    fn connect(&self, name: &str, _options: ConnectOptions) -> Result<OfflineConnection, Status> {
        self.shared.check(Stage::Connect)?;

        let config = &self.shared.config;
        let (capture, consumer) = HeapRb::new(config.capture_capacity.max(1)).split();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        let mut clients = self.shared.clients.lock();
        let assigned = unique_name(&clients, name);
        clients.push(ClientSlot {
            id,
            name: assigned.clone(),
            port: None,
            processor: None,
            active: false,
            buffer: OfflineBuffer::new(config.buffer_events),
            capture,
        });
        drop(clients);

        let mut captures = self.shared.captures.lock();
        captures.retain(|capture| capture.client != assigned);
        captures.push(Capture {
            client: assigned.clone(),
            consumer,
        });
        drop(captures);
        self.shared.log(LifecycleEvent::Connected {
            client: assigned.clone(),
        });
        debug!(client = %assigned, "offline client connected");

        Ok(OfflineConnection {
            id,
            name: assigned,
            shared: Arc::clone(&self.shared),
            released: false,
        })
    }
}

/// Token for a registered output port.
#[derive(Debug)]
pub struct OfflinePort {
    name: String,
}

impl OfflinePort {
    /// Port name as registered.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A client's connection to an [`OfflineServer`]. Dropping it releases the
/// client's slot.
pub struct OfflineConnection {
    id: u64,
    name: String,
    shared: Arc<OfflineShared>,
    released: bool,
}

impl OfflineConnection {
    fn with_slot<T>(&self, f: impl FnOnce(&mut ClientSlot) -> T) -> Result<T, Status> {
        let mut clients = self.shared.clients.lock();
        clients
            .iter_mut()
            .find(|slot| slot.id == self.id)
            .map(f)
            .ok_or(STATUS_GONE)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut clients = self.shared.clients.lock();
        let Some(index) = clients.iter().position(|slot| slot.id == self.id) else {
            return;
        };
        let mut slot = clients.remove(index);
        drop(clients);

        if slot.active {
            self.shared.log(LifecycleEvent::Deactivated {
                client: self.name.clone(),
            });
        }
        if slot.processor.take().is_some() {
            self.shared.log(LifecycleEvent::CallbackReleased {
                client: self.name.clone(),
            });
        }
        if let Some(port) = slot.port.take() {
            self.shared.log(LifecycleEvent::PortUnregistered {
                client: self.name.clone(),
                port,
            });
        }
        self.shared.log(LifecycleEvent::Disconnected {
            client: self.name.clone(),
        });
        debug!(client = %self.name, "offline client disconnected");

        if self.shared.config.run_clock {
            self.shared.stop_idle_clock();
        }
    }
}

impl ServerConnection for OfflineConnection {
    type Port = OfflinePort;

    fn client_name(&self) -> &str {
        &self.name
    }

    fn register_output_port(&mut self, name: &str) -> Result<OfflinePort, Status> {
        self.shared.check(Stage::RegisterPort)?;
        let client = self.name.clone();
        let shared = Arc::clone(&self.shared);

        self.with_slot(|slot| {
            if slot.port.is_some() {
                return Err(STATUS_PORT_EXISTS);
            }
            slot.port = Some(name.to_string());
            shared.log(LifecycleEvent::PortRegistered {
                client,
                port: name.to_string(),
            });
            Ok(OfflinePort {
                name: name.to_string(),
            })
        })?
    }

    fn register_process_callback(
        &mut self,
        port: OfflinePort,
        processor: OutputProcessor,
    ) -> Result<(), Status> {
        let client = self.name.clone();
        let shared = Arc::clone(&self.shared);

        if let Err(status) = self.shared.check(Stage::RegisterCallback) {
            self.with_slot(|slot| {
                if slot.port.take().is_some() {
                    shared.log(LifecycleEvent::PortUnregistered {
                        client,
                        port: port.name,
                    });
                }
            })?;
            return Err(status);
        }

        self.with_slot(|slot| {
            slot.processor = Some(processor);
            shared.log(LifecycleEvent::CallbackRegistered { client });
        })
    }

    fn activate(&mut self) -> Result<(), Status> {
        self.shared.check(Stage::Activate)?;
        let client = self.name.clone();
        let shared = Arc::clone(&self.shared);

        self.with_slot(|slot| {
            slot.active = true;
            shared.log(LifecycleEvent::Activated { client });
        })?;

        if self.shared.config.run_clock {
            if let Err(e) = ensure_clock(&self.shared) {
                warn!(client = %self.name, error = %e, "offline server clock failed to start");
                self.deactivate();
                return Err(STATUS_NO_CLOCK);
            }
        }
        Ok(())
    }

    fn deactivate(&mut self) {
        let client = self.name.clone();
        let shared = Arc::clone(&self.shared);

        let _ = self.with_slot(|slot| {
            if slot.active {
                slot.active = false;
                shared.log(LifecycleEvent::Deactivated { client });
            }
        });

        if self.shared.config.run_clock {
            self.shared.stop_idle_clock();
        }
    }

    fn disconnect(mut self) {
        self.release();
    }
}

impl Drop for OfflineConnection {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for OfflineConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineConnection")
            .field("name", &self.name)
            .field("released", &self.released)
            .finish()
    }
}

enum ClockCommand {
    Stop,
}

/// Running clock thread. Stops it when dropped.
pub struct ClockHandle {
    commands: Sender<ClockCommand>,
    thread: Option<JoinHandle<()>>,
}

impl ClockHandle {
    /// Stops the thread and waits for the period in flight to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(ClockCommand::Stop);
        if let Some(thread) = self.thread.take() {
            // The clock thread can end up dropping the last server reference.
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn clock_thread(shared: Weak<OfflineShared>, commands: Receiver<ClockCommand>, period: Duration) {
    loop {
        match commands.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => match shared.upgrade() {
                Some(shared) => {
                    shared.run_period();
                }
                None => break,
            },
            Ok(ClockCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midisend_core::event_queue_with_capacity;

    fn processor(capacity: usize, per_period: usize) -> (midisend_core::EventProducer, OutputProcessor) {
        let (producer, consumer) = event_queue_with_capacity(capacity);
        (producer, OutputProcessor::new(consumer, per_period))
    }

    fn open(server: &OfflineServer, name: &str) -> (OfflineConnection, midisend_core::EventProducer) {
        let mut conn = server.connect(name, ConnectOptions::default()).unwrap();
        let port = conn.register_output_port("events-out").unwrap();
        let (producer, processor) = processor(64, 64);
        conn.register_process_callback(port, processor).unwrap();
        conn.activate().unwrap();
        (conn, producer)
    }

    #[test]
    fn test_full_lifecycle_is_recorded_in_order() {
        let server = OfflineServer::default();
        let (conn, _producer) = open(&server, "a");
        assert_eq!(server.live_clients(), 1);
        assert_eq!(server.live_ports(), 1);

        conn.disconnect();
        assert_eq!(
            server.lifecycle_of("a"),
            vec![
                LifecycleEvent::Connected { client: "a".into() },
                LifecycleEvent::PortRegistered {
                    client: "a".into(),
                    port: "events-out".into()
                },
                LifecycleEvent::CallbackRegistered { client: "a".into() },
                LifecycleEvent::Activated { client: "a".into() },
                LifecycleEvent::Deactivated { client: "a".into() },
                LifecycleEvent::CallbackReleased { client: "a".into() },
                LifecycleEvent::PortUnregistered {
                    client: "a".into(),
                    port: "events-out".into()
                },
                LifecycleEvent::Disconnected { client: "a".into() },
            ]
        );
        assert_eq!(server.live_clients(), 0);
        assert_eq!(server.live_ports(), 0);
    }

    #[test]
    fn test_period_captures_written_events() {
        let server = OfflineServer::default();
        let (_conn, producer) = open(&server, "cap");

        producer.try_push(MidiMessage::note_on(60, 100, 0).unwrap());
        assert_eq!(server.run_period(), 1);
        assert_eq!(server.run_period(), 0);

        let captured = server.take_captured("cap");
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].period, 0);
        assert_eq!(captured[0].frame, 0);
        assert_eq!(captured[0].message.as_bytes(), &[0x90, 60, 100]);
        assert!(server.take_captured("cap").is_empty());
    }

    #[test]
    fn test_buffer_capacity_limits_period() {
        let server = OfflineServer::new(OfflineServerConfig {
            buffer_events: 2,
            ..OfflineServerConfig::default()
        });
        let (_conn, producer) = open(&server, "small");
        for pitch in 0..5 {
            producer.try_push(MidiMessage::note_on(pitch, 1, 0).unwrap());
        }

        assert_eq!(server.run_period(), 2);
        assert_eq!(server.run_period(), 2);
        assert_eq!(server.run_period(), 1);

        let periods: Vec<u64> = server
            .take_captured("small")
            .iter()
            .map(|e| e.period)
            .collect();
        assert_eq!(periods, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_inactive_client_is_not_processed() {
        let server = OfflineServer::default();
        let mut conn = server.connect("idle", ConnectOptions::default()).unwrap();
        let port = conn.register_output_port("out").unwrap();
        let (producer, processor) = processor(8, 8);
        conn.register_process_callback(port, processor).unwrap();

        producer.try_push(MidiMessage::note_on(1, 1, 0).unwrap());
        assert_eq!(server.run_period(), 0);

        conn.activate().unwrap();
        assert_eq!(server.run_period(), 1);

        conn.deactivate();
        producer.try_push(MidiMessage::note_on(2, 1, 0).unwrap());
        assert_eq!(server.run_period(), 0);
        assert_eq!(server.active_clients(), 0);
    }

    #[test]
    fn test_duplicate_names_are_renamed() {
        let server = OfflineServer::default();
        let first = server.connect("dup", ConnectOptions::default()).unwrap();
        let second = server.connect("dup", ConnectOptions::default()).unwrap();
        let third = server.connect("dup", ConnectOptions::default()).unwrap();
        assert_eq!(first.client_name(), "dup");
        assert_eq!(second.client_name(), "dup-01");
        assert_eq!(third.client_name(), "dup-02");
    }

    #[test]
    fn test_second_port_rejected() {
        let server = OfflineServer::default();
        let mut conn = server.connect("one-port", ConnectOptions::default()).unwrap();
        let _port = conn.register_output_port("a").unwrap();
        assert_eq!(
            conn.register_output_port("b").unwrap_err(),
            STATUS_PORT_EXISTS
        );
    }

    #[test]
    fn test_injected_failure_and_clear() {
        let server = OfflineServer::default();
        server.fail_at(Stage::Connect, 42);
        assert_eq!(
            server
                .connect("x", ConnectOptions::default())
                .map(|_| ())
                .unwrap_err(),
            42
        );
        server.clear_failures();
        assert!(server.connect("x", ConnectOptions::default()).is_ok());
    }

    #[test]
    fn test_dropping_connection_releases_everything() {
        let server = OfflineServer::default();
        {
            let (_conn, _producer) = open(&server, "scoped");
            assert_eq!(server.live_ports(), 1);
        }
        assert_eq!(server.live_clients(), 0);
        assert_eq!(server.live_ports(), 0);
        assert_eq!(
            server.lifecycle_of("scoped").last(),
            Some(&LifecycleEvent::Disconnected {
                client: "scoped".into()
            })
        );
    }

    #[test]
    fn test_clock_drives_periods() {
        let server = OfflineServer::new(OfflineServerConfig {
            sample_rate: 48_000,
            period_frames: 48,
            ..OfflineServerConfig::default()
        });
        let (_conn, producer) = open(&server, "clocked");
        producer.try_push(MidiMessage::note_on(60, 1, 0).unwrap());

        let clock = server.start_clock().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut captured = Vec::new();
        while captured.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
            captured = server.take_captured("clocked");
        }
        clock.stop();

        assert_eq!(captured.len(), 1);
        assert!(server.periods() >= 1);
    }

    #[test]
    fn test_reused_name_does_not_inherit_capture() {
        let server = OfflineServer::default();
        let (conn, producer) = open(&server, "x");
        producer.try_push(MidiMessage::note_on(1, 1, 0).unwrap());
        server.run_period();
        conn.disconnect();

        let (_conn, producer) = open(&server, "x");
        producer.try_push(MidiMessage::note_on(2, 2, 0).unwrap());
        server.run_period();

        let captured = server.take_captured("x");
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].message.as_bytes(), &[0x90, 2, 2]);
    }

    #[test]
    fn test_degenerate_period_is_clamped() {
        let zero_frames = OfflineServerConfig {
            period_frames: 0,
            ..OfflineServerConfig::default()
        };
        assert!(zero_frames.period_duration() >= MIN_PERIOD);

        let zero_rate = OfflineServerConfig {
            sample_rate: 0,
            ..OfflineServerConfig::default()
        };
        assert!(zero_rate.period_duration() >= MIN_PERIOD);
        assert!(zero_rate.period_duration() <= Duration::from_secs(257));

        let normal = OfflineServerConfig::default();
        assert_eq!(
            normal.period_duration(),
            Duration::from_secs_f64(256.0 / 48_000.0)
        );
    }

    #[test]
    fn test_clocked_server_runs_only_while_active() {
        let server = OfflineServer::clocked();
        assert!(!server.clock_running());

        let (first, producer) = open(&server, "one");
        assert!(server.clock_running());
        let (second, _other) = open(&server, "two");

        producer.try_push(MidiMessage::note_on(60, 1, 0).unwrap());
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut captured = Vec::new();
        while captured.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
            captured = server.take_captured("one");
        }
        assert_eq!(captured.len(), 1);

        first.disconnect();
        assert!(server.clock_running());
        second.disconnect();
        assert!(!server.clock_running());

        let periods = server.periods();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(server.periods(), periods);
    }
}
