//! Test helpers and fixtures for midisend integration tests
//!
//! Everything runs against the offline server with manual period control, so
//! no audio server is needed in CI.

#![allow(dead_code)]

use midisend::prelude::*;
use midisend::CapturedEvent;

/// Frames per period for deterministic tests.
pub const TEST_PERIOD_FRAMES: u32 = 128;

/// The Dm7 voicing the demo plays.
pub const DM7: [u8; 4] = [50, 53, 57, 60];

/// Offline server with a small period and default buffers.
pub fn test_server() -> OfflineServer {
    OfflineServer::new(OfflineServerConfig {
        period_frames: TEST_PERIOD_FRAMES,
        ..OfflineServerConfig::default()
    })
}

/// Open a client with default settings on `server`.
pub fn test_client(server: &OfflineServer, name: &str) -> Client<OfflineServer> {
    Client::open_with(server.clone(), ClientConfig::new(name))
        .expect("Failed to open test client")
}

/// Run periods until nothing more is written, returning everything captured
/// for `client`.
pub fn run_until_idle(server: &OfflineServer, client: &str) -> Vec<CapturedEvent> {
    while server.run_period() > 0 {}
    server.take_captured(client)
}

/// Raw bytes of captured events, in output order.
pub fn captured_bytes(events: &[CapturedEvent]) -> Vec<Vec<u8>> {
    events
        .iter()
        .map(|event| event.message.as_bytes().to_vec())
        .collect()
}

/// Install a fmt subscriber once so `RUST_LOG` works in tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
