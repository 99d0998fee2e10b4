//! # Dm7 Chord
//!
//! Plays a Dm7 chord (D3, F3, A3, C4) on the client's `events-out` port a
//! few times: 800 ms rest, chord on, 200 ms held, chord off.
//!
//! **Concepts:** `Client::open`, `MidiMessage` builders, note-on/note-off
//!
//! Without the `jack` feature the chord goes to the in-process offline server
//! and the captured events are logged:
//! ```bash
//! RUST_LOG=debug cargo run --example dm7_chord
//! ```
//!
//! With JACK (connect `dm7-chord:events-out` to a synth to hear it):
//! ```bash
//! cargo run --example dm7_chord --features jack
//! ```

use std::thread;
use std::time::Duration;

use midisend::prelude::*;

const CHORD: [u8; 4] = [50, 53, 57, 60];
const VELOCITY: u8 = 50;
const ROUNDS: usize = 4;

#[cfg(not(feature = "jack"))]
fn main() -> midisend::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server = OfflineServer::default();
    let _clock = server.start_clock()?;
    let client = Client::open_with(server.clone(), ClientConfig::new("dm7-chord"))?;

    play(&client)?;
    client.close();

    for event in server.take_captured("dm7-chord") {
        tracing::info!(
            period = event.period,
            frame = event.frame,
            "captured {}",
            event.message
        );
    }
    Ok(())
}

#[cfg(feature = "jack")]
fn main() -> midisend::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = Client::open("dm7-chord")?;
    play(&client)?;
    client.close();
    Ok(())
}

fn play<S: midisend::AudioServer>(client: &Client<S>) -> midisend::Result<()> {
    for round in 0..ROUNDS {
        thread::sleep(Duration::from_millis(800));
        tracing::info!(round, "chord on");

        for pitch in CHORD {
            let msg = MidiMessage::note_on_builder(pitch).velocity(VELOCITY).build()?;
            if client.send(msg)? == Delivery::Dropped {
                tracing::warn!(pitch, "note-on dropped");
            }
        }

        thread::sleep(Duration::from_millis(200));

        for pitch in CHORD {
            let msg = MidiMessage::note_off_builder(pitch).build()?;
            if client.send(msg)? == Delivery::Dropped {
                tracing::warn!(pitch, "note-off dropped");
            }
        }
    }

    // Let the final period pick up the note-offs before closing.
    thread::sleep(Duration::from_millis(50));
    Ok(())
}
