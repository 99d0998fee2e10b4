//! Error types for message encoding.
//!
//! Every variant is an invalid argument: the caller handed over a value that
//! cannot be encoded as a MIDI 1.0 wire message. None of them are retryable.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {name} {value} is outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("invalid argument: MIDI messages are 1 to 3 bytes long, got {0}")]
    InvalidLength(usize),

    #[error("invalid argument: first byte {0:#04x} is not a status byte")]
    MissingStatus(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
