//! Error types for the client.

use std::fmt;

use thiserror::Error;

use crate::server::Status;

/// Construction stage of a client, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Connect,
    RegisterPort,
    RegisterCallback,
    Activate,
}

impl Stage {
    /// Every stage, in the order `Client::open` runs them.
    pub const ALL: [Stage; 4] = [
        Stage::Connect,
        Stage::RegisterPort,
        Stage::RegisterCallback,
        Stage::Activate,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Connect => "connect",
            Stage::RegisterPort => "register port",
            Stage::RegisterCallback => "register process callback",
            Stage::Activate => "activate",
        })
    }
}

/// Why `Client::open` failed, with the status code the server reported.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    #[error("unknown error [server status: {status}]")]
    UnknownError { status: Status },

    #[error("could not create client [server status: {status}]")]
    ConnectionFailed { status: Status },

    #[error("could not register midi port [server status: {status}]")]
    PortRegistrationFailed { status: Status },

    #[error("could not register process callback [server status: {status}]")]
    CallbackRegistrationFailed { status: Status },

    #[error("could not activate client [server status: {status}]")]
    ActivationFailed { status: Status },
}

impl ClientError {
    /// The error for a failure at `stage`.
    pub fn at(stage: Stage, status: Status) -> Self {
        match stage {
            Stage::Connect => ClientError::ConnectionFailed { status },
            Stage::RegisterPort => ClientError::PortRegistrationFailed { status },
            Stage::RegisterCallback => ClientError::CallbackRegistrationFailed { status },
            Stage::Activate => ClientError::ActivationFailed { status },
        }
    }

    /// Decodes the numeric stage table (0 unknown, 1 connect, 2 port,
    /// 3 callback, 4 activate). Anything else is `UnknownError`.
    pub fn from_stage_code(code: i32, status: Status) -> Self {
        match code {
            1 => ClientError::ConnectionFailed { status },
            2 => ClientError::PortRegistrationFailed { status },
            3 => ClientError::CallbackRegistrationFailed { status },
            4 => ClientError::ActivationFailed { status },
            _ => ClientError::UnknownError { status },
        }
    }

    /// Inverse of [`from_stage_code`](Self::from_stage_code).
    pub fn stage_code(&self) -> i32 {
        match self {
            ClientError::UnknownError { .. } => 0,
            ClientError::ConnectionFailed { .. } => 1,
            ClientError::PortRegistrationFailed { .. } => 2,
            ClientError::CallbackRegistrationFailed { .. } => 3,
            ClientError::ActivationFailed { .. } => 4,
        }
    }

    /// `None` for `UnknownError`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ClientError::UnknownError { .. } => None,
            ClientError::ConnectionFailed { .. } => Some(Stage::Connect),
            ClientError::PortRegistrationFailed { .. } => Some(Stage::RegisterPort),
            ClientError::CallbackRegistrationFailed { .. } => Some(Stage::RegisterCallback),
            ClientError::ActivationFailed { .. } => Some(Stage::Activate),
        }
    }

    /// Status code the server reported.
    pub fn status(&self) -> Status {
        match *self {
            ClientError::UnknownError { status }
            | ClientError::ConnectionFailed { status }
            | ClientError::PortRegistrationFailed { status }
            | ClientError::CallbackRegistrationFailed { status }
            | ClientError::ActivationFailed { status } => status,
        }
    }
}

/// Errors returned by this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] ClientError),

    #[error(transparent)]
    InvalidArgument(#[from] midisend_core::Error),

    #[error("client was closed")]
    ClientClosed,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
