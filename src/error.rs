//! Centralized error type for the midisend umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] midisend_core::Error),

    #[error(transparent)]
    Client(#[from] midisend_client::Error),

    #[error("Client open: {0}")]
    Open(#[from] midisend_client::ClientError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The construction-stage failure, if this error is one.
    pub fn open_error(&self) -> Option<&midisend_client::ClientError> {
        match self {
            Error::Open(err) | Error::Client(midisend_client::Error::Open(err)) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_errors_convert() {
        let err: Error = midisend_core::Error::InvalidLength(0).into();
        assert!(matches!(err, Error::Core(_)));

        let open = midisend_client::ClientError::ConnectionFailed { status: 5 };
        let err: Error = midisend_client::Error::from(open).into();
        assert_eq!(err.open_error(), Some(&open));
        assert_eq!(err.to_string(), "could not create client [server status: 5]");

        let err: Error = midisend_client::Error::ClientClosed.into();
        assert!(err.open_error().is_none());
    }
}
