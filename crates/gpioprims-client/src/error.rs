use gpioprims_transport::TransportError;
use gpioprims_wire::FrameError;

use crate::daemon_error::DaemonError;

/// Errors that can occur in client operations.
///
/// Connection failures, malformed frames and daemon-reported errors stay
/// distinct so callers can react to each.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting to the daemon failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O failure on an established connection.
    #[error("connection I/O error: {0}")]
    Io(std::io::Error),

    /// The connection is closed, or was closed while the call was pending.
    #[error("connection closed")]
    Closed,

    /// A malformed or oversized frame was received.
    #[error("protocol error: {0}")]
    Protocol(FrameError),

    /// The daemon answered with a negative result.
    #[error("daemon error: {0}")]
    Daemon(#[from] DaemonError),

    /// An argument was rejected before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Teardown did not complete cleanly.
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(io) => ClientError::Io(io),
            FrameError::ConnectionClosed => ClientError::Closed,
            other => ClientError::Protocol(other),
        }
    }
}

impl ClientError {
    /// Whether this error means the connection is unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Io(_) | ClientError::Closed
        )
    }

    /// Whether a frame from the daemon could not be decoded.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, ClientError::Protocol(_))
    }

    /// The daemon error code, if the daemon reported one.
    pub fn daemon_code(&self) -> Option<i32> {
        match self {
            ClientError::Daemon(err) => Some(err.code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn frame_errors_are_classified() {
        let closed = ClientError::from(FrameError::ConnectionClosed);
        assert!(matches!(closed, ClientError::Closed));
        assert!(closed.is_connection_error());

        let io = ClientError::from(FrameError::Io(std::io::Error::from(ErrorKind::BrokenPipe)));
        assert!(io.is_connection_error());

        let malformed = ClientError::from(FrameError::InvalidLength {
            what: "response",
            expected: 16,
            actual: 3,
        });
        assert!(malformed.is_protocol_error());
        assert!(!malformed.is_connection_error());
    }

    #[test]
    fn daemon_error_exposes_code() {
        let err = ClientError::from(DaemonError::new(-5));
        assert_eq!(err.daemon_code(), Some(-5));
        assert!(!err.is_connection_error());
        assert_eq!(err.to_string(), "daemon error: level not 0-1 (-5)");
    }
}
