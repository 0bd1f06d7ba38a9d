use std::fmt;
use std::io;

use gpioprims_client::ClientError;
use gpioprims_transport::TransportError;
use gpioprims_wire::FrameError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CONNECTION_ERROR: i32 = 3;
pub const PROTOCOL_ERROR: i32 = 60;
pub const USAGE: i32 = 64;
pub const DAEMON_ERROR: i32 = 70;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::AddrNotAvailable => CONNECTION_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(CONNECTION_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => {
            CliError::new(CONNECTION_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(PROTOCOL_ERROR, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Io(err) => io_error(context, err),
        ClientError::Protocol(err) => frame_error(context, err),
        ClientError::Closed => CliError::new(CONNECTION_ERROR, format!("{context}: {err}")),
        ClientError::Daemon(_) => CliError::new(DAEMON_ERROR, format!("{context}: {err}")),
        ClientError::InvalidArgument(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use gpioprims_client::DaemonError;

    use super::*;

    #[test]
    fn client_errors_map_to_exit_codes() {
        let cases = [
            (ClientError::Closed, CONNECTION_ERROR),
            (ClientError::Daemon(DaemonError::new(-3)), DAEMON_ERROR),
            (ClientError::InvalidArgument("line 40".into()), USAGE),
            (ClientError::ShutdownFailed("stuck".into()), FAILURE),
            (
                ClientError::Protocol(FrameError::PayloadTooLarge { size: 9, max: 4 }),
                PROTOCOL_ERROR,
            ),
            (
                ClientError::Io(io::Error::from(io::ErrorKind::TimedOut)),
                TIMEOUT,
            ),
            (
                ClientError::Transport(TransportError::Connect {
                    addr: "localhost:8888".into(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                }),
                CONNECTION_ERROR,
            ),
        ];

        for (err, code) in cases {
            let message = err.to_string();
            assert_eq!(client_error("op", err).code, code, "{message}");
        }
    }

    #[test]
    fn daemon_error_message_names_the_code() {
        let err = client_error("write failed", ClientError::Daemon(DaemonError::new(-3)));
        assert_eq!(err.to_string(), "write failed: daemon error: gpio not 0-53 (-3)");
    }
}
