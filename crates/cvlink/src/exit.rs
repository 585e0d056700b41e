use std::fmt;
use std::io;

use cvlink_frame::FrameError;
use cvlink_server::ServerError;
use cvlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
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
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound | io::ErrorKind::AddrInUse => {
            TRANSPORT_ERROR
        }
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::Frame(err) => frame_error(context, err),
        TransportError::Unsupported(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    if err.is_timeout() {
        return CliError::new(TIMEOUT, format!("{context}: {err}"));
    }
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Desynchronized { .. } | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed | FrameError::Truncated(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Transport(err) => transport_error(context, err),
        ServerError::Frame(err) => frame_error(context, err),
        ServerError::UnexpectedGreeting(notice) => {
            CliError::new(FAILURE, format!("{context}: server rejected connection: {notice}"))
        }
        ServerError::MismatchedRequestId { .. } | ServerError::InvalidUtf8(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ServerError::Registry(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = FrameError::Truncated(io::Error::new(io::ErrorKind::WouldBlock, "slow"));
        assert_eq!(server_error("request", ServerError::Frame(err)).code, TIMEOUT);
    }

    #[test]
    fn missing_socket_is_transport_error() {
        let err = TransportError::Connect {
            endpoint: "/tmp/missing.sock".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let cli = transport_error("connect failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("connect failed: "));
    }

    #[test]
    fn rejection_is_plain_failure() {
        let err = ServerError::UnexpectedGreeting("error another client is already connected".into());
        let cli = server_error("connect failed", err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.contains("rejected"));
    }

    #[test]
    fn desync_is_data_invalid() {
        let err = FrameError::Desynchronized { found: 0x4745_5420 };
        assert_eq!(frame_error("read", err).code, DATA_INVALID);
    }
}
