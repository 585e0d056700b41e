/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the requested endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to connect to the requested endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on a socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing failed on the client connection.
    #[error("frame error: {0}")]
    Frame(#[from] cvlink_frame::FrameError),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: std::path::PathBuf,
        len: usize,
        max: usize,
    },

    /// `start` was called on a server that is already listening.
    #[error("server is already listening on {0}")]
    AlreadyListening(String),

    /// The endpoint kind is not available on this platform.
    #[error("unsupported endpoint: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
