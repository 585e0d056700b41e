/// Errors that can occur while wrapping or unwrapping messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header carried the wrong magic number. The stream is
    /// desynchronized and the connection should be dropped.
    #[error("frame desynchronized (magic 0x{found:08X}, expected 0x{expected:08X})", expected = crate::codec::MAGIC)]
    Desynchronized { found: u32 },

    /// The payload exceeds the caller-imposed maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The peer closed the connection before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A socket error interrupted a frame read.
    #[error("frame truncated: {0}")]
    Truncated(#[source] std::io::Error),

    /// An I/O error occurred while writing a frame.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether a read timed out (or would block) before a frame completed.
    ///
    /// Buffered partial data is kept by the reader, so the read can be retried.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Truncated(err)
                if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
