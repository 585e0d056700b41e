/// Errors that can occur in session and client operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] cvlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] cvlink_frame::FrameError),

    /// A command signature could not be registered.
    #[error("command registration failed: {0}")]
    Registry(#[from] cvlink_command::RegistryError),

    /// The server's first message was not a greeting (e.g. a rejection notice).
    #[error("unexpected greeting: {0}")]
    UnexpectedGreeting(String),

    /// A response did not carry the request id it was sent with.
    #[error("response does not match request id {expected}: {response}")]
    MismatchedRequestId { expected: u32, response: String },

    /// A message was not valid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
