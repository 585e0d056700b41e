/// Command-level failures. Each one becomes an `error <message>` response;
/// none of them ends the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// No registration matches the command name and argument count.
    #[error("unknown command '{line}'")]
    UnknownCommand { line: String },

    /// An argument could not be parsed, converted or resolved.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A handler failed with a human-readable message.
    #[error("{0}")]
    Failed(String),
}

/// Problems with a command signature at registration time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid command signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("command '{name}' with {arity} argument(s) is already registered")]
    Duplicate { name: String, arity: usize },
}

pub type Result<T> = std::result::Result<T, CommandError>;
