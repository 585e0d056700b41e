//! Remote-control channel into a running simulation host.
//!
//! External clients send short text commands over a socket and get one
//! response per command, so live objects can be queried and driven without
//! scripting inside the host process.
//!
//! # Crate Structure
//!
//! - [`frame`]: magic-checked, length-prefixed message framing
//! - [`transport`]: single-client TCP / local domain socket server
//! - [`command`]: command registry and reflective invocation engine
//! - [`server`]: session facade and blocking client

/// Re-export frame types.
pub mod frame {
    pub use cvlink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use cvlink_transport::*;
}

/// Re-export command types.
pub mod command {
    pub use cvlink_command::*;
}

/// Re-export session types.
pub mod server {
    pub use cvlink_server::*;
}

pub use cvlink_server::{Client, RemoteServer, ServerConfig};
pub use cvlink_transport::Endpoint;
