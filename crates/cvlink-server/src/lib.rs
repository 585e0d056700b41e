//! Session facade for the cvlink control channel.
//!
//! [`RemoteServer`] ties a [`cvlink_transport::TransportServer`] to a
//! [`cvlink_command::CommandRegistry`]: each received message is a command
//! line, each command produces exactly one response on the same connection.
//! [`Client`] is the matching blocking request/response client.

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig, DEFAULT_NAME};
pub use error::{Result, ServerError};
pub use session::{handle_request, RemoteServer};
