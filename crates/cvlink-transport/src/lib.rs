//! Single-client socket server for the cvlink control channel.
//!
//! Owns one listening endpoint, either a TCP socket bound on all local
//! interfaces or (on Unix) a local domain socket, and at most one connected
//! client at a time. Incoming messages are unwrapped with [`cvlink_frame`] and
//! announced to observers as [`ServerEvent`]s.

pub mod endpoint;
pub mod error;
pub mod events;
pub mod listener;
pub mod server;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use events::{ConnectOutcome, EventHub, ServerEvent, SubscriptionId};
pub use server::{ServerHandle, TransportConfig, TransportServer};
pub use stream::ClientStream;
pub use tcp::TcpSocket;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
