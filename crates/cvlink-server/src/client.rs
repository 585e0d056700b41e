use std::fmt;
use std::net::{Ipv4Addr, ToSocketAddrs};

use bytes::Bytes;
use cvlink_frame::{FrameReader, FrameWriter};
use cvlink_transport::{ClientStream, Endpoint, TcpSocket};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Result, ServerError};

/// Blocking request/response client for a [`RemoteServer`](crate::RemoteServer).
pub struct Client {
    reader: FrameReader<ClientStream>,
    writer: FrameWriter<ClientStream>,
    greeting: Option<String>,
    peer: String,
}

impl Client {
    /// Connect to a server on this machine and read its greeting.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, ClientConfig::default())
    }

    pub fn connect_with_config(endpoint: &Endpoint, config: ClientConfig) -> Result<Self> {
        let stream = match endpoint {
            Endpoint::Tcp { port } => TcpSocket::connect((Ipv4Addr::LOCALHOST, *port))?,
            #[cfg(unix)]
            Endpoint::Local { path } => cvlink_transport::UnixDomainSocket::connect(path)?,
            #[cfg(not(unix))]
            Endpoint::Local { .. } => {
                return Err(cvlink_transport::TransportError::Unsupported(endpoint.to_string()).into())
            }
        };
        Self::from_stream(stream, endpoint.to_string(), config)
    }

    /// Connect to a TCP server at any address.
    pub fn connect_tcp(addr: impl ToSocketAddrs + fmt::Debug, config: ClientConfig) -> Result<Self> {
        let peer = format!("{addr:?}");
        let stream = TcpSocket::connect(addr)?;
        Self::from_stream(stream, peer, config)
    }

    fn from_stream(stream: ClientStream, peer: String, config: ClientConfig) -> Result<Self> {
        stream.set_read_timeout(config.frame.read_timeout)?;
        stream.set_write_timeout(config.frame.write_timeout)?;
        let reader = FrameReader::with_config(stream.try_clone()?, config.frame.clone());
        let writer = FrameWriter::with_config(stream, config.frame);

        let mut client = Self {
            reader,
            writer,
            greeting: None,
            peer,
        };
        if config.expect_greeting {
            let greeting = client.read_text()?;
            if !greeting.starts_with("connected") {
                return Err(ServerError::UnexpectedGreeting(greeting));
            }
            debug!(peer = %client.peer, %greeting, "connected");
            client.greeting = Some(greeting);
        }
        Ok(client)
    }

    /// The greeting read on connect, if one was expected.
    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    /// Send one command line and wait for its response.
    pub fn request(&mut self, command: &str) -> Result<String> {
        self.writer.send(command.as_bytes())?;
        self.read_text()
    }

    /// Like [`request`](Self::request), tagging the exchange with a request id.
    /// The id prefix is stripped from the returned response.
    pub fn request_with_id(&mut self, id: u32, command: &str) -> Result<String> {
        let response = self.request(&format!("{id}:{command}"))?;
        let prefix = format!("{id}:");
        match response.strip_prefix(&prefix) {
            Some(body) => Ok(body.to_string()),
            None => Err(ServerError::MismatchedRequestId {
                expected: id,
                response,
            }),
        }
    }

    /// Send an arbitrary payload and return the raw response bytes.
    pub fn send_raw(&mut self, payload: &[u8]) -> Result<Bytes> {
        self.writer.send(payload)?;
        Ok(self.reader.read_message()?)
    }

    fn read_text(&mut self) -> Result<String> {
        let message = self.reader.read_message()?;
        Ok(std::str::from_utf8(&message)?.to_string())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.peer)
            .field("greeting", &self.greeting)
            .finish()
    }
}
