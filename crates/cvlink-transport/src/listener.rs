use std::path::PathBuf;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::stream::ClientStream;
use crate::tcp::{TcpInterrupter, TcpSocket};
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// The one live listening socket of a server.
pub enum Listener {
    Tcp(TcpSocket),
    #[cfg(unix)]
    Local(UnixDomainSocket),
}

impl Listener {
    /// Bind the requested endpoint. `socket_mode` applies to local sockets only.
    pub fn bind(endpoint: &Endpoint, socket_mode: u32) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp { port } => Ok(Listener::Tcp(TcpSocket::bind(*port)?)),
            #[cfg(unix)]
            Endpoint::Local { path } => Ok(Listener::Local(UnixDomainSocket::bind_with_mode(
                path,
                socket_mode,
            )?)),
            #[cfg(not(unix))]
            Endpoint::Local { path } => {
                let _ = socket_mode;
                Err(crate::error::TransportError::Unsupported(format!(
                    "local domain sockets are not available on this platform ({})",
                    path.display()
                )))
            }
        }
    }

    /// Accept the next connection and label its remote end.
    pub fn accept(&self) -> Result<(ClientStream, String)> {
        let stream = match self {
            Listener::Tcp(socket) => socket.accept()?,
            #[cfg(unix)]
            Listener::Local(socket) => socket.accept()?,
        };
        let label = stream.peer_label();
        Ok((stream, label))
    }

    /// The endpoint actually bound, with the real port for `Tcp { port: 0 }`.
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            Listener::Tcp(socket) => Endpoint::tcp(socket.local_addr().port()),
            #[cfg(unix)]
            Listener::Local(socket) => Endpoint::local(socket.path()),
        }
    }

    /// Build the wake-up mechanism used to interrupt a blocking `accept`.
    pub fn waker(&self) -> Result<Waker> {
        match self {
            Listener::Tcp(socket) => Ok(Waker::Tcp(socket.interrupter()?)),
            #[cfg(unix)]
            Listener::Local(socket) => Ok(Waker::Local(socket.path().to_path_buf())),
        }
    }
}

/// Interrupts a blocking accept on a [`Listener`] from another thread.
pub enum Waker {
    /// Close the listening socket (and self-connect).
    Tcp(TcpInterrupter),
    /// Self-connect to the socket path.
    Local(PathBuf),
}

impl Waker {
    pub fn wake(&self) {
        match self {
            Waker::Tcp(interrupter) => interrupter.interrupt(),
            #[cfg(unix)]
            Waker::Local(path) => UnixDomainSocket::wake(path),
            #[cfg(not(unix))]
            Waker::Local(_) => {}
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("endpoint", &self.local_endpoint().to_string())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn local_bind_reports_path_endpoint() {
        let dir = std::env::temp_dir().join(format!("cvlink-listener-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("l.sock");

        let listener = Listener::bind(&Endpoint::local(&path), 0o600).unwrap();
        assert_eq!(listener.local_endpoint(), Endpoint::local(&path));

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tcp_accept_labels_peer_address() {
        let listener = Listener::bind(&Endpoint::tcp(0), 0o600).unwrap();
        let Endpoint::Tcp { port } = listener.local_endpoint() else {
            panic!("expected tcp endpoint");
        };

        let client = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
        let (_stream, label) = listener.accept().unwrap();
        assert_eq!(label, client.local_addr().unwrap().to_string());
    }

    #[test]
    fn bind_errors_do_not_panic() {
        let result = Listener::bind(&Endpoint::local("/nonexistent-dir/x/y.sock"), 0o600);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}
