use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::ClientStream;

/// TCP stream-socket listener bound on all local interfaces.
pub struct TcpSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on `0.0.0.0:port`. Port 0 picks a free port.
    pub fn bind(port: u16) -> Result<Self> {
        let requested = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(requested).map_err(|e| TransportError::Bind {
            endpoint: requested.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "listening on tcp socket");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<ClientStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        // Responses are small request/response frames.
        stream.set_nodelay(true)?;
        debug!(%addr, "accepted tcp connection");
        Ok(ClientStream::from_tcp(stream))
    }

    /// Connect to a listening TCP server (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<ClientStream> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            endpoint: format!("{addr:?}"),
            source: e,
        })?;
        stream.set_nodelay(true)?;
        debug!(?addr, "connected to tcp socket");
        Ok(ClientStream::from_tcp(stream))
    }

    /// The address this socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Something that can later unblock a thread parked in [`accept`](Self::accept).
    pub fn interrupter(&self) -> Result<TcpInterrupter> {
        Ok(TcpInterrupter {
            listener: self.listener.try_clone()?,
            port: self.local_addr.port(),
        })
    }
}

/// Closes a listening TCP socket out from under a blocked `accept`.
pub struct TcpInterrupter {
    listener: TcpListener,
    port: u16,
}

impl TcpInterrupter {
    /// Shut the listening socket down and self-connect once.
    ///
    /// Linux returns from `accept` as soon as the listener is shut down; other
    /// Unix flavours only return once a connection arrives, hence the
    /// self-connect. The caller raises its shutdown flag before calling this.
    pub fn interrupt(&self) {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;
            // SAFETY: the descriptor is owned by `self.listener` and open for the
            // lifetime of this call; `shutdown` does not invalidate it.
            let rc = unsafe { libc::shutdown(self.listener.as_raw_fd(), libc::SHUT_RDWR) };
            debug!(rc, port = self.port, "shut down tcp listener");
        }
        let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        if let Err(err) = TcpStream::connect(loopback) {
            debug!(error = %err, "self-connect wake-up refused");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn bind_port_zero_reports_real_port() {
        let socket = TcpSocket::bind(0).unwrap();
        assert_ne!(socket.local_addr().port(), 0);
        assert!(socket.local_addr().ip().is_unspecified());
    }

    #[test]
    fn bind_port_in_use_is_bind_error() {
        let first = TcpSocket::bind(0).unwrap();
        let second = TcpSocket::bind(first.local_addr().port());
        assert!(matches!(second, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn accept_and_exchange_bytes() {
        let socket = TcpSocket::bind(0).unwrap();
        let port = socket.local_addr().port();

        let handle = std::thread::spawn(move || {
            let mut client = TcpSocket::connect(("127.0.0.1", port)).unwrap();
            client.write_all(b"ping").unwrap();
        });

        let mut server = socket.accept().unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        handle.join().unwrap();
    }

    #[test]
    fn interrupter_unblocks_accept() {
        let socket = TcpSocket::bind(0).unwrap();
        let interrupter = socket.interrupter().unwrap();

        let handle = std::thread::spawn(move || {
            let _ = socket.accept();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        interrupter.interrupt();

        handle.join().unwrap();
    }
}
