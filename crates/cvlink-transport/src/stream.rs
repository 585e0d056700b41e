use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::error::Result;

/// A connected client stream implementing Read + Write.
///
/// Wraps either a TCP stream or, on Unix, a Unix domain socket stream, so the
/// server and client code above it is transport-agnostic.
pub struct ClientStream {
    inner: ClientStreamInner,
}

enum ClientStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for ClientStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ClientStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            ClientStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ClientStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            ClientStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ClientStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            ClientStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl ClientStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: ClientStreamInner::Tcp(stream),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ClientStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            ClientStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            ClientStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            ClientStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            ClientStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            ClientStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            ClientStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Shut down both directions. Unblocks a read in progress on any clone.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            ClientStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both)?,
            #[cfg(unix)]
            ClientStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both)?,
        }
        Ok(())
    }

    /// A human-readable identifier of the remote end, used in events and logs.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            ClientStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:unknown".to_string()),
            #[cfg(unix)]
            ClientStreamInner::Unix(_) => match self.peer_credentials() {
                Some((uid, _gid, pid)) => format!("unix:pid={pid},uid={uid}"),
                None => "unix:anonymous".to_string(),
            },
        }
    }

    /// Get the credentials of a Unix peer (Linux only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            ClientStreamInner::Unix(stream) => stream.as_raw_fd(),
            ClientStreamInner::Tcp(_) => return None,
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this process.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of a Unix peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl std::fmt::Debug for ClientStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            ClientStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            ClientStreamInner::Unix(_) => "unix",
        };
        f.debug_struct("ClientStream").field("type", &kind).finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn shutdown_unblocks_reader_on_clone() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = ClientStream::from_unix(left);
        let mut reader = stream.try_clone().unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader.read(&mut buf).unwrap()
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        stream.shutdown().unwrap();
        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn unix_peer_label_carries_pid() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = ClientStream::from_unix(left);
        let label = stream.peer_label();
        assert!(
            label.contains(&format!("pid={}", std::process::id())),
            "unexpected label {label}"
        );
    }

    #[test]
    fn tcp_peer_label_is_socket_address() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = ClientStream::from_tcp(TcpStream::connect(addr).unwrap());
        assert_eq!(client.peer_label(), addr.to_string());
        assert_eq!(format!("{client:?}"), "ClientStream { type: \"tcp\" }");
    }
}
