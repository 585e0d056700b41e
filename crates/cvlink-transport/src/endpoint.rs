use std::fmt;
use std::path::{Path, PathBuf};

/// Where the server listens. Exactly one variant is live per server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Stream socket bound on all local interfaces (`0.0.0.0:port`).
    /// Port 0 lets the OS choose; the bound port is reported after `start`.
    Tcp { port: u16 },
    /// Local domain socket bound to a filesystem path. Unix only.
    Local { path: PathBuf },
}

impl Endpoint {
    pub fn tcp(port: u16) -> Self {
        Endpoint::Tcp { port }
    }

    pub fn local(path: impl AsRef<Path>) -> Self {
        Endpoint::Local {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The conventional local socket name for a server that would otherwise
    /// listen on `port`: `/tmp/cvlink_<port>.socket`.
    pub fn local_for_port(port: u16) -> Self {
        Self::local(format!("/tmp/cvlink_{port}.socket"))
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Tcp { .. } => "tcp",
            Endpoint::Local { .. } => "unix-domain-socket",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Endpoint::Local { .. })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { port } => write!(f, "tcp://0.0.0.0:{port}"),
            Endpoint::Local { path } => write!(f, "unix://{}", path.display()),
        }
    }
}
