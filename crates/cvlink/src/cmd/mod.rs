use std::path::PathBuf;

use clap::{Args, Subcommand};
use cvlink_transport::Endpoint;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

/// Port used when neither `--port` nor `--socket` is given.
pub const DEFAULT_PORT: u16 = 9000;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the demo scene until interrupted.
    Serve(ServeArgs),
    /// Send one command and print the response.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EndpointArgs {
    /// TCP port (bound on all interfaces when serving).
    #[arg(long, env = "CVLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Local domain socket path. Takes precedence over --port.
    #[arg(long, env = "CVLINK_SOCKET", value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

impl EndpointArgs {
    pub fn endpoint(&self) -> Endpoint {
        match &self.socket {
            Some(path) => Endpoint::local(path),
            None => Endpoint::tcp(self.port),
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
    /// Name announced in the greeting.
    #[arg(long, default_value = cvlink_server::DEFAULT_NAME)]
    pub name: String,
    /// Do not greet accepted clients.
    #[arg(long)]
    pub no_greeting: bool,
    /// Largest accepted request payload in bytes.
    #[arg(long, env = "CVLINK_MAX_PAYLOAD", value_name = "BYTES")]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command to send, one token per argument, e.g. `vget /persistent_level/id`.
    #[arg(required = true, num_args = 1..)]
    pub command: Vec<String>,
    #[command(flatten)]
    pub endpoint: EndpointArgs,
    /// Maximum time to wait for the greeting and the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Tag the request with a numeric id.
    #[arg(long)]
    pub id: Option<u32>,
    /// Largest accepted response payload in bytes.
    #[arg(long, env = "CVLINK_MAX_PAYLOAD", value_name = "BYTES")]
    pub max_payload: Option<usize>,
    /// The server sends no greeting.
    #[arg(long)]
    pub no_greeting: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
