use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cvlink_command::SceneHost;
use cvlink_server::{RemoteServer, ServerConfig};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let mut config = ServerConfig::named(&args.name);
    if args.no_greeting {
        config.greeting = None;
    }
    if let Some(max) = args.max_payload {
        config.transport.frame.max_payload_size = max;
    }

    let server = RemoteServer::new(config, SceneHost::demo())
        .map_err(|err| server_error("setup failed", err))?;
    let endpoint = server
        .try_start(&args.endpoint.endpoint())
        .map_err(|err| server_error("start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(%endpoint, commands = server.registry().len(), "serving demo scene, Ctrl-C to stop");

    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }

    server.shutdown();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
