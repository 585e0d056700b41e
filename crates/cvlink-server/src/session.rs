use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use cvlink_command::{register_alias_commands, render, CommandError, CommandRegistry, Host, Reply};
use cvlink_transport::{
    ConnectOutcome, Endpoint, ServerEvent, ServerHandle, SubscriptionId, TransportServer,
};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;

/// Remote-control server: a [`TransportServer`] whose messages are dispatched
/// as command lines against a [`Host`].
///
/// Every request gets exactly one response, sent from the receive thread
/// before the next request is read.
pub struct RemoteServer {
    transport: TransportServer,
    registry: Arc<CommandRegistry>,
    bound: Arc<Mutex<Option<Endpoint>>>,
}

impl RemoteServer {
    /// Register the alias and built-in commands for `host` and wire them to a
    /// new (not yet listening) transport.
    pub fn new(config: ServerConfig, host: Arc<dyn Host>) -> Result<Self> {
        let transport = TransportServer::with_config(config.transport);
        let bound = Arc::new(Mutex::new(None));

        let mut registry = CommandRegistry::new();
        register_alias_commands(&mut registry, host)?;
        let help = register_builtins(&mut registry, transport.handle(), Arc::clone(&bound))?;
        // Filled last so the listing includes every signature, itself too.
        let _ = help.set(registry.help_text());
        let registry = Arc::new(registry);

        let handle = transport.handle();
        let dispatcher = Arc::clone(&registry);
        let greeting = config.greeting;
        transport.subscribe(move |event| match event {
            ServerEvent::Connected {
                endpoint,
                outcome: ConnectOutcome::Accepted,
            } => {
                if let Some(greeting) = &greeting {
                    if !handle.send_message(greeting) {
                        warn!(%endpoint, "failed to send greeting");
                    }
                }
            }
            ServerEvent::Received { endpoint, message } => {
                let response = handle_request(&dispatcher, message);
                if !handle.send_message(&response) {
                    warn!(%endpoint, "failed to send response");
                }
            }
            ServerEvent::Connected { .. } => {}
            ServerEvent::Error { description } => debug!(%description, "transport error"),
        });

        Ok(Self {
            transport,
            registry,
            bound,
        })
    }

    /// Start listening. Returns false (and logs why) on failure.
    pub fn start(&self, endpoint: &Endpoint) -> bool {
        match self.try_start(endpoint) {
            Ok(_) => true,
            Err(err) => {
                warn!(%endpoint, error = %err, "failed to start remote server");
                false
            }
        }
    }

    /// Start listening and return the bound endpoint.
    pub fn try_start(&self, endpoint: &Endpoint) -> Result<Endpoint> {
        let bound = self.transport.try_start(endpoint)?;
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = Some(bound.clone());
        info!(endpoint = %bound, commands = self.registry.len(), "remote server ready");
        Ok(bound)
    }

    pub fn shutdown(&self) {
        self.transport.shutdown();
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.transport.local_endpoint()
    }

    /// Observe transport events alongside the facade's own observer.
    pub fn subscribe(
        &self,
        observer: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.transport.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.transport.events().unsubscribe(id)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &TransportServer {
        &self.transport
    }

    /// Dispatch one request in-process and render its response.
    pub fn respond(&self, request: &[u8]) -> String {
        handle_request(&self.registry, request)
    }
}

/// Turn one raw request into its response text.
///
/// A leading `<digits>:` request id is stripped before dispatch and echoed in
/// front of the response.
pub fn handle_request(registry: &CommandRegistry, request: &[u8]) -> String {
    let line = match std::str::from_utf8(request) {
        Ok(line) => line,
        Err(err) => {
            warn!(size = request.len(), error = %err, "request is not valid UTF-8");
            return render(&Err(CommandError::InvalidArgument(
                "request is not valid UTF-8".to_string(),
            )));
        }
    };

    let (request_id, command) = split_request_id(line);
    debug!(command, request_id, "handling request");
    let response = render(&registry.dispatch(command));
    match request_id {
        Some(id) => format!("{id}:{response}"),
        None => response,
    }
}

fn split_request_id(line: &str) -> (Option<&str>, &str) {
    match line.split_once(':') {
        Some((id, command)) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => {
            (Some(id), command)
        }
        _ => (None, line),
    }
}

fn register_builtins(
    registry: &mut CommandRegistry,
    handle: ServerHandle,
    bound: Arc<Mutex<Option<Endpoint>>>,
) -> Result<Arc<OnceLock<String>>> {
    registry.bind(
        "vget /cvlink/status",
        "Listening endpoint and connected client, as JSON",
        move |_| {
            let listening = bound
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map(ToString::to_string);
            let status = serde_json::json!({
                "listening": listening,
                "client": handle.connected_endpoint(),
            });
            Ok(Reply::with_body(status.to_string()))
        },
    )?;

    let help = Arc::new(OnceLock::new());
    let listing = Arc::clone(&help);
    registry.bind("vget /cvlink/help", "List all commands", move |_| {
        Ok(Reply::with_body(listing.get().cloned().unwrap_or_default()))
    })?;
    Ok(help)
}
