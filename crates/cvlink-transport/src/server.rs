use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cvlink_frame::{FrameConfig, FrameReader, FrameWriter};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::events::{ConnectOutcome, EventHub, ServerEvent, SubscriptionId};
use crate::listener::{Listener, Waker};
use crate::stream::ClientStream;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) doesn't spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
const REJECT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Frame limits and socket timeouts for the active client.
    ///
    /// `read_timeout` is `None` by default: an idle client keeps the slot
    /// indefinitely. Setting it evicts clients that stay silent that long.
    pub frame: FrameConfig,
    /// Permission bits for local socket files.
    pub socket_mode: u32,
    /// Framed notice written to a rejected second client before it is closed.
    pub reject_notice: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig {
                write_timeout: Some(Duration::from_secs(5)),
                ..FrameConfig::default()
            },
            socket_mode: 0o600,
            reject_notice: Some("error another client is already connected".to_string()),
        }
    }
}

/// Single-client server over one TCP or local domain socket listener.
///
/// Accepting runs on a `cvlink-accept` thread; the active client is served on
/// a `cvlink-recv` thread that unwraps messages and raises
/// [`ServerEvent::Received`] for each one. Observers run on that thread, so
/// messages are handled strictly in arrival order.
pub struct TransportServer {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

struct Running {
    endpoint: Endpoint,
    waker: Waker,
    accept_thread: JoinHandle<()>,
}

struct Shared {
    config: TransportConfig,
    events: EventHub,
    shutting_down: AtomicBool,
    client: Mutex<Option<ActiveClient>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
    next_client_id: AtomicU64,
}

struct ActiveClient {
    id: u64,
    endpoint: String,
    writer: FrameWriter<ClientStream>,
    control: ClientStream,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TransportServer {
    /// Create a server with default configuration. Nothing is bound yet.
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a server with explicit configuration.
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                events: EventHub::new(),
                shutting_down: AtomicBool::new(false),
                client: Mutex::new(None),
                receiver: Mutex::new(None),
                next_client_id: AtomicU64::new(1),
            }),
            running: Mutex::new(None),
        }
    }

    /// Bind `endpoint` and start accepting clients.
    ///
    /// Returns false if the server is already listening or binding fails
    /// (e.g. the port is in use). The reason is logged.
    pub fn start(&self, endpoint: &Endpoint) -> bool {
        match self.try_start(endpoint) {
            Ok(_) => true,
            Err(err) => {
                warn!(%endpoint, error = %err, "failed to start server");
                false
            }
        }
    }

    /// Like [`start`](Self::start), but returns the bound endpoint or the error.
    pub fn try_start(&self, endpoint: &Endpoint) -> Result<Endpoint> {
        let mut running = lock(&self.running);
        if let Some(existing) = running.as_ref() {
            return Err(TransportError::AlreadyListening(existing.endpoint.to_string()));
        }

        self.shared.shutting_down.store(false, Ordering::SeqCst);
        let listener = Listener::bind(endpoint, self.shared.config.socket_mode)?;
        let bound = listener.local_endpoint();
        let waker = listener.waker()?;

        let shared = Arc::clone(&self.shared);
        let accept_thread = thread::Builder::new()
            .name("cvlink-accept".to_string())
            .spawn(move || accept_loop(shared, listener))?;

        info!(endpoint = %bound, transport = bound.transport_name(), "server started");
        *running = Some(Running {
            endpoint: bound.clone(),
            waker,
            accept_thread,
        });
        Ok(bound)
    }

    /// Stop listening, drop the active client and release all sockets.
    ///
    /// Blocking accept and receive calls are forced to return: the listener is
    /// woken (socket close for TCP, self-connect for local sockets) and the
    /// client socket is shut down. Safe to call from an event observer.
    pub fn shutdown(&self) {
        let Some(running) = lock(&self.running).take() else {
            return;
        };

        self.shared.shutting_down.store(true, Ordering::SeqCst);
        running.waker.wake();
        join_unless_current(running.accept_thread, "accept");

        if let Some(client) = lock(&self.shared.client).take() {
            let _ = client.control.shutdown();
        }
        if let Some(receiver) = lock(&self.shared.receiver).take() {
            join_unless_current(receiver, "receive");
        }
        info!(endpoint = %running.endpoint, "server stopped");
    }

    /// Whether a listener is bound.
    pub fn is_listening(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// The endpoint actually bound, if listening.
    pub fn local_endpoint(&self) -> Option<Endpoint> {
        lock(&self.running).as_ref().map(|r| r.endpoint.clone())
    }

    /// Whether a client is currently connected.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Label of the connected client, if any.
    pub fn connected_endpoint(&self) -> Option<String> {
        self.shared.connected_endpoint()
    }

    /// Send a UTF-8 message to the connected client.
    pub fn send_message(&self, message: &str) -> bool {
        self.shared.send_data(message.as_bytes())
    }

    /// Send a byte payload to the connected client.
    ///
    /// Returns false if no client is connected or the write fails; a failed
    /// write also drops the connection since the stream may hold a partial frame.
    pub fn send_data(&self, payload: &[u8]) -> bool {
        self.shared.send_data(payload)
    }

    /// Observer list for connect/receive/error events.
    pub fn events(&self) -> &EventHub {
        &self.shared.events
    }

    /// Shortcut for `events().subscribe(..)`.
    pub fn subscribe(
        &self,
        observer: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe(observer)
    }

    /// A cloneable send capability for observers and handlers.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl Default for TransportServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TransportServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Weak reference to a [`TransportServer`]'s client slot.
///
/// Holding one does not keep the server alive; every operation reports
/// "not connected" once the server is gone.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Weak<Shared>,
}

impl ServerHandle {
    pub fn send_message(&self, message: &str) -> bool {
        self.send_data(message.as_bytes())
    }

    pub fn send_data(&self, payload: &[u8]) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.send_data(payload))
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.is_connected())
    }

    pub fn connected_endpoint(&self) -> Option<String> {
        self.shared
            .upgrade()
            .and_then(|shared| shared.connected_endpoint())
    }
}

impl Shared {
    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        lock(&self.client).is_some()
    }

    fn connected_endpoint(&self) -> Option<String> {
        lock(&self.client).as_ref().map(|c| c.endpoint.clone())
    }

    fn send_data(&self, payload: &[u8]) -> bool {
        let mut slot = lock(&self.client);
        let Some(client) = slot.as_mut() else {
            debug!(size = payload.len(), "send with no client connected");
            return false;
        };
        match client.writer.send(payload) {
            Ok(()) => true,
            Err(err) => {
                warn!(endpoint = %client.endpoint, error = %err, "send failed; dropping client");
                // The receive thread notices the shutdown and clears the slot.
                let _ = client.control.shutdown();
                false
            }
        }
    }

    /// Take ownership of a freshly accepted connection: make it the active
    /// client, or reject it if one is already being served.
    fn admit(self: &Arc<Self>, stream: ClientStream, endpoint: String) {
        let mut slot = lock(&self.client);
        if slot.is_some() {
            drop(slot);
            self.reject(stream, &endpoint);
            return;
        }

        let prepared = prepare_client(&stream, &self.config.frame);
        let (reader_stream, control) = match prepared {
            Ok(parts) => parts,
            Err(err) => {
                drop(slot);
                warn!(%endpoint, error = %err, "failed to set up client connection");
                self.events.broadcast(&ServerEvent::Error {
                    description: format!("{endpoint}: {err}"),
                });
                return;
            }
        };

        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(ActiveClient {
            id,
            endpoint: endpoint.clone(),
            writer: FrameWriter::with_config(stream, self.config.frame.clone()),
            control,
        });
        drop(slot);

        info!(%endpoint, "client connected");
        self.events.broadcast(&ServerEvent::Connected {
            endpoint: endpoint.clone(),
            outcome: ConnectOutcome::Accepted,
        });

        let reader = FrameReader::with_config(reader_stream, self.config.frame.clone());
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("cvlink-recv".to_string())
            .spawn(move || receive_loop(shared, id, endpoint, reader));

        let previous = match spawned {
            Ok(handle) => lock(&self.receiver).replace(handle),
            Err(err) => {
                warn!(error = %err, "failed to spawn receive thread");
                self.teardown(id);
                None
            }
        };
        if let Some(previous) = previous {
            // The previous client's slot was already cleared, so its thread is exiting.
            let _ = previous.join();
        }
    }

    fn reject(&self, mut stream: ClientStream, endpoint: &str) {
        if let Some(notice) = &self.config.reject_notice {
            let _ = stream.set_write_timeout(Some(REJECT_WRITE_TIMEOUT));
            if let Err(err) = FrameWriter::new(&mut stream).send(notice.as_bytes()) {
                debug!(%endpoint, error = %err, "failed to deliver reject notice");
            }
        }
        let _ = stream.shutdown();

        info!(%endpoint, "rejected connection, another client is active");
        self.events.broadcast(&ServerEvent::Connected {
            endpoint: endpoint.to_string(),
            outcome: ConnectOutcome::Rejected,
        });
    }

    /// Clear the client slot if it still holds connection `id`.
    fn teardown(&self, id: u64) {
        let mut slot = lock(&self.client);
        if slot.as_ref().is_some_and(|c| c.id == id) {
            if let Some(client) = slot.take() {
                let _ = client.control.shutdown();
                info!(endpoint = %client.endpoint, "client disconnected");
            }
        }
    }
}

fn prepare_client(
    stream: &ClientStream,
    frame: &FrameConfig,
) -> Result<(ClientStream, ClientStream)> {
    stream.set_write_timeout(frame.write_timeout)?;
    stream.set_read_timeout(frame.read_timeout)?;
    Ok((stream.try_clone()?, stream.try_clone()?))
}

fn accept_loop(shared: Arc<Shared>, listener: Listener) {
    loop {
        let accepted = listener.accept();
        if shared.is_shutting_down() {
            debug!("accept loop stopping");
            break;
        }
        match accepted {
            Ok((stream, endpoint)) => shared.admit(stream, endpoint),
            Err(err) => {
                warn!(error = %err, "accept failed");
                shared.events.broadcast(&ServerEvent::Error {
                    description: err.to_string(),
                });
                thread::sleep(ACCEPT_BACKOFF);
            }
        }
    }
}

fn receive_loop(shared: Arc<Shared>, id: u64, endpoint: String, mut reader: FrameReader<ClientStream>) {
    loop {
        match reader.read_message() {
            Ok(message) => {
                debug!(%endpoint, size = message.len(), "message received");
                shared.events.broadcast(&ServerEvent::Received {
                    endpoint: endpoint.clone(),
                    message,
                });
            }
            Err(err) => {
                if !shared.is_shutting_down() {
                    info!(%endpoint, error = %err, "connection ended");
                    shared.events.broadcast(&ServerEvent::Error {
                        description: format!("{endpoint}: {err}"),
                    });
                }
                break;
            }
        }
    }
    shared.teardown(id);
}

fn join_unless_current(handle: JoinHandle<()>, role: &str) {
    if handle.thread().id() == thread::current().id() {
        debug!(role, "shutdown requested from server thread; not joining itself");
        return;
    }
    if handle.join().is_err() {
        warn!(role, "server thread panicked");
    }
}
