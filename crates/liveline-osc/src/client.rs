//! Request/response client over a fire-and-forget transport.
//!
//! The wire protocol carries no request ids, so a response is matched to its
//! request by address alone. To keep that unambiguous the client allows at
//! most one outstanding request per address: a second `query` to the same
//! address waits for the first to settle before it is sent. Requests to
//! different addresses run fully concurrently.

use crate::codec::OscMessage;
use crate::config::{OscConfig, Timeouts};
use crate::error::{ErrorClassification, ErrorKind, OscError, Result};
use crate::transport::{OscTransport, TransportEvent, UdpTransport};
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Liveness probe address. The peer answers with the single string `"ok"`.
pub const HEALTH_CHECK_ADDRESS: &str = "/live/test";
const HEALTH_CHECK_REPLY: &str = "ok";

struct PendingRequest {
    id: u64,
    reply: oneshot::Sender<Result<Vec<Value>>>,
}

#[derive(Default)]
struct CorrelatorState {
    /// At most one per address.
    pending: HashMap<String, PendingRequest>,
    /// Per-address single-flight locks.
    queues: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
    listeners: HashMap<String, mpsc::UnboundedSender<Vec<Value>>>,
}

struct ClientInner {
    config: OscConfig,
    ready: AtomicBool,
    /// Bumped on every close so queued requests from a previous open fail.
    epoch: AtomicU64,
    next_id: AtomicU64,
    transport: Mutex<Box<dyn OscTransport>>,
    state: Mutex<CorrelatorState>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    last_error: Mutex<Option<String>>,
    /// Serializes open and close.
    lifecycle: tokio::sync::Mutex<()>,
}

impl ClientInner {
    fn route(&self, message: OscMessage) {
        let address = message.address.clone();
        let values = message.into_values();

        let mut state = self.state.lock();
        if let Some(pending) = state.pending.remove(&address) {
            drop(state);
            let _ = pending.reply.send(Ok(values));
            return;
        }

        let delivered = state
            .listeners
            .get(&address)
            .map(|listener| listener.send(values).is_ok());
        match delivered {
            Some(true) => {}
            Some(false) => {
                state.listeners.remove(&address);
            }
            None => {
                tracing::debug!(address = %address, "Dropping unsolicited OSC message");
            }
        }
    }

    fn record_transport_error(&self, err: OscError) {
        if err.is_port_in_use() {
            tracing::error!(
                port = self.config.receive_port,
                error = %err,
                "OSC port error: check if another process is using the receive port"
            );
        } else {
            tracing::warn!(error = %err, "OSC transport error");
        }
        *self.last_error.lock() = Some(err.to_string());
    }

    fn remove_pending(&self, address: &str, id: u64) {
        let mut state = self.state.lock();
        if state.pending.get(address).map(|p| p.id) == Some(id) {
            state.pending.remove(address);
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.get_mut().take() {
            handle.abort();
        }
        self.transport.get_mut().close();
    }
}

/// Removes a request's pending entry when the query finishes, however it
/// finishes (timeout, send failure, or the caller dropping the future).
struct PendingSlot<'a> {
    inner: &'a ClientInner,
    address: &'a str,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.inner.remove_pending(self.address, self.id);
    }
}

/// Holds the per-address turn. Dropping it lets the next queued request go
/// and forgets the queue entry once nobody else is waiting on it.
struct QueueTurn {
    inner: Arc<ClientInner>,
    address: String,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for QueueTurn {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut state = self.inner.state.lock();
        let idle = state
            .queues
            .get(&self.address)
            .map(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(&self.lock) == 2)
            .unwrap_or(false);
        if idle {
            state.queues.remove(&self.address);
        }
    }
}

/// OSC request/response client.
///
/// Cloning is cheap - all state is shared behind an `Arc`.
#[derive(Clone)]
pub struct OscClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for OscClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscClient")
            .field("host", &self.inner.config.host)
            .field("send_port", &self.inner.config.send_port)
            .field("receive_port", &self.inner.config.receive_port)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl OscClient {
    /// Client over UDP. Nothing is bound until [`open`](Self::open).
    pub fn new(config: OscConfig) -> Self {
        let transport = UdpTransport::new(config.clone());
        Self::with_transport(config, Box::new(transport))
    }

    pub fn with_transport(config: OscConfig, transport: Box<dyn OscTransport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                ready: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                transport: Mutex::new(transport),
                state: Mutex::new(CorrelatorState::default()),
                dispatcher: Mutex::new(None),
                last_error: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &OscConfig {
        &self.inner.config
    }

    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    pub fn send_port(&self) -> u16 {
        self.inner.config.send_port
    }

    pub fn receive_port(&self) -> u16 {
        self.inner.config.receive_port
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Most recent transport-level fault, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Number of addresses with a live single-flight queue.
    pub fn queued_addresses(&self) -> usize {
        self.inner.state.lock().queues.len()
    }

    /// Bind the transport and wait for it to become ready.
    ///
    /// Idempotent. Bind failures (including port-in-use) are returned as-is.
    pub async fn open(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        let opened = self.inner.transport.lock().open();
        let mut events = match opened {
            Ok(events) => events,
            Err(err) => return Err(self.fail_open(err)),
        };

        loop {
            match events.recv().await {
                Some(TransportEvent::Ready) => break,
                Some(TransportEvent::Error(err)) => {
                    self.inner.transport.lock().close();
                    return Err(self.fail_open(err));
                }
                Some(TransportEvent::Message(message)) => {
                    tracing::debug!(address = %message.address, "Dropping OSC message received before ready");
                }
                None => {
                    self.inner.transport.lock().close();
                    return Err(self.fail_open(OscError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotConnected,
                        "transport closed before becoming ready",
                    ))));
                }
            }
        }

        let dispatcher = spawn_dispatcher(Arc::downgrade(&self.inner), events);
        *self.inner.dispatcher.lock() = Some(dispatcher);
        *self.inner.last_error.lock() = None;
        self.inner.ready.store(true, Ordering::SeqCst);

        tracing::info!(
            host = %self.inner.config.host,
            send_port = self.inner.config.send_port,
            receive_port = self.inner.config.receive_port,
            "OSC client ready"
        );
        Ok(())
    }

    fn fail_open(&self, err: OscError) -> OscError {
        if err.is_port_in_use() {
            tracing::error!(
                port = self.inner.config.receive_port,
                error = %err,
                "OSC receive port already in use"
            );
        } else {
            tracing::warn!(error = %err, "Failed to open OSC client");
        }
        *self.inner.last_error.lock() = Some(err.to_string());
        err
    }

    /// Reject every outstanding request with [`OscError::Closing`], drop all
    /// correlator state and release the transport. Idempotent.
    pub async fn close(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let was_ready = self.inner.ready.swap(false, Ordering::SeqCst);
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        let drained: Vec<PendingRequest> = {
            let mut state = self.inner.state.lock();
            state.queues.clear();
            state.pending.drain().map(|(_, pending)| pending).collect()
        };
        let rejected = drained.len();
        for pending in drained {
            let _ = pending.reply.send(Err(OscError::Closing));
        }

        if let Some(handle) = self.inner.dispatcher.lock().take() {
            handle.abort();
        }
        self.inner.transport.lock().close();

        if was_ready {
            tracing::info!(rejected, "OSC client closed");
        }
    }

    /// Send `args` to `address` and wait for the response on the same address.
    ///
    /// Waits behind any in-flight request to the same address first. The
    /// timeout covers only the wait for the response, not the queueing.
    pub async fn query(
        &self,
        address: &str,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Vec<Value>> {
        if !self.is_ready() {
            return Err(OscError::NotReady);
        }

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let _turn = self.acquire_turn(address).await;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.state.lock();
            // checked under the state lock so close() either sees this entry or we see it closed
            if !self.is_ready() || self.inner.epoch.load(Ordering::SeqCst) != epoch {
                return Err(OscError::Closing);
            }
            state
                .pending
                .insert(address.to_string(), PendingRequest { id, reply: tx });
        }
        let _slot = PendingSlot {
            inner: &self.inner,
            address,
            id,
        };

        let message = OscMessage::from_values(address, args);
        self.inner.transport.lock().send(&message)?;
        tracing::trace!(address, args = ?args, "OSC request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OscError::Closing),
            Err(_) => {
                tracing::debug!(address, timeout_ms = timeout.as_millis() as u64, "OSC query timed out");
                Err(OscError::Timeout {
                    address: address.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Fire-and-forget send, no response expected.
    pub fn send(&self, address: &str, args: &[Value]) -> Result<()> {
        if !self.is_ready() {
            return Err(OscError::NotReady);
        }
        let message = OscMessage::from_values(address, args);
        self.inner.transport.lock().send(&message)?;
        tracing::trace!(address, args = ?args, "OSC message sent");
        Ok(())
    }

    async fn acquire_turn(&self, address: &str) -> QueueTurn {
        let lock = {
            let mut state = self.inner.state.lock();
            state.queues.entry(address.to_string()).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;
        QueueTurn {
            inner: self.inner.clone(),
            address: address.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// Receive messages on `address` that no request claims.
    ///
    /// Replaces any previous subscription to the same address.
    pub fn subscribe(&self, address: impl Into<String>) -> mpsc::UnboundedReceiver<Vec<Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.state.lock().listeners.insert(address.into(), tx);
        rx
    }

    pub fn unsubscribe(&self, address: &str) -> bool {
        self.inner.state.lock().listeners.remove(address).is_some()
    }

    /// Probe the peer. Never fails: any error yields `false`.
    pub async fn health_check(&self, timeout: Duration) -> bool {
        match self.query(HEALTH_CHECK_ADDRESS, &[], timeout).await {
            Ok(values) => values.first().and_then(Value::as_str) == Some(HEALTH_CHECK_REPLY),
            Err(err) => {
                tracing::debug!(error = %err, "OSC health check failed");
                false
            }
        }
    }

    /// Health check that turns failure into a descriptive error.
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.health_check(Timeouts::HEALTH_CHECK).await {
            Ok(())
        } else {
            Err(OscError::Connection {
                host: self.inner.config.host.clone(),
                send_port: self.inner.config.send_port,
                receive_port: self.inner.config.receive_port,
            })
        }
    }

    /// Classify a failure for the caller.
    ///
    /// Precedence: not ready, then timeout, then port in use, else unknown.
    pub fn classify_error(&self, err: &OscError) -> ErrorClassification {
        if !self.is_ready() {
            return ErrorClassification {
                kind: ErrorKind::NotReady,
                message: "OSC client not ready. Call open() and wait for ready event.".into(),
                recoverable: true,
            };
        }

        if err.is_timeout() {
            return ErrorClassification {
                kind: ErrorKind::Timeout,
                message: "OSC request timed out. Check if AbletonOSC is running and responding."
                    .into(),
                recoverable: true,
            };
        }

        if err.is_port_in_use() {
            return ErrorClassification {
                kind: ErrorKind::PortInUse,
                message: format!(
                    "Port {} already in use. Close other OSC clients or change OSC_RECEIVE_PORT.",
                    self.inner.config.receive_port
                ),
                recoverable: false,
            };
        }

        ErrorClassification {
            kind: ErrorKind::Unknown,
            message: err.to_string(),
            recoverable: false,
        }
    }
}

fn spawn_dispatcher(
    inner: Weak<ClientInner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            match event {
                TransportEvent::Message(message) => inner.route(message),
                TransportEvent::Error(err) => inner.record_transport_error(err),
                TransportEvent::Ready => {}
            }
        }
    })
}
