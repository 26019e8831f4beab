//! In-memory transport for tests.
//!
//! Records every sent message, lets tests inject inbound traffic and faults,
//! and can answer requests automatically. Clones share state, so a test keeps
//! one clone while the client owns another.

use crate::codec::OscMessage;
use crate::error::{OscError, Result};
use crate::transport::{OscTransport, TransportEvent};
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

type Responder = dyn Fn(&OscMessage) -> Option<Vec<Value>> + Send + Sync;

#[derive(Default)]
struct MockState {
    sent: Vec<OscMessage>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    replies: HashMap<String, Vec<Value>>,
    responder: Option<Arc<Responder>>,
    open_failures: Vec<io::ErrorKind>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    open: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
    fail_sends: Arc<AtomicBool>,
    sent_notify: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to `address` with `values` (echoing the address).
    pub fn reply(&self, address: impl Into<String>, values: Vec<Value>) -> &Self {
        self.state.lock().replies.insert(address.into(), values);
        self
    }

    /// Answer requests computed from the outbound message. Consulted before
    /// the fixed replies; `None` falls through to them.
    pub fn respond_with<F>(&self, responder: F) -> &Self
    where
        F: Fn(&OscMessage) -> Option<Vec<Value>> + Send + Sync + 'static,
    {
        self.state.lock().responder = Some(Arc::new(responder));
        self
    }

    /// Make the next `open` calls fail with the given error kinds, in order.
    pub fn fail_opens(&self, kinds: impl IntoIterator<Item = io::ErrorKind>) {
        self.state.lock().open_failures.extend(kinds);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Deliver an inbound message as if it arrived from the peer.
    pub fn inject(&self, address: impl Into<String>, values: Vec<Value>) -> bool {
        let message = OscMessage::from_values(address, &values);
        self.emit(TransportEvent::Message(message))
    }

    /// Report a transport fault.
    pub fn inject_error(&self, error: OscError) -> bool {
        self.emit(TransportEvent::Error(error))
    }

    pub fn sent(&self) -> Vec<OscMessage> {
        self.state.lock().sent.clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|m| m.address == address)
            .map(|m| m.clone().into_values())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` messages have been sent.
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.sent_notify.notified();
            if self.sent_count() >= count {
                return;
            }
            notified.await;
        }
    }

    fn emit(&self, event: TransportEvent) -> bool {
        let sender = self.state.lock().events.clone();
        match sender {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

impl OscTransport for MockTransport {
    fn open(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if !state.open_failures.is_empty() {
            let kind = state.open_failures.remove(0);
            return Err(OscError::Bind {
                addr: "mock".into(),
                source: io::Error::new(kind, "mock bind failure"),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(TransportEvent::Ready);
        state.events = Some(tx);
        self.open.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    fn send(&self, message: &OscMessage) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(OscError::NotReady);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(OscError::Send {
                address: message.address.clone(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "mock send failure"),
            });
        }

        let responder = {
            let mut state = self.state.lock();
            state.sent.push(message.clone());
            state.responder.clone()
        };
        self.sent_notify.notify_waiters();

        // responder runs unlocked so it may call back into the mock
        let computed = responder.and_then(|r| r(message));
        let (reply, events) = {
            let state = self.state.lock();
            let reply = computed.or_else(|| state.replies.get(&message.address).cloned());
            (reply, state.events.clone())
        };

        if let (Some(values), Some(tx)) = (reply, events) {
            let _ = tx.send(TransportEvent::Message(OscMessage::from_values(
                message.address.clone(),
                &values,
            )));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.state.lock().events = None;
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
