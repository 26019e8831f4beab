//! Connection gatekeeper.
//!
//! Owns the one shared [`OscClient`], opens it lazily and verifies liveness
//! once per session. Every caller goes through the same async lock, so a burst
//! of callers arriving while an attempt is in flight shares its outcome: on
//! success they take the verified fast path, on failure they all get the
//! attempt's error instead of starting attempts of their own.

use crate::client::OscClient;
use crate::config::{OscConfig, SessionConfig};
use crate::error::{OscError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Builds a fresh client whenever the session needs one.
pub type ClientFactory = Arc<dyn Fn(&OscConfig) -> OscClient + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No client exists.
    Uninitialized,
    Opening,
    Verifying,
    Verified,
    /// Client exists but must be re-verified before use.
    Unverified,
}

pub struct OscSession {
    config: SessionConfig,
    factory: ClientFactory,
    slot: tokio::sync::Mutex<Option<OscClient>>,
    phase: Mutex<SessionPhase>,
    verifications: AtomicU64,
    /// Bumped when a connection attempt finishes, whatever its outcome.
    attempts: AtomicU64,
    last_failure: Mutex<Option<OscError>>,
    closed: AtomicBool,
}

impl OscSession {
    /// Session over UDP clients.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_factory(config, Arc::new(|osc: &OscConfig| OscClient::new(osc.clone())))
    }

    pub fn with_factory(config: SessionConfig, factory: ClientFactory) -> Self {
        Self {
            config,
            factory,
            slot: tokio::sync::Mutex::new(None),
            phase: Mutex::new(SessionPhase::Uninitialized),
            verifications: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock()
    }

    /// Health checks performed so far.
    pub fn verification_count(&self) -> u64 {
        self.verifications.load(Ordering::SeqCst)
    }

    /// True once [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: SessionPhase) {
        *self.phase.lock() = phase;
    }

    fn get_or_create(&self, slot: &mut Option<OscClient>) -> OscClient {
        slot.get_or_insert_with(|| {
            tracing::debug!("Creating OSC client");
            (self.factory)(&self.config.osc)
        })
        .clone()
    }

    /// A connected, verified client.
    ///
    /// Opens and verifies as needed; on failure runs the bounded reconnect
    /// sequence. When that is exhausted the client is discarded and
    /// [`OscError::ConnectionLost`] returned. Port conflicts are never retried.
    /// After [`shutdown`](Self::shutdown) this fails with [`OscError::Closing`].
    pub async fn ensure_connected(&self) -> Result<OscClient> {
        self.gate(true).await
    }

    /// One open-and-verify attempt without the reconnect sequence.
    ///
    /// Shares the gatekeeper lock with [`ensure_connected`](Self::ensure_connected),
    /// so it never races a reconnect. A failed attempt discards the client.
    pub async fn check(&self) -> Result<OscClient> {
        self.gate(false).await
    }

    async fn gate(&self, reconnect: bool) -> Result<OscClient> {
        let seen = self.attempts.load(Ordering::SeqCst);
        let mut slot = self.slot.lock().await;

        if self.is_closed() {
            return Err(OscError::Closing);
        }

        if self.phase() == SessionPhase::Verified {
            if let Some(client) = slot.as_ref().filter(|c| c.is_ready()) {
                return Ok(client.clone());
            }
        }

        // an attempt finished while we queued for the lock
        if self.attempts.load(Ordering::SeqCst) != seen {
            if let Some(err) = self.last_failure.lock().clone() {
                tracing::debug!(error = %err, "Sharing failed OSC connection attempt");
                return Err(err);
            }
        }

        let outcome = self.attempt(&mut slot, reconnect).await;
        *self.last_failure.lock() = outcome.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn attempt(&self, slot: &mut Option<OscClient>, reconnect: bool) -> Result<OscClient> {
        match self.establish(slot).await {
            Ok(client) => Ok(client),
            Err(err) if err.is_port_in_use() || !reconnect => {
                self.discard(slot).await;
                Err(err)
            }
            Err(err) => {
                tracing::warn!(error = %err, "OSC connection check failed");
                self.reconnect(slot, err).await
            }
        }
    }

    async fn establish(&self, slot: &mut Option<OscClient>) -> Result<OscClient> {
        let client = self.get_or_create(slot);

        if !client.is_ready() {
            self.set_phase(SessionPhase::Opening);
            if let Err(err) = client.open().await {
                self.set_phase(SessionPhase::Unverified);
                return Err(err);
            }
        }

        self.set_phase(SessionPhase::Verifying);
        self.verifications.fetch_add(1, Ordering::SeqCst);
        if client.health_check(self.config.health_check_timeout).await {
            self.set_phase(SessionPhase::Verified);
            Ok(client)
        } else {
            self.set_phase(SessionPhase::Unverified);
            Err(OscError::Connection {
                host: client.host().to_string(),
                send_port: client.send_port(),
                receive_port: client.receive_port(),
            })
        }
    }

    async fn reconnect(&self, slot: &mut Option<OscClient>, mut last: OscError) -> Result<OscClient> {
        let max = self.config.max_reconnect_attempts;

        for attempt in 1..=max {
            if let Some(client) = slot.as_ref() {
                client.close().await;
            }
            tokio::time::sleep(self.config.reconnect_backoff * attempt).await;
            tracing::warn!(attempt, max, "Reconnecting to AbletonOSC");

            match self.establish(slot).await {
                Ok(client) => {
                    tracing::info!(attempt, "Reconnected to AbletonOSC");
                    return Ok(client);
                }
                Err(err) if err.is_port_in_use() => {
                    self.discard(slot).await;
                    return Err(err);
                }
                Err(err) => last = err,
            }
        }

        tracing::error!(attempts = max, error = %last, "Giving up on AbletonOSC connection");
        self.discard(slot).await;
        Err(OscError::ConnectionLost {
            attempts: max,
            host: self.config.osc.host.clone(),
            send_port: self.config.osc.send_port,
            receive_port: self.config.osc.receive_port,
        })
    }

    async fn discard(&self, slot: &mut Option<OscClient>) {
        if let Some(client) = slot.take() {
            client.close().await;
        }
        self.set_phase(SessionPhase::Uninitialized);
    }

    /// Force the next [`ensure_connected`](Self::ensure_connected) to
    /// re-verify. Call after a query against the shared client fails.
    pub fn mark_unverified(&self) {
        let mut phase = self.phase.lock();
        if *phase == SessionPhase::Verified {
            tracing::debug!("OSC session marked unverified");
            *phase = SessionPhase::Unverified;
        }
    }

    /// Close and drop the client for good. Later connection requests fail
    /// with [`OscError::Closing`].
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut slot = self.slot.lock().await;
        self.discard(&mut slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HEALTH_CHECK_ADDRESS;
    use crate::mock::MockTransport;
    use crate::value::Value;
    use std::time::Duration;

    fn session_over(mock: &MockTransport) -> OscSession {
        let mock = mock.clone();
        let config = SessionConfig::default()
            .with_health_check_timeout(Duration::from_millis(100))
            .with_reconnect_backoff(Duration::from_millis(10));
        OscSession::with_factory(
            config,
            Arc::new(move |osc: &OscConfig| {
                OscClient::with_transport(osc.clone(), Box::new(mock.clone()))
            }),
        )
    }

    #[tokio::test]
    async fn test_first_call_opens_and_verifies() {
        let mock = MockTransport::new();
        mock.reply(HEALTH_CHECK_ADDRESS, vec![Value::from("ok")]);
        let session = session_over(&mock);
        assert_eq!(session.phase(), SessionPhase::Uninitialized);

        let client = session.ensure_connected().await.unwrap();
        assert!(client.is_ready());
        assert_eq!(session.phase(), SessionPhase::Verified);
        assert_eq!(session.verification_count(), 1);

        session.ensure_connected().await.unwrap();
        assert_eq!(session.verification_count(), 1);
        assert_eq!(mock.open_count(), 1);
    }

    #[tokio::test]
    async fn test_mark_unverified_forces_recheck() {
        let mock = MockTransport::new();
        mock.reply(HEALTH_CHECK_ADDRESS, vec![Value::from("ok")]);
        let session = session_over(&mock);

        session.ensure_connected().await.unwrap();
        session.mark_unverified();
        assert_eq!(session.phase(), SessionPhase::Unverified);

        session.ensure_connected().await.unwrap();
        assert_eq!(session.verification_count(), 2);
        assert_eq!(mock.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reconnect_discards_client() {
        let mock = MockTransport::new();
        let session = session_over(&mock);

        match session.ensure_connected().await {
            Err(err @ OscError::ConnectionLost { .. }) => {
                assert!(err.to_string().contains("3 reconnect attempts"));
            }
            other => panic!("Expected ConnectionLost, got {:?}", other),
        }
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
        // initial check plus three reconnects
        assert_eq!(session.verification_count(), 4);
        assert_eq!(mock.open_count(), 4);
    }

    #[tokio::test]
    async fn test_port_in_use_is_not_retried() {
        let mock = MockTransport::new();
        mock.fail_opens([std::io::ErrorKind::AddrInUse]);
        let session = session_over(&mock);

        match session.ensure_connected().await {
            Err(err) => assert!(err.is_port_in_use()),
            Ok(_) => panic!("Expected port-in-use failure"),
        }
        assert_eq!(mock.open_count(), 1);
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_shutdown_resets() {
        let mock = MockTransport::new();
        mock.reply(HEALTH_CHECK_ADDRESS, vec![Value::from("ok")]);
        let session = session_over(&mock);

        let client = session.ensure_connected().await.unwrap();
        session.shutdown().await;
        assert!(!client.is_ready());
        assert!(session.is_closed());
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_closed_session_refuses_to_reconnect() {
        let mock = MockTransport::new();
        mock.reply(HEALTH_CHECK_ADDRESS, vec![Value::from("ok")]);
        let session = session_over(&mock);

        session.ensure_connected().await.unwrap();
        session.shutdown().await;

        match session.ensure_connected().await {
            Err(OscError::Closing) => {}
            other => panic!("Expected Closing, got {:?}", other.map(|_| ())),
        }
        match session.check().await {
            Err(OscError::Closing) => {}
            other => panic!("Expected Closing, got {:?}", other.map(|_| ())),
        }
        assert_eq!(mock.open_count(), 1);
        assert_eq!(session.verification_count(), 1);
    }

    // --- single attempt ---

    #[tokio::test]
    async fn test_check_verifies_without_reconnecting() {
        let mock = MockTransport::new();
        mock.reply(HEALTH_CHECK_ADDRESS, vec![Value::from("ok")]);
        let session = session_over(&mock);

        let client = session.check().await.unwrap();
        assert!(client.is_ready());
        assert_eq!(session.phase(), SessionPhase::Verified);

        // the verified client serves later callers without another probe
        session.ensure_connected().await.unwrap();
        assert_eq!(session.verification_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_check_discards_client() {
        let mock = MockTransport::new();
        let session = session_over(&mock);

        match session.check().await {
            Err(OscError::Connection { .. }) => {}
            other => panic!("Expected Connection, got {:?}", other.map(|_| ())),
        }
        assert_eq!(session.verification_count(), 1);
        assert_eq!(mock.open_count(), 1);
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
    }
}
