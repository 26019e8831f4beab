//! Correlator ordering and settlement properties
//!
//! Run with:
//! ```bash
//! cargo test -p liveline-osc --test correlator
//! ```

#![cfg(feature = "test-util")]

use liveline_osc::{
    MockTransport, OscClient, OscConfig, OscError, OscSession, SessionConfig, SessionPhase,
    Timeouts, Value, HEALTH_CHECK_ADDRESS,
};
use std::sync::Arc;
use std::time::Duration;

async fn open_client() -> (OscClient, MockTransport) {
    let mock = MockTransport::new();
    let client = OscClient::with_transport(OscConfig::default(), Box::new(mock.clone()));
    client.open().await.unwrap();
    (client, mock)
}

// =============================================================================
// Per-address single flight
// =============================================================================

#[tokio::test]
async fn test_same_address_second_send_waits_for_first() {
    let (client, mock) = open_client().await;

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.query("/addr", &[Value::Int(1)], Timeouts::QUERY).await }
    });
    let second = tokio::spawn({
        let client = client.clone();
        async move { client.query("/addr", &[Value::Int(2)], Timeouts::QUERY).await }
    });

    mock.wait_for_sent(1).await;
    // give the second task every chance to jump the queue
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(mock.sent_count(), 1);
    assert_eq!(client.pending_count(), 1);

    assert!(mock.inject("/addr", vec![Value::from("one")]));
    assert_eq!(first.await.unwrap().unwrap(), vec![Value::from("one")]);

    mock.wait_for_sent(2).await;
    let sends = mock.sent_to("/addr");
    assert_eq!(sends, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);

    assert!(mock.inject("/addr", vec![Value::from("two")]));
    assert_eq!(second.await.unwrap().unwrap(), vec![Value::from("two")]);
    assert_eq!(client.queued_addresses(), 0);
}

#[tokio::test]
async fn test_different_addresses_send_immediately() {
    let (client, mock) = open_client().await;

    let a = tokio::spawn({
        let client = client.clone();
        async move { client.query("/a", &[], Timeouts::QUERY).await }
    });
    let b = tokio::spawn({
        let client = client.clone();
        async move { client.query("/b", &[], Timeouts::QUERY).await }
    });

    mock.wait_for_sent(2).await;
    assert_eq!(client.pending_count(), 2);

    // answer out of submission order
    mock.inject("/b", vec![Value::Int(2)]);
    mock.inject("/a", vec![Value::Int(1)]);
    assert_eq!(b.await.unwrap().unwrap(), vec![Value::Int(2)]);
    assert_eq!(a.await.unwrap().unwrap(), vec![Value::Int(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_releases_queue_for_next_request() {
    let (client, mock) = open_client().await;

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.query("/slow", &[], Duration::from_millis(50)).await }
    });
    let second = tokio::spawn({
        let client = client.clone();
        async move { client.query("/slow", &[], Duration::from_millis(500)).await }
    });

    match first.await.unwrap() {
        Err(OscError::Timeout { address, timeout_ms }) => {
            assert_eq!(address, "/slow");
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("Expected Timeout, got {:?}", other),
    }

    mock.wait_for_sent(2).await;
    mock.inject("/slow", vec![Value::from("late")]);
    assert_eq!(second.await.unwrap().unwrap(), vec![Value::from("late")]);
}

// =============================================================================
// Settlement
// =============================================================================

#[tokio::test]
async fn test_close_rejects_all_outstanding_including_queued() {
    let (client, mock) = open_client().await;

    let mut handles = Vec::new();
    for address in ["/x", "/x", "/y", "/z"] {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.query(address, &[], Timeouts::QUERY).await
        }));
    }
    mock.wait_for_sent(3).await;

    client.close().await;
    for handle in handles {
        match handle.await.unwrap() {
            Err(OscError::Closing) => {}
            other => panic!("Expected Closing, got {:?}", other),
        }
    }
    assert_eq!(client.pending_count(), 0);
    assert_eq!(mock.sent_count(), 3);
}

#[tokio::test]
async fn test_response_delivered_exactly_once() {
    let (client, mock) = open_client().await;
    let mut stray = client.subscribe("/once");

    let query = tokio::spawn({
        let client = client.clone();
        async move { client.query("/once", &[], Timeouts::QUERY).await }
    });
    mock.wait_for_sent(1).await;

    mock.inject("/once", vec![Value::Int(1)]);
    mock.inject("/once", vec![Value::Int(2)]);
    assert_eq!(query.await.unwrap().unwrap(), vec![Value::Int(1)]);

    // the duplicate has no pending request to claim it
    assert_eq!(stray.recv().await, Some(vec![Value::Int(2)]));
}

#[tokio::test]
async fn test_reopen_after_close_serves_queries() {
    let (client, mock) = open_client().await;
    mock.reply("/live/song/get/tempo", vec![Value::Float(98.5)]);

    client.close().await;
    client.open().await.unwrap();
    let values = client
        .query("/live/song/get/tempo", &[], Timeouts::QUERY)
        .await
        .unwrap();
    approx::assert_relative_eq!(values[0].as_f64().unwrap(), 98.5);
}

// =============================================================================
// Gatekeeper
// =============================================================================

#[tokio::test]
async fn test_concurrent_callers_share_one_verification() {
    let mock = MockTransport::new();
    mock.reply(HEALTH_CHECK_ADDRESS, vec![Value::from("ok")]);
    let factory_mock = mock.clone();
    let session = Arc::new(OscSession::with_factory(
        SessionConfig::default(),
        Arc::new(move |osc: &OscConfig| {
            OscClient::with_transport(osc.clone(), Box::new(factory_mock.clone()))
        }),
    ));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let session = session.clone();
        handles.push(tokio::spawn(async move { session.ensure_connected().await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(session.verification_count(), 1);
    assert_eq!(mock.sent_to(HEALTH_CHECK_ADDRESS).len(), 1);
    assert_eq!(session.phase(), SessionPhase::Verified);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_failed_attempt() {
    // the peer never answers
    let mock = MockTransport::new();
    let factory_mock = mock.clone();
    let session = Arc::new(OscSession::with_factory(
        SessionConfig::default().with_health_check_timeout(Duration::from_millis(100)),
        Arc::new(move |osc: &OscConfig| {
            OscClient::with_transport(osc.clone(), Box::new(factory_mock.clone()))
        }),
    ));

    let started = tokio::time::Instant::now();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let session = session.clone();
        handles.push(tokio::spawn(async move { session.ensure_connected().await }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Err(err @ OscError::ConnectionLost { .. }) => {
                assert!(err.to_string().contains("3 reconnect attempts"));
            }
            other => panic!("Expected ConnectionLost, got {:?}", other.map(|_| ())),
        }
    }

    // one initial check plus three reconnects, shared by every caller
    assert_eq!(session.verification_count(), 4);
    assert_eq!(mock.open_count(), 4);
    assert_eq!(mock.sent_to(HEALTH_CHECK_ADDRESS).len(), 4);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(session.phase(), SessionPhase::Uninitialized);

    // a caller arriving afterwards gets a fresh attempt
    assert!(session.ensure_connected().await.is_err());
    assert_eq!(session.verification_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_recovers_when_peer_returns() {
    let mock = MockTransport::new();
    let factory_mock = mock.clone();
    let session = OscSession::with_factory(
        SessionConfig::default().with_health_check_timeout(Duration::from_millis(100)),
        Arc::new(move |osc: &OscConfig| {
            OscClient::with_transport(osc.clone(), Box::new(factory_mock.clone()))
        }),
    );

    // the peer starts answering after the first probe has gone unanswered
    let probes = mock.clone();
    mock.respond_with(move |msg| {
        (msg.address == HEALTH_CHECK_ADDRESS && probes.sent_to(HEALTH_CHECK_ADDRESS).len() > 1)
            .then(|| vec![Value::from("ok")])
    });

    let client = session.ensure_connected().await.unwrap();
    assert!(client.is_ready());
    assert_eq!(session.verification_count(), 2);
    assert_eq!(mock.open_count(), 2);
}
