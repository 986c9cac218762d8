use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lifecycle::{LifecycleError, ShutdownCoordinator};
use store::mock::MockConnection;
use store::{CloseError, ConnectionState, StoreConnection};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn coordinator(connections: &[MockConnection]) -> ShutdownCoordinator {
    ShutdownCoordinator::new("test").with_connections(
        connections
            .iter()
            .map(|conn| -> Arc<dyn StoreConnection> { Arc::new(conn.clone()) }),
    )
}

/// A close that never settles.
struct HangingConnection;

#[async_trait]
impl StoreConnection for HangingConnection {
    fn name(&self) -> &str {
        "hanging"
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Ready
    }

    async fn close(&self) -> Result<(), CloseError> {
        std::future::pending().await
    }
}

struct PanickingConnection;

#[async_trait]
impl StoreConnection for PanickingConnection {
    fn name(&self) -> &str {
        "panicking"
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Ready
    }

    async fn close(&self) -> Result<(), CloseError> {
        panic!("boom")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closes_every_connection() {
    let ingress = MockConnection::ready("ingress");
    let rate_limit = MockConnection::ready("rate limit");

    let outcome = coordinator(&[ingress.clone(), rate_limit.clone()])
        .shutdown()
        .await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.failure_count(), 0);
    assert_eq!(ingress.close_calls(), 1);
    assert_eq!(rate_limit.close_calls(), 1);
    assert_eq!(ingress.state(), ConnectionState::Closed);
    assert_eq!(rate_limit.state(), ConnectionState::Closed);
    assert_eq!(outcome.into_result(), Ok(()));
}

#[tokio::test]
async fn empty_coordinator_is_clean() {
    let outcome = ShutdownCoordinator::new("test").shutdown().await;
    assert!(outcome.is_clean());
    assert!(outcome.reports().is_empty());
}

#[tokio::test]
async fn failures_do_not_cut_the_wait_short() {
    // 5 connections, 2 of them fail fast while the others are still closing
    let connections = vec![
        MockConnection::ready("a").failing_close("rejected"),
        MockConnection::ready("b").with_close_delay(Duration::from_millis(150)),
        MockConnection::ready("c").failing_close("rejected"),
        MockConnection::ready("d").with_close_delay(Duration::from_millis(200)),
        MockConnection::ready("e"),
    ];

    let started = Instant::now();
    let outcome = coordinator(&connections).shutdown().await;

    assert!(started.elapsed() >= Duration::from_millis(200));
    for conn in &connections {
        assert_eq!(conn.close_calls(), 1);
    }
    assert_eq!(outcome.reports().len(), 5);
    assert!(outcome.reports()[1].duration >= Duration::from_millis(150));
    assert!(outcome.reports()[3].duration >= Duration::from_millis(200));
    assert_eq!(outcome.failure_count(), 2);
    assert_eq!(outcome.failed_stores(), vec!["a".to_string(), "c".to_string()]);
    assert_eq!(
        outcome.into_result(),
        Err(LifecycleError::CloseFailed {
            failed: vec!["a".to_string(), "c".to_string()]
        })
    );
}

#[tokio::test]
async fn closes_run_concurrently() {
    let connections = vec![
        MockConnection::ready("ingress").with_close_delay(Duration::from_millis(300)),
        MockConnection::ready("rate limit").with_close_delay(Duration::from_millis(300)),
    ];

    let started = Instant::now();
    let outcome = coordinator(&connections).shutdown().await;

    assert!(outcome.is_clean());
    // sequential closes would need 600ms
    assert!(started.elapsed() < Duration::from_millis(550));
}

#[tokio::test]
async fn timeout_is_reported_per_connection() {
    let ingress = MockConnection::ready("ingress");
    let outcome = ShutdownCoordinator::new("test")
        .with_connection(Arc::new(ingress.clone()))
        .with_connection(Arc::new(HangingConnection))
        .with_close_timeout(Some(Duration::from_millis(50)))
        .shutdown()
        .await;

    assert_eq!(outcome.failure_count(), 1);
    let report = outcome.failures().next().unwrap();
    assert_eq!(report.store, "hanging");
    assert_eq!(
        report.result,
        Err(CloseError::Timeout(Duration::from_millis(50)))
    );
    // stopped waiting at the limit, not when the close settled
    assert!(report.duration >= Duration::from_millis(50));
    assert!(report.duration < Duration::from_secs(1));
    assert_eq!(ingress.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn panicking_close_is_collected() {
    let ingress = MockConnection::ready("ingress");
    let outcome = ShutdownCoordinator::new("test")
        .with_connection(Arc::new(PanickingConnection))
        .with_connection(Arc::new(ingress.clone()))
        .shutdown()
        .await;

    assert_eq!(outcome.failed_stores(), vec!["panicking".to_string()]);
    assert!(matches!(
        outcome.reports()[0].result,
        Err(CloseError::Panicked(_))
    ));
    assert_eq!(ingress.close_calls(), 1);
}

#[tokio::test]
async fn state_turns_closed_once_shutdown_settles() {
    // state reads stay possible while the shutdown runs
    let ingress = MockConnection::ready("ingress").with_close_delay(Duration::from_millis(50));
    let shutdown = {
        let coordinator = coordinator(&[ingress.clone()]);
        tokio::spawn(async move { coordinator.shutdown().await })
    };

    assert_eq!(ingress.state(), ConnectionState::Ready);
    let outcome = shutdown.await.unwrap();
    assert!(outcome.is_clean());
    assert_eq!(ingress.state(), ConnectionState::Closed);
}
