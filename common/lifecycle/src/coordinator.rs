//! Shutdown coordinator: concurrent, exhaustive close of every store connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use store::{CloseError, StoreConnection};
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::error::LifecycleError;
use crate::metrics;

/// Sole owner of the `close()` side of the store connections.
///
/// Health probes may keep reading the same connections while a shutdown runs:
/// a closed connection simply fails its probe.
pub struct ShutdownCoordinator {
    name: String,
    connections: Vec<Arc<dyn StoreConnection>>,
    close_timeout: Option<Duration>,
}

impl ShutdownCoordinator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            connections: Vec::new(),
            close_timeout: None,
        }
    }

    pub fn with_connection(mut self, connection: Arc<dyn StoreConnection>) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn with_connections<I>(mut self, connections: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn StoreConnection>>,
    {
        self.connections.extend(connections);
        self
    }

    /// Bound on how long a single close may take before it is recorded as
    /// timed out. The close itself keeps running in the background, it is never
    /// cancelled. Without a timeout the host's own termination deadline is the bound.
    pub fn with_close_timeout(mut self, close_timeout: Option<Duration>) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// Close every connection concurrently and wait for all of them to settle.
    /// A failed close never cuts the wait short, every failure is collected.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let clock = Instant::now();
        info!(
            connections = self.connections.len(),
            "Lifecycle: closing store connections"
        );

        let closes = self
            .connections
            .iter()
            .map(|connection| self.close_one(connection.clone()));
        let outcome = ShutdownOutcome {
            reports: join_all(closes).await,
        };

        let clean = outcome.is_clean();
        metrics::emit_shutdown_completed(&self.name, clean);
        if clean {
            info!(
                clean,
                total_duration_secs = clock.elapsed().as_secs_f64(),
                "Lifecycle: store connections closed"
            );
        } else {
            warn!(
                clean,
                total_duration_secs = clock.elapsed().as_secs_f64(),
                failed = ?outcome.failed_stores(),
                "Lifecycle: store connections closed with failures"
            );
        }
        outcome
    }

    async fn close_one(&self, connection: Arc<dyn StoreConnection>) -> CloseReport {
        let store = connection.name().to_owned();
        let started = Instant::now();

        // spawned so that a timed out close keeps running instead of being dropped
        let task = tokio::spawn(async move { connection.close().await });
        let result = match self.close_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => settle(joined),
                Err(_) => Err(CloseError::Timeout(limit)),
            },
            None => settle(task.await),
        };

        let duration = started.elapsed();
        let label = match &result {
            Ok(()) => "closed",
            Err(CloseError::Timeout(_)) => "timeout",
            Err(_) => "failed",
        };
        metrics::emit_store_close(&self.name, &store, label, duration.as_secs_f64());
        match &result {
            Ok(()) => info!(
                store = %store,
                duration_secs = duration.as_secs_f64(),
                "Lifecycle: store connection closed"
            ),
            Err(err) => warn!(
                store = %store,
                duration_secs = duration.as_secs_f64(),
                result = label,
                "Lifecycle: store connection failed to close: {err}"
            ),
        }

        CloseReport {
            store,
            result,
            duration,
        }
    }
}

fn settle(joined: Result<Result<(), CloseError>, JoinError>) -> Result<(), CloseError> {
    joined.unwrap_or_else(|err| Err(CloseError::Panicked(err.to_string())))
}

/// How one connection's close settled.
#[derive(Debug, Clone)]
pub struct CloseReport {
    pub store: String,
    pub result: Result<(), CloseError>,
    pub duration: Duration,
}

/// Every close result of one shutdown, in the order the connections were registered.
#[derive(Debug, Clone)]
pub struct ShutdownOutcome {
    reports: Vec<CloseReport>,
}

impl ShutdownOutcome {
    pub fn reports(&self) -> &[CloseReport] {
        &self.reports
    }

    pub fn is_clean(&self) -> bool {
        self.reports.iter().all(|report| report.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CloseReport> {
        self.reports.iter().filter(|report| report.result.is_err())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn failed_stores(&self) -> Vec<String> {
        self.failures().map(|report| report.store.clone()).collect()
    }

    pub fn into_result(self) -> Result<(), LifecycleError> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(LifecycleError::CloseFailed {
                failed: self.failed_stores(),
            })
        }
    }
}
