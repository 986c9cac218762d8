use std::sync::Arc;

use tracing::error;

use crate::probe::HealthCheckable;
use crate::sink::ErrorSink;

pub const HEALTH_CHECK_FAILURES: &str = "health_check_failures_total";

/// The `() -> bool` capability a process supervisor polls.
pub trait HealthChecker: Send + Sync {
    fn is_healthy(&self) -> bool;
}

impl<F> HealthChecker for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_healthy(&self) -> bool {
        self()
    }
}

/// Runs every registered probe and reduces them to a single boolean.
///
/// Probes run in registration order and the first failure wins: it is logged
/// once, reported once, and the remaining probes are not evaluated. A healthy
/// check has no side effect at all. The aggregator keeps no state between two
/// checks, every call recomputes the status from the current connection states.
pub struct HealthAggregator {
    name: String,
    probes: Vec<Box<dyn HealthCheckable>>,
    sink: Arc<dyn ErrorSink>,
}

impl HealthAggregator {
    pub fn new(name: &str, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            name: name.to_owned(),
            probes: Vec::new(),
            sink,
        }
    }

    pub fn with_probe(mut self, probe: impl HealthCheckable + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    /// Names of the registered probes, in evaluation order.
    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|probe| probe.name()).collect()
    }

    pub fn check_all(&self) -> bool {
        for probe in &self.probes {
            if let Err(err) = probe.check() {
                metrics::counter!(HEALTH_CHECK_FAILURES, "store" => err.store().to_owned())
                    .increment(1);
                error!(check = %self.name, store = %err.store(), "{err}");
                self.sink.report(&err);
                return false;
            }
        }
        true
    }
}

impl HealthChecker for HealthAggregator {
    fn is_healthy(&self) -> bool {
        self.check_all()
    }
}
