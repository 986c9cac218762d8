//! Readiness of the process, derived from the state of its store connections.
//!
//! Each store gets a [`StoreProbe`] with a [`ProbePolicy`] matching how much
//! transient unavailability it tolerates. The [`HealthAggregator`] runs the
//! probes in registration order and stops at the first failure, which it logs
//! and forwards to an [`ErrorSink`]. Nothing is cached between two checks: a
//! check is a handful of in-memory state reads, so it is simply recomputed.

mod aggregator;
mod error;
mod probe;
mod readiness;
mod sink;

pub use aggregator::{HealthAggregator, HealthChecker};
pub use error::HealthCheckError;
pub use probe::{HealthCheckable, ParseProbePolicyError, ProbePolicy, StoreProbe};
pub use readiness::{ReadinessHandler, ReadinessStatus};
pub use sink::{ErrorSink, NoopSink};
