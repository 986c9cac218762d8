//! Graceful shutdown of the store connections held by the process.
//!
//! On a termination signal the [`ShutdownCoordinator`] closes every store
//! connection concurrently and waits for all of them to settle, successfully or
//! not, before handing the [`ShutdownOutcome`] back to the host process.

mod coordinator;
mod error;
mod metrics;
mod signals;

pub use coordinator::{CloseReport, ShutdownCoordinator, ShutdownOutcome};
pub use error::LifecycleError;
pub use signals::wait_for_shutdown_signal;
