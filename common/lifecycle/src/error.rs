//! Lifecycle error types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Some store connections did not close cleanly. Every other close still ran
    /// to completion before this was returned.
    #[error("store connections failed to close: {}", failed.join(", "))]
    CloseFailed { failed: Vec<String> },
}
