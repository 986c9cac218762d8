use std::time::Duration;

use thiserror::Error;

/// Errors returned when releasing a store connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloseError {
    #[error("store rejected termination: {0}")]
    Rejected(String),
    #[error("close did not settle within {0:?}")]
    Timeout(Duration),
    #[error("close task panicked: {0}")]
    Panicked(String),
}
