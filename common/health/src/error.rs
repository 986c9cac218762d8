use store::ConnectionState;
use thiserror::Error;

/// A store failed its probe policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckError {
    #[error("{store} store unhealthy: state={state}")]
    Unhealthy {
        store: String,
        state: ConnectionState,
    },
    #[error("{store} store unhealthy: node {node} of {nodes} state={state}")]
    NodeUnhealthy {
        store: String,
        node: usize,
        nodes: usize,
        state: ConnectionState,
    },
    #[error("{store} store unhealthy: no connection configured")]
    NoConnections { store: String },
}

impl HealthCheckError {
    /// Logical name of the store that failed.
    pub fn store(&self) -> &str {
        match self {
            HealthCheckError::Unhealthy { store, .. }
            | HealthCheckError::NodeUnhealthy { store, .. }
            | HealthCheckError::NoConnections { store } => store,
        }
    }
}
