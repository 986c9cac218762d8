use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use store::{ConnectionState, StoreConnection};
use thiserror::Error;

use crate::error::HealthCheckError;

/// Rule mapping the state of a store connection to pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbePolicy {
    /// Only `ready` passes. For stores whose connection quality gates correctness.
    #[default]
    StrictReady,
    /// Anything still alive or on its way back passes, only a broken connection
    /// fails. For stores where reconnects are expected, like a cluster of
    /// replaceable nodes.
    TolerantLiveness,
}

impl ProbePolicy {
    pub fn allows(&self, state: ConnectionState) -> bool {
        match self {
            ProbePolicy::StrictReady => state == ConnectionState::Ready,
            ProbePolicy::TolerantLiveness => matches!(
                state,
                ConnectionState::Connect
                    | ConnectionState::Ready
                    | ConnectionState::Connecting
                    | ConnectionState::Reconnecting
            ),
        }
    }
}

impl fmt::Display for ProbePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbePolicy::StrictReady => f.write_str("strict"),
            ProbePolicy::TolerantLiveness => f.write_str("tolerant"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown probe policy {0}, expected strict or tolerant")]
pub struct ParseProbePolicyError(pub String);

impl FromStr for ProbePolicy {
    type Err = ParseProbePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "strict-ready" => Ok(ProbePolicy::StrictReady),
            "tolerant" | "tolerant-liveness" => Ok(ProbePolicy::TolerantLiveness),
            other => Err(ParseProbePolicyError(other.to_owned())),
        }
    }
}

/// Anything the aggregator can check. Checks must be cheap and must not block:
/// they run inline in the readiness handler.
pub trait HealthCheckable: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self) -> Result<(), HealthCheckError>;
}

/// Applies a [`ProbePolicy`] to every connection of one logical store.
///
/// A store backed by several nodes passes only if every node passes; the first
/// offending node is named in the diagnostic.
pub struct StoreProbe {
    store: String,
    policy: ProbePolicy,
    connections: Vec<Arc<dyn StoreConnection>>,
}

impl StoreProbe {
    pub fn new(
        store: impl Into<String>,
        policy: ProbePolicy,
        connections: Vec<Arc<dyn StoreConnection>>,
    ) -> Self {
        Self {
            store: store.into(),
            policy,
            connections,
        }
    }

    pub fn single(
        store: impl Into<String>,
        policy: ProbePolicy,
        connection: Arc<dyn StoreConnection>,
    ) -> Self {
        Self::new(store, policy, vec![connection])
    }
}

impl HealthCheckable for StoreProbe {
    fn name(&self) -> &str {
        &self.store
    }

    fn check(&self) -> Result<(), HealthCheckError> {
        if self.connections.is_empty() {
            return Err(HealthCheckError::NoConnections {
                store: self.store.clone(),
            });
        }

        let nodes = self.connections.len();
        for (index, connection) in self.connections.iter().enumerate() {
            let state = connection.state();
            if self.policy.allows(state) {
                continue;
            }
            let store = self.store.clone();
            return Err(if nodes == 1 {
                HealthCheckError::Unhealthy { store, state }
            } else {
                HealthCheckError::NodeUnhealthy {
                    store,
                    node: index + 1,
                    nodes,
                    state,
                }
            });
        }
        Ok(())
    }
}
