use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::CloseError;

/// Connection state of a store, as seen from outside the connection.
///
/// The names follow the lifecycle of a redis client: a socket goes through
/// `connecting` and `connect` before the store answers and it turns `ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// First connection attempt in progress.
    Connecting,
    /// Socket established, store not verified yet.
    Connect,
    Ready,
    /// Connection lost, retrying.
    Reconnecting,
    /// Released by an explicit close.
    Closed,
    /// Gave up reconnecting.
    Errored,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connect => "connect",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown connection state: {0}")]
pub struct ParseConnectionStateError(pub String);

impl FromStr for ConnectionState {
    type Err = ParseConnectionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connecting" => Ok(ConnectionState::Connecting),
            "connect" => Ok(ConnectionState::Connect),
            "ready" => Ok(ConnectionState::Ready),
            "reconnecting" => Ok(ConnectionState::Reconnecting),
            "closed" | "end" => Ok(ConnectionState::Closed),
            "errored" => Ok(ConnectionState::Errored),
            other => Err(ParseConnectionStateError(other.to_owned())),
        }
    }
}

/// A single logical connection to a backing store.
///
/// Implementations are shared as `Arc<dyn StoreConnection>`: health probes only
/// read `state()`, the shutdown coordinator is the only caller of `close()`.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Logical name of the store, used to tag logs and diagnostics.
    fn name(&self) -> &str;

    /// Current state. Never blocks and never performs I/O.
    fn state(&self) -> ConnectionState;

    /// Release the connection. Resolves once the store connection is fully
    /// released, or fails if the store rejects the termination. A connection
    /// must be closed explicitly, dropping it is not enough. Closing again,
    /// even while a first close is still running, settles once the connection
    /// is released.
    async fn close(&self) -> Result<(), CloseError>;
}
