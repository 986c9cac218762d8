//! Connections to the backing stores of the push gateway.
//!
//! A [`StoreConnection`] only exposes what the process lifecycle needs: the
//! current [`ConnectionState`] and an awaited, graceful `close()`. Reconnection
//! is owned by each implementation and only observed through `state()`.

mod connection;
mod error;
pub mod mock;
mod redis_connection;

pub use connection::{ConnectionState, ParseConnectionStateError, StoreConnection};
pub use error::CloseError;
pub use redis_connection::{RedisConnection, RedisOptions};
