pub mod config;
pub mod error;
pub mod prometheus;
pub mod router;
pub mod server;
pub mod sink;
pub mod stores;
