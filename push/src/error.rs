use lifecycle::LifecycleError;
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;

use crate::config::ConfigurationError;

/// Errors that stop the gateway, from startup to the end of the shutdown.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("http server failed: {0}")]
    Serve(#[source] std::io::Error),
    #[error("failed to install the prometheus recorder: {0}")]
    Metrics(#[from] BuildError),
    #[error("failed to create the {store} store client: {source}")]
    Store {
        store: String,
        #[source]
        source: redis::RedisError,
    },
    #[error("failed to create the error report client: {0}")]
    ErrorSink(#[source] reqwest::Error),
    #[error("unclean shutdown: {0}")]
    Shutdown(#[from] LifecycleError),
}
