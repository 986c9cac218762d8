use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use health::{ErrorSink, HealthChecker, NoopSink, ReadinessHandler};
use lifecycle::ShutdownOutcome;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::error::ServerError;
use crate::prometheus::setup_metrics_recorder;
use crate::router;
use crate::sink::HttpErrorSink;
use crate::stores::Stores;

pub async fn serve<F>(
    config: Config,
    listener: TcpListener,
    shutdown: F,
) -> Result<ShutdownOutcome, ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    // Installing a global recorder when push is used as a library (during tests etc)
    // does not work well.
    let recorder = config
        .export_prometheus
        .then(setup_metrics_recorder)
        .transpose()?;

    let sink: Arc<dyn ErrorSink> = match &config.error_report_url {
        Some(url) => Arc::new(
            HttpErrorSink::new(url.expose(), &config.otel_service_name)
                .map_err(ServerError::ErrorSink)?,
        ),
        None => Arc::new(NoopSink),
    };

    let stores = Stores::connect(&config)?;

    run(
        stores,
        sink,
        recorder,
        config.close_timeout(),
        listener,
        shutdown,
    )
    .await
}

/// Serve until `shutdown` resolves, then close every store connection.
///
/// The connections are closed even when the http server fails, and only once
/// every close has settled does this return.
pub async fn run<F>(
    stores: Stores,
    sink: Arc<dyn ErrorSink>,
    recorder: Option<PrometheusHandle>,
    close_timeout: Option<Duration>,
    listener: TcpListener,
    shutdown: F,
) -> Result<ShutdownOutcome, ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let checker: Arc<dyn HealthChecker> = Arc::new(stores.health_aggregator(sink));
    let coordinator = stores.shutdown_coordinator(close_timeout);
    let app = router::router(ReadinessHandler::new(checker), recorder);

    let address = listener.local_addr().map_err(ServerError::Bind)?;
    tracing::info!(topology = %stores.topology(), "listening on {address}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    if let Err(err) = &served {
        tracing::error!("http server failed, closing the stores anyway: {err}");
    }

    let outcome = coordinator.shutdown().await;
    served.map_err(ServerError::Serve)?;

    Ok(outcome)
}
