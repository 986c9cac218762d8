use std::future::ready;

use axum::routing::get;
use axum::Router;
use health::ReadinessHandler;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::prometheus::track_metrics;

async fn liveness() -> &'static str {
    "ok"
}

pub fn router(readiness: ReadinessHandler, recorder: Option<PrometheusHandle>) -> Router {
    let router = Router::new().route("/_liveness", get(liveness));

    // Don't expose metrics unless asked to
    let router = match recorder {
        Some(handle) => router.route("/metrics", get(move || ready(handle.render()))),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        // added after the layers: the readiness probe is polled every few
        // seconds and would flood the request logs
        .route("/", get(move || ready(readiness.check())))
}
