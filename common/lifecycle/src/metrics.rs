pub(crate) const METRIC_SHUTDOWN_COMPLETED: &str = "lifecycle_shutdown_completed_total";
pub(crate) const METRIC_STORE_CLOSE_DURATION: &str = "lifecycle_store_close_duration_seconds";
pub(crate) const METRIC_STORE_CLOSE_RESULT: &str = "lifecycle_store_close_result_total";

pub(crate) fn emit_shutdown_completed(service_name: &str, clean: bool) {
    metrics::counter!(
        METRIC_SHUTDOWN_COMPLETED,
        "service_name" => service_name.to_string(),
        "clean" => clean.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_store_close(service_name: &str, store: &str, result: &str, duration_secs: f64) {
    metrics::histogram!(
        METRIC_STORE_CLOSE_DURATION,
        "service_name" => service_name.to_string(),
        "store" => store.to_string(),
        "result" => result.to_string()
    )
    .record(duration_secs);
    metrics::counter!(
        METRIC_STORE_CLOSE_RESULT,
        "service_name" => service_name.to_string(),
        "store" => store.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}
