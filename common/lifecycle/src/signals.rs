use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

/// Resolves on the first SIGINT or SIGTERM. Without a SIGTERM handler only
/// SIGINT is awaited.
pub async fn wait_for_shutdown_signal() {
    let received = match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        },
        Err(err) => {
            warn!("Lifecycle: failed to install the SIGTERM handler: {err}");
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Lifecycle: failed to listen for SIGINT: {err}");
            }
            "SIGINT"
        }
    };

    info!(signal = received, "Lifecycle: shutdown initiated");
}
