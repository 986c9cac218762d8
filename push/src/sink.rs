use std::error::Error;
use std::time::Duration;

use health::ErrorSink;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reports errors to an HTTP crash-reporting endpoint.
///
/// Each report is posted from its own task: `report` returns immediately and
/// a failed delivery is only logged.
pub struct HttpErrorSink {
    client: reqwest::Client,
    url: String,
    service: String,
}

impl HttpErrorSink {
    pub fn new(url: &str, service: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REPORT_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: url.to_owned(),
            service: service.to_owned(),
        })
    }
}

impl ErrorSink for HttpErrorSink {
    fn report(&self, error: &dyn Error) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no runtime to deliver the error report, dropping it");
            return;
        };

        let body = json!({
            "service": self.service,
            "level": "error",
            "message": error.to_string(),
            "timestamp": OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        });
        let request = self.client.post(&self.url).json(&body);

        runtime.spawn(async move {
            match request.send().await.and_then(|res| res.error_for_status()) {
                Ok(_) => debug!("error report delivered"),
                // the report url embeds a key, keep it out of the logs
                Err(err) => warn!("failed to deliver error report: {}", err.without_url()),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use health::HealthCheckError;
    use serde_json::Value;
    use store::ConnectionState;
    use tokio::sync::mpsc;

    async fn collector() -> (String, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(4);
        let app = Router::new()
            .route(
                "/report",
                post(|State(tx): State<mpsc::Sender<Value>>, Json(body): Json<Value>| async move {
                    tx.send(body).await.ok();
                }),
            )
            .with_state(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/report", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (url, rx)
    }

    #[tokio::test]
    async fn posts_the_report() {
        let (url, mut rx) = collector().await;
        let sink = HttpErrorSink::new(&url, "push").unwrap();

        sink.report(&HealthCheckError::Unhealthy {
            store: "rate limit".to_string(),
            state: ConnectionState::Errored,
        });

        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["service"], "push");
        assert_eq!(body["level"], "error");
        assert_eq!(
            body["message"],
            "rate limit store unhealthy: state=errored"
        );
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn delivery_failures_stay_silent() {
        // nothing listens there, report must neither panic nor block
        let sink = HttpErrorSink::new("http://127.0.0.1:1/report", "push").unwrap();
        sink.report(&HealthCheckError::NoConnections {
            store: "ingress".to_string(),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn no_runtime_drops_the_report() {
        let sink = HttpErrorSink::new("http://127.0.0.1:1/report", "push").unwrap();
        sink.report(&HealthCheckError::NoConnections {
            store: "ingress".to_string(),
        });
    }
}
