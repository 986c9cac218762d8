//! Readiness probe handler.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::aggregator::HealthChecker;

/// Axum-compatible readiness probe: runs the health check on every call and
/// reflects it as 200 or 503. Holds no state of its own.
#[derive(Clone)]
pub struct ReadinessHandler {
    checker: Arc<dyn HealthChecker>,
}

impl ReadinessHandler {
    pub fn new(checker: Arc<dyn HealthChecker>) -> Self {
        Self { checker }
    }

    pub fn check(&self) -> ReadinessStatus {
        ReadinessStatus {
            ready: self.checker.is_healthy(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessStatus {
    pub ready: bool,
}

impl IntoResponse for ReadinessStatus {
    fn into_response(self) -> Response {
        match self.ready {
            true => (StatusCode::OK, "ok"),
            false => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        }
        .into_response()
    }
}
