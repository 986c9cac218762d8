use std::error::Error;

/// Destination for health failures, typically a crash-reporting service.
///
/// Reporting is fire-and-forget: implementations must not block the caller,
/// and a failed delivery is their own business, never the caller's.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &dyn Error);
}

/// Drops every report. The aggregator still logs failures on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ErrorSink for NoopSink {
    fn report(&self, _error: &dyn Error) {}
}
