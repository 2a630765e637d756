//! Error types for the metrics exporter.

use std::time::Duration;

use thiserror::Error;

/// Errors from building or stopping the exporter.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("prometheus metrics server shutdown failed: not drained within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("prometheus metrics server failed: {0}")]
    Server(String),
}
