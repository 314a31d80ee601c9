//! Error handling for the host exporter.

use std::time::Duration;

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// The main error type for exporter operations.
///
/// Registry misuse (`DuplicateMetric` through `NegativeDelta`) is a programming
/// error: fatal when it happens while defining metrics at startup, rejected
/// and logged when it happens during a collection cycle.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// A metric name was registered twice with a different kind or label schema
    #[error("metric {name} is already registered with a different kind or label schema")]
    DuplicateMetric { name: String },

    /// A write referenced a metric name that was never defined
    #[error("metric {name} is not registered")]
    UnknownMetric { name: String },

    /// A write supplied label values that do not match the metric's schema
    #[error("metric {name} expects {expected} label value(s), got {got}")]
    LabelMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A write used an operation that does not fit the metric's kind
    #[error("metric {name} is a {kind}, cannot {operation}")]
    KindMismatch {
        name: String,
        kind: &'static str,
        operation: &'static str,
    },

    /// A counter increment with a negative (or NaN) delta
    #[error("counter {name} cannot be incremented by {delta}")]
    NegativeDelta { name: String, delta: f64 },

    /// A sub-collector could not read a host facility
    #[error("{collector} sample unavailable: {reason}")]
    SampleUnavailable {
        collector: &'static str,
        reason: String,
    },

    /// A sub-collector did not finish within its time bound
    #[error("{collector} sample timed out after {timeout:?}")]
    SampleTimeout {
        collector: &'static str,
        timeout: Duration,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The metrics backend rejected a metric definition or write
    #[error("metric {name} rejected by the metrics backend: {reason}")]
    InvalidMetric { name: String, reason: String },

    /// Encoding the text exposition failed
    #[error("Exposition error: {0}")]
    Exposition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

impl ExporterError {
    /// Create a new sample-unavailable error for the named sub-collector
    pub fn sample_unavailable(collector: &'static str, reason: impl Into<String>) -> Self {
        Self::SampleUnavailable {
            collector,
            reason: reason.into(),
        }
    }

    /// Wrap a `prometheus` error for the named metric
    pub fn invalid_metric(name: &str, error: prometheus::Error) -> Self {
        Self::InvalidMetric {
            name: name.to_string(),
            reason: error.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Whether this error is registry misuse rather than a host-side failure.
    pub fn is_registry_misuse(&self) -> bool {
        matches!(
            self,
            Self::DuplicateMetric { .. }
                | Self::UnknownMetric { .. }
                | Self::LabelMismatch { .. }
                | Self::KindMismatch { .. }
                | Self::NegativeDelta { .. }
                | Self::InvalidMetric { .. }
        )
    }
}
