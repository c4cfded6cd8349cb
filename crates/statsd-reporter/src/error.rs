//! Error types for the StatsD reporter.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for reporter operations.
pub type ReporterResult<T> = Result<T, Report<ReporterError>>;

/// Errors raised while exporting metrics.
///
/// None of these escape a reporting cycle: the cycle logs them and moves on.
#[derive(Debug, Display)]
pub enum ReporterError {
    /// Opening the channel to the aggregator failed
    #[display("Failed to connect to {address}")]
    TransportConnect { address: String },

    /// Releasing the channel after a cycle failed
    #[display("Failed to close connection to {address}")]
    TransportClose { address: String },

    /// Reading or decomposing a single metric failed
    #[display("Failed to read metric {metric}")]
    MetricRead { metric: String },

    /// A metric name component was empty
    #[display("Invalid metric name: {reason}")]
    InvalidMetricName { reason: String },

    /// Configuration could not be loaded
    #[display("Configuration error: {message}")]
    Configuration { message: String },
}

impl Error for ReporterError {}

impl ReporterError {
    pub fn metric_read(metric: impl Into<String>) -> Self {
        Self::MetricRead {
            metric: metric.into(),
        }
    }

    pub fn invalid_name(reason: impl Into<String>) -> Self {
        Self::InvalidMetricName {
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
