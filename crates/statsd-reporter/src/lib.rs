//! Periodic export of in-process metrics to a StatsD aggregator.
//!
//! A [`StatsdReporter`] snapshots a [`MetricsRegistry`], decomposes each
//! metric into samples with [`dispatch`](dispatch::dispatch) and hands every
//! sample to a [`Transport`] under a flat dotted key.

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod instruments;
pub mod metric;
pub mod name;
pub mod registry;
pub mod reporter;
pub mod transport;

pub use clock::Clock;
pub use clock::SystemClock;
pub use error::ReporterError;
pub use error::ReporterResult;
pub use metric::GaugeValue;
pub use metric::Metric;
pub use name::MetricName;
pub use registry::MetricsRegistry;
pub use registry::SimpleRegistry;
pub use reporter::CycleSummary;
pub use reporter::ReporterMetrics;
pub use reporter::StatsdReporter;
pub use transport::Transport;
pub use transport::UdpTransport;
