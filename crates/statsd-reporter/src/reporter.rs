//! Periodic export of a registry to a StatsD aggregator.

use std::any::Any;
use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use error_stack::Report;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::dispatch::dispatch;
use crate::dispatch::Sample;
use crate::error::ReporterError;
use crate::error::ReporterResult;
use crate::instruments::Counter;
use crate::instruments::FnGauge;
use crate::instruments::Meter;
use crate::instruments::Timer;
use crate::metric::Metric;
use crate::name::MetricName;
use crate::registry::AllMetrics;
use crate::registry::MetricPredicate;
use crate::registry::MetricsRegistry;
use crate::registry::SimpleRegistry;
use crate::transport::ConnectedTransport;
use crate::transport::Transport;
use crate::transport::UdpTransport;

pub const DEFAULT_NAME: &str = "statsd-reporter";

/// Outcome of one export cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub connected: bool,
    pub metrics_reported: usize,
    pub metrics_failed: usize,
    pub samples_sent: usize,
}

/// The reporter's own instrumentation, living in the registry it reports.
#[derive(Debug, Clone)]
pub struct ReporterMetrics {
    cycles: Arc<Counter>,
    cycle_time: Arc<Timer>,
    samples: Arc<Meter>,
}

impl ReporterMetrics {
    /// Register `statsd.reporter.{cycles,cycle-time,samples,uptime}`.
    pub fn register(registry: &SimpleRegistry) -> ReporterResult<Self> {
        let taken = |name: &MetricName| {
            Report::new(ReporterError::invalid_name(format!(
                "{name} is registered with another kind"
            )))
        };

        let cycles_name = MetricName::new("statsd", "reporter", "cycles")?;
        let cycles = registry
            .counter(cycles_name.clone())
            .ok_or_else(|| taken(&cycles_name))?;

        let cycle_time_name = MetricName::new("statsd", "reporter", "cycle-time")?;
        let cycle_time = registry
            .timer(cycle_time_name.clone())
            .ok_or_else(|| taken(&cycle_time_name))?;

        let samples_name = MetricName::new("statsd", "reporter", "samples")?;
        let samples = registry
            .meter(samples_name.clone())
            .ok_or_else(|| taken(&samples_name))?;

        let started = Instant::now();
        registry.gauge(
            MetricName::new("statsd", "reporter", "uptime")?,
            FnGauge::infallible(move || started.elapsed().as_secs()),
        );

        Ok(Self {
            cycles,
            cycle_time,
            samples,
        })
    }

    fn record(&self, summary: &CycleSummary, elapsed: Duration) {
        self.cycles.inc();
        self.cycle_time.update(elapsed);
        self.samples.mark_n(summary.samples_sent as u64);
    }
}

/// Samples every metric of a registry and sends it through a transport.
///
/// Each sample is sent under `prefix + sanitized name + suffix`. A prefix `p`
/// is stored as `"p."`, so keys need no conditional joining.
pub struct StatsdReporter<R, T> {
    name: String,
    registry: R,
    transport: T,
    prefix: String,
    predicate: Box<dyn MetricPredicate>,
    clock: Box<dyn Clock>,
    metrics: Option<ReporterMetrics>,
}

impl<R: MetricsRegistry> StatsdReporter<R, UdpTransport> {
    /// Reporter sending every metric of `registry` to `host:port` over UDP.
    pub fn udp(registry: R, host: impl Into<String>, port: u16) -> Self {
        Self::new(registry, UdpTransport::new(host, port))
    }
}

impl<R: MetricsRegistry, T: Transport> StatsdReporter<R, T> {
    pub fn new(registry: R, transport: T) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            registry,
            transport,
            prefix: String::new(),
            predicate: Box::new(AllMetrics),
            clock: Box::new(SystemClock),
            metrics: None,
        }
    }

    /// Prepend `prefix.` to every key. An empty prefix means none.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() {
            prefix
        } else {
            format!("{prefix}.")
        };
        self
    }

    pub fn with_predicate(mut self, predicate: impl MetricPredicate + 'static) -> Self {
        self.predicate = Box::new(predicate);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_metrics(mut self, metrics: ReporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalised prefix, either empty or ending in `.`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one export cycle.
    ///
    /// Connect failures end the cycle before anything is sent. A metric that
    /// fails to read is logged and skipped. The transport is closed on every
    /// path once it was opened.
    pub fn report(&mut self) -> CycleSummary {
        let started = Instant::now();
        let epoch = self.clock.now_secs();
        let span = tracing::debug_span!("report", reporter = %self.name, epoch);
        let _entered = span.enter();

        let summary = self.sweep();

        tracing::debug!(
            msg = "Reporting cycle finished",
            connected = summary.connected,
            reported = summary.metrics_reported,
            failed = summary.metrics_failed,
            samples = summary.samples_sent,
        );
        if let Some(metrics) = &self.metrics {
            metrics.record(&summary, started.elapsed());
        }
        summary
    }

    fn sweep(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let mut transport = match ConnectedTransport::open(&mut self.transport) {
            Ok(transport) => transport,
            Err(report) => {
                tracing::warn!(msg = "Unable to report to StatsD", error = ?report);
                return summary;
            }
        };
        summary.connected = true;

        let groups = self.registry.grouped_metrics(self.predicate.as_ref());
        for (name, metric) in groups.values().flatten() {
            let sanitized = name.sanitize();
            match dispatch_contained(&sanitized, metric) {
                Ok(samples) => {
                    for sample in &samples {
                        transport.send(&sample.key(&self.prefix, &sanitized), &sample.value);
                    }
                    summary.metrics_reported += 1;
                    summary.samples_sent += samples.len();
                }
                Err(report) => {
                    tracing::error!(
                        msg = "Error reporting metric",
                        metric = %sanitized,
                        kind = metric.kind(),
                        error = ?report,
                    );
                    summary.metrics_failed += 1;
                }
            }
        }

        summary
    }

    /// Report every `interval` until `token` is cancelled.
    ///
    /// The first cycle runs one interval after start. Ticks missed while a
    /// cycle is still running are skipped rather than bunched up. Cycles run
    /// on the blocking pool since resolving, connecting and sending block.
    pub async fn run(self, interval: Duration, token: CancellationToken)
    where
        R: 'static,
        T: 'static,
    {
        let name = self.name.clone();
        let mut reporter = self;

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            msg = "Starting reporter",
            reporter = %name,
            interval_secs = interval.as_secs_f64(),
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(msg = "Reporter shutdown requested", reporter = %name);
                    break;
                }
                _ = ticker.tick() => {
                    let cycle = tokio::task::spawn_blocking(move || {
                        reporter.report();
                        reporter
                    });
                    match cycle.await {
                        Ok(returned) => reporter = returned,
                        Err(e) => {
                            tracing::error!(msg = "Reporting cycle aborted", reporter = %name, error = %e);
                            return;
                        }
                    }
                }
            }
        }

        tracing::info!(msg = "Reporter stopped", reporter = %name);
    }
}

/// [`dispatch`], with a panic inside a metric's own code turned into a
/// [`ReporterError::MetricRead`] for that metric.
fn dispatch_contained(sanitized_name: &str, metric: &Metric) -> ReporterResult<Vec<Sample>> {
    panic::catch_unwind(AssertUnwindSafe(|| dispatch(sanitized_name, metric))).unwrap_or_else(
        |payload| {
            Err(Report::new(ReporterError::metric_read(sanitized_name))
                .attach_printable(format!("panicked: {}", panic_message(payload.as_ref()))))
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<R, T: fmt::Debug> fmt::Debug for StatsdReporter<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdReporter")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
