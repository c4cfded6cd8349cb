//! Registry abstraction consumed by the reporter, plus an in-memory registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use crate::instruments::Counter;
use crate::instruments::FnGauge;
use crate::instruments::Histogram;
use crate::instruments::Meter;
use crate::instruments::Timer;
use crate::metric::Metric;
use crate::name::MetricName;

/// Point-in-time view of a registry: group -> name -> metric.
pub type GroupedMetrics = BTreeMap<String, BTreeMap<MetricName, Metric>>;

/// Decides whether a metric is reported.
pub trait MetricPredicate: Send + Sync {
    fn matches(&self, name: &MetricName, metric: &Metric) -> bool;
}

impl<F> MetricPredicate for F
where F: Fn(&MetricName, &Metric) -> bool + Send + Sync
{
    fn matches(&self, name: &MetricName, metric: &Metric) -> bool {
        self(name, metric)
    }
}

/// Accepts every metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMetrics;

impl MetricPredicate for AllMetrics {
    fn matches(&self, _name: &MetricName, _metric: &Metric) -> bool {
        true
    }
}

/// Source of metrics for a reporting cycle.
pub trait MetricsRegistry: Send + Sync {
    /// Snapshot of every metric accepted by `predicate`, grouped by
    /// [`MetricName::group`] and ordered by name within a group.
    ///
    /// The snapshot holds its own handles, so later registry changes do not
    /// affect an iteration in progress.
    fn grouped_metrics(&self, predicate: &dyn MetricPredicate) -> GroupedMetrics;
}

impl<R: MetricsRegistry + ?Sized> MetricsRegistry for Arc<R> {
    fn grouped_metrics(&self, predicate: &dyn MetricPredicate) -> GroupedMetrics {
        (**self).grouped_metrics(predicate)
    }
}

/// Registry entry: one of the built-in instruments, or any external metric.
#[derive(Debug, Clone)]
enum Entry {
    Counter(Arc<Counter>),
    Meter(Arc<Meter>),
    Histogram(Arc<Histogram>),
    Timer(Arc<Timer>),
    Other(Metric),
}

impl Entry {
    fn to_metric(&self) -> Metric {
        match self {
            Entry::Counter(counter) => Metric::Counter(counter.clone()),
            Entry::Meter(meter) => Metric::Meter(meter.clone()),
            Entry::Histogram(histogram) => Metric::Histogram(histogram.clone()),
            Entry::Timer(timer) => Metric::Timer(timer.clone()),
            Entry::Other(metric) => metric.clone(),
        }
    }
}

macro_rules! get_or_create {
    ($(#[$doc:meta])* $fn_name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $fn_name(&self, name: MetricName) -> Option<Arc<$ty>> {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            match entries
                .entry(name)
                .or_insert_with(|| Entry::$variant(Arc::new(<$ty>::new())))
            {
                Entry::$variant(existing) => Some(existing.clone()),
                _ => None,
            }
        }
    };
}

/// Thread-safe in-memory registry.
#[derive(Debug, Default)]
pub struct SimpleRegistry {
    entries: RwLock<BTreeMap<MetricName, Entry>>,
}

impl SimpleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arbitrary metric under `name`, replacing any existing one.
    pub fn register(&self, name: MetricName, metric: Metric) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Entry::Other(metric));
    }

    /// Register a gauge, replacing any existing metric under `name`.
    pub fn gauge(&self, name: MetricName, gauge: FnGauge) {
        self.register(name, Metric::Gauge(Arc::new(gauge)));
    }

    pub fn remove(&self, name: &MetricName) -> Option<Metric> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .map(|entry| entry.to_metric())
    }

    pub fn get(&self, name: &MetricName) -> Option<Metric> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(Entry::to_metric)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    get_or_create!(
        /// Get the counter registered under `name`, creating it if absent.
        ///
        /// Returns `None` when `name` is taken by a metric of another kind.
        counter, Counter, Counter
    );

    get_or_create!(
        /// Get or create a meter. See [`SimpleRegistry::counter`].
        meter, Meter, Meter
    );

    get_or_create!(
        /// Get or create a histogram. See [`SimpleRegistry::counter`].
        histogram, Histogram, Histogram
    );

    get_or_create!(
        /// Get or create a timer. See [`SimpleRegistry::counter`].
        timer, Timer, Timer
    );
}

impl MetricsRegistry for SimpleRegistry {
    fn grouped_metrics(&self, predicate: &dyn MetricPredicate) -> GroupedMetrics {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut grouped = GroupedMetrics::new();
        for (name, entry) in entries.iter() {
            let metric = entry.to_metric();
            if predicate.matches(name, &metric) {
                grouped
                    .entry(name.group().to_string())
                    .or_default()
                    .insert(name.clone(), metric);
            }
        }
        grouped
    }
}
