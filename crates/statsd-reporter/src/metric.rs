//! Read-only views of instrumentation owned by a metrics registry.
//!
//! A registry hands out [`Metric`] values: a closed set of kinds, each backed
//! by a shared handle implementing the capability traits below. The reporter
//! only reads through these traits and never keeps a handle past one cycle.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::ReporterResult;
use crate::format::Number;

/// Anything exposing a single integer count.
pub trait Counting: Send + Sync {
    fn count(&self) -> i64;
}

/// An event count plus exponentially-weighted rates, in events per second.
pub trait Metered: Send + Sync {
    fn count(&self) -> u64;
    fn mean_rate(&self) -> f64;
    fn one_minute_rate(&self) -> f64;
    fn five_minute_rate(&self) -> f64;
    fn fifteen_minute_rate(&self) -> f64;
}

/// Statistical summary over every recorded value.
pub trait Summarizable: Send + Sync {
    fn min(&self) -> f64;
    fn max(&self) -> f64;
    fn mean(&self) -> f64;
    fn std_dev(&self) -> f64;
}

/// A source of distribution snapshots.
pub trait Sampling: Send + Sync {
    fn snapshot(&self) -> Snapshot;
}

/// A value computed on demand. Computing it may fail.
pub trait Gauge: Send + Sync {
    fn value(&self) -> ReporterResult<GaugeValue>;
}

/// Summary and distribution of recorded values.
pub trait HistogramMetric: Summarizable + Sampling {}

impl<T: Summarizable + Sampling> HistogramMetric for T {}

/// A meter of events that also records each event's duration.
pub trait TimerMetric: Metered + Summarizable + Sampling {}

impl<T: Metered + Summarizable + Sampling> TimerMetric for T {}

/// One metric, tagged by kind.
#[derive(Clone)]
pub enum Metric {
    Counter(Arc<dyn Counting>),
    Meter(Arc<dyn Metered>),
    Histogram(Arc<dyn HistogramMetric>),
    Timer(Arc<dyn TimerMetric>),
    Gauge(Arc<dyn Gauge>),
}

impl Metric {
    pub fn kind(&self) -> &'static str {
        match self {
            Metric::Counter(_) => "counter",
            Metric::Meter(_) => "meter",
            Metric::Histogram(_) => "histogram",
            Metric::Timer(_) => "timer",
            Metric::Gauge(_) => "gauge",
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Metric").field(&self.kind()).finish()
    }
}

/// Point-in-time view of a value distribution, sorted ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: Vec<f64>,
}

impl Snapshot {
    /// Build a snapshot from unsorted values. NaN entries are discarded.
    pub fn new(mut values: Vec<f64>) -> Self {
        values.retain(|v| !v.is_nan());
        values.sort_by(f64::total_cmp);
        Self { values }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `quantile` in `[0, 1]`, linearly interpolated between the two
    /// nearest ranks. An empty snapshot yields `0.0`.
    pub fn value(&self, quantile: f64) -> f64 {
        let quantile = quantile.clamp(0.0, 1.0);
        let Some(last) = self.values.last() else {
            return 0.0;
        };

        let pos = quantile * (self.values.len() + 1) as f64;
        let index = pos as usize;
        if index < 1 {
            return self.values[0];
        }
        if index >= self.values.len() {
            return *last;
        }

        let lower = self.values[index - 1];
        let upper = self.values[index];
        lower + (pos - pos.floor()) * (upper - lower)
    }

    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }
}

/// Whatever a gauge reports. Only numeric kinds reach the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum GaugeValue {
    Integer(i64),
    UnsignedInteger(u64),
    BigInteger(BigInt),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    Text(String),
}

impl GaugeValue {
    /// Convert to a wire-formattable number, or `None` for a non-numeric kind.
    pub fn to_number(&self) -> Option<Number> {
        match self {
            GaugeValue::Integer(i) => Some(Number::Integer(*i)),
            GaugeValue::UnsignedInteger(u) => Some(Number::UnsignedInteger(*u)),
            GaugeValue::BigInteger(big) => Some(Number::BigInteger(big.clone())),
            GaugeValue::Float(f) => Some(Number::Float(*f)),
            GaugeValue::Decimal(d) => d.to_f64().map(Number::Float),
            GaugeValue::Boolean(_) | GaugeValue::Text(_) => None,
        }
    }
}

macro_rules! widen_to_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for GaugeValue {
                fn from(value: $ty) -> Self {
                    GaugeValue::Integer(i64::from(value))
                }
            }
        )*
    };
}

widen_to_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for GaugeValue {
    fn from(value: u64) -> Self {
        GaugeValue::UnsignedInteger(value)
    }
}

impl From<usize> for GaugeValue {
    fn from(value: usize) -> Self {
        GaugeValue::UnsignedInteger(value as u64)
    }
}

impl From<BigInt> for GaugeValue {
    fn from(value: BigInt) -> Self {
        GaugeValue::BigInteger(value)
    }
}

impl From<f32> for GaugeValue {
    fn from(value: f32) -> Self {
        GaugeValue::Float(f64::from(value))
    }
}

impl From<f64> for GaugeValue {
    fn from(value: f64) -> Self {
        GaugeValue::Float(value)
    }
}

impl From<Decimal> for GaugeValue {
    fn from(value: Decimal) -> Self {
        GaugeValue::Decimal(value)
    }
}

impl From<bool> for GaugeValue {
    fn from(value: bool) -> Self {
        GaugeValue::Boolean(value)
    }
}

impl From<String> for GaugeValue {
    fn from(value: String) -> Self {
        GaugeValue::Text(value)
    }
}

impl From<&str> for GaugeValue {
    fn from(value: &str) -> Self {
        GaugeValue::Text(value.to_string())
    }
}
