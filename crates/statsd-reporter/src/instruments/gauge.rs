use std::fmt;

use crate::error::ReporterResult;
use crate::metric::Gauge;
use crate::metric::GaugeValue;

type ReadFn = Box<dyn Fn() -> ReporterResult<GaugeValue> + Send + Sync>;

/// Gauge backed by a closure evaluated at every read.
pub struct FnGauge {
    read: ReadFn,
}

impl FnGauge {
    /// Gauge whose computation may fail.
    pub fn new<F>(read: F) -> Self
    where F: Fn() -> ReporterResult<GaugeValue> + Send + Sync + 'static {
        Self {
            read: Box::new(read),
        }
    }

    /// Gauge whose computation cannot fail.
    pub fn infallible<V, F>(read: F) -> Self
    where
        V: Into<GaugeValue>,
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self::new(move || Ok(read().into()))
    }
}

impl Gauge for FnGauge {
    fn value(&self) -> ReporterResult<GaugeValue> {
        (self.read)()
    }
}

impl fmt::Debug for FnGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGauge").finish_non_exhaustive()
    }
}
