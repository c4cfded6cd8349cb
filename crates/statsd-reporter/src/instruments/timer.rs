use std::time::Duration;
use std::time::Instant;

use super::Histogram;
use super::Meter;
use crate::metric::Metered;
use crate::metric::Sampling;
use crate::metric::Snapshot;
use crate::metric::Summarizable;

/// Meter of events that also records each event's duration in milliseconds.
#[derive(Debug, Default)]
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, duration: Duration) {
        self.histogram.update(duration.as_secs_f64() * 1000.0);
        self.meter.mark();
    }

    /// Run `f`, recording how long it took.
    pub fn time<R>(&self, f: impl FnOnce() -> R) -> R {
        let _context = self.start();
        f()
    }

    /// Start timing; the duration is recorded when the context is dropped or
    /// stopped.
    pub fn start(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            started: Instant::now(),
            stopped: false,
        }
    }
}

impl Metered for Timer {
    fn count(&self) -> u64 {
        self.meter.count()
    }

    fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }
}

impl Summarizable for Timer {
    fn min(&self) -> f64 {
        self.histogram.min()
    }

    fn max(&self) -> f64 {
        self.histogram.max()
    }

    fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    fn std_dev(&self) -> f64 {
        self.histogram.std_dev()
    }
}

impl Sampling for Timer {
    fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }
}

/// An in-flight timing started by [`Timer::start`].
#[must_use = "dropping the context immediately records a near-zero duration"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    started: Instant,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Record the elapsed time now and return it.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if !self.stopped {
            self.stopped = true;
            self.timer.update(elapsed);
        }
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        self.record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_records_milliseconds() {
        let timer = Timer::new();
        timer.update(Duration::from_millis(250));
        timer.update(Duration::from_millis(750));

        assert_eq!(Metered::count(&timer), 2);
        assert_eq!(timer.min(), 250.0);
        assert_eq!(timer.max(), 750.0);
        assert_eq!(timer.mean(), 500.0);
        assert_eq!(timer.snapshot().size(), 2);
    }

    #[test]
    fn context_records_once() {
        let timer = Timer::new();
        let context = timer.start();
        context.stop();
        assert_eq!(timer.count(), 1);

        let value = timer.time(|| 42);
        assert_eq!(value, 42);
        assert_eq!(timer.count(), 2);
    }
}
