use std::collections::VecDeque;
use std::sync::Mutex;

use super::lock;
use crate::metric::Sampling;
use crate::metric::Snapshot;
use crate::metric::Summarizable;

const DEFAULT_WINDOW: usize = 1028;

#[derive(Debug, Default)]
struct State {
    window: VecDeque<f64>,
    count: u64,
    min: f64,
    max: f64,
    mean: f64,
    // running sum of squared deviations (Welford)
    m2: f64,
}

/// Distribution of recorded values.
///
/// The summary (min, max, mean, stddev) covers every value ever recorded; the
/// snapshot covers the most recent `window` values.
#[derive(Debug)]
pub struct Histogram {
    capacity: usize,
    state: Mutex<State>,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Histogram whose snapshot keeps the last `capacity` values.
    pub fn with_window(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(State {
                window: VecDeque::with_capacity(capacity),
                ..State::default()
            }),
        }
    }

    pub fn update(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        let mut state = lock(&self.state);

        if state.window.len() == self.capacity {
            state.window.pop_front();
        }
        state.window.push_back(value);

        state.count += 1;
        if state.count == 1 {
            state.min = value;
            state.max = value;
        } else {
            state.min = state.min.min(value);
            state.max = state.max.max(value);
        }
        let delta = value - state.mean;
        state.mean += delta / state.count as f64;
        state.m2 += delta * (value - state.mean);
    }

    pub fn count(&self) -> u64 {
        lock(&self.state).count
    }

    pub fn clear(&self) {
        let mut state = lock(&self.state);
        *state = State {
            window: VecDeque::with_capacity(self.capacity),
            ..State::default()
        };
    }
}

impl Summarizable for Histogram {
    fn min(&self) -> f64 {
        lock(&self.state).min
    }

    fn max(&self) -> f64 {
        lock(&self.state).max
    }

    fn mean(&self) -> f64 {
        lock(&self.state).mean
    }

    /// Sample standard deviation; `0.0` with fewer than two values.
    fn std_dev(&self) -> f64 {
        let state = lock(&self.state);
        if state.count < 2 {
            return 0.0;
        }
        (state.m2 / (state.count - 1) as f64).sqrt()
    }
}

impl Sampling for Histogram {
    fn snapshot(&self) -> Snapshot {
        Snapshot::new(lock(&self.state).window.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_reports_zeros() {
        let histogram = Histogram::new();
        assert_eq!(histogram.count(), 0);
        assert_eq!(histogram.min(), 0.0);
        assert_eq!(histogram.max(), 0.0);
        assert_eq!(histogram.mean(), 0.0);
        assert_eq!(histogram.std_dev(), 0.0);
        assert_eq!(histogram.snapshot().size(), 0);
    }

    #[test]
    fn summarizes_all_values() {
        let histogram = Histogram::new();
        for v in 1..=10 {
            histogram.update(f64::from(v));
        }

        assert_eq!(histogram.count(), 10);
        assert_eq!(histogram.min(), 1.0);
        assert_eq!(histogram.max(), 10.0);
        assert_eq!(histogram.mean(), 5.5);
        assert!((histogram.std_dev() - 3.0276503540974917).abs() < 1e-12);
        assert_eq!(histogram.snapshot().median(), 5.5);
    }

    #[test]
    fn snapshot_keeps_only_the_window() {
        let histogram = Histogram::with_window(3);
        for v in [100.0, 1.0, 2.0, 3.0] {
            histogram.update(v);
        }

        assert_eq!(histogram.snapshot().values(), &[1.0, 2.0, 3.0][..]);
        // summary still sees the evicted value
        assert_eq!(histogram.max(), 100.0);
    }

    #[test]
    fn negative_values_track_min() {
        let histogram = Histogram::new();
        histogram.update(-4.0);
        histogram.update(2.0);
        assert_eq!(histogram.min(), -4.0);
        assert_eq!(histogram.max(), 2.0);
    }

    #[test]
    fn clear_resets_everything() {
        let histogram = Histogram::new();
        histogram.update(5.0);
        histogram.clear();
        assert_eq!(histogram.count(), 0);
        assert_eq!(histogram.snapshot().size(), 0);
    }
}
