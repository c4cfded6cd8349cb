use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use super::lock;
use crate::metric::Metered;

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Exponentially-weighted moving average of a per-second rate, updated in
/// fixed 5 second ticks.
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    uncounted: u64,
    rate: Option<f64>,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        let ticks_per_window = minutes * 60.0 / TICK_INTERVAL.as_secs_f64();
        Self {
            alpha: 1.0 - (-1.0 / ticks_per_window).exp(),
            uncounted: 0,
            rate: None,
        }
    }

    fn update(&mut self, n: u64) {
        self.uncounted += n;
    }

    fn tick(&mut self) {
        let instant_rate = self.uncounted as f64 / TICK_INTERVAL.as_secs_f64();
        self.uncounted = 0;
        self.rate = Some(match self.rate {
            Some(rate) => rate + self.alpha * (instant_rate - rate),
            None => instant_rate,
        });
    }

    fn rate(&self) -> f64 {
        self.rate.unwrap_or(0.0)
    }
}

#[derive(Debug)]
struct Rates {
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    last_tick: Instant,
}

impl Rates {
    fn tick_if_necessary(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let ticks = elapsed.as_nanos() / TICK_INTERVAL.as_nanos();
        for _ in 0..ticks {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
        self.last_tick += TICK_INTERVAL * ticks as u32;
    }
}

/// Marks events and tracks their mean and 1, 5 and 15 minute rates.
#[derive(Debug)]
pub struct Meter {
    count: AtomicU64,
    started_at: Instant,
    rates: Mutex<Rates>,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    fn started_at(start: Instant) -> Self {
        Self {
            count: AtomicU64::new(0),
            started_at: start,
            rates: Mutex::new(Rates {
                m1: Ewma::over_minutes(1.0),
                m5: Ewma::over_minutes(5.0),
                m15: Ewma::over_minutes(15.0),
                last_tick: start,
            }),
        }
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        self.mark_at(n, Instant::now());
    }

    fn mark_at(&self, n: u64, now: Instant) {
        let mut rates = lock(&self.rates);
        rates.tick_if_necessary(now);
        self.count.fetch_add(n, Ordering::Relaxed);
        rates.m1.update(n);
        rates.m5.update(n);
        rates.m15.update(n);
    }

    fn rate_at(&self, now: Instant, pick: impl Fn(&Rates) -> f64) -> f64 {
        let mut rates = lock(&self.rates);
        rates.tick_if_necessary(now);
        pick(&rates)
    }

    fn mean_rate_at(&self, now: Instant) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        count as f64 / elapsed
    }
}

impl Metered for Meter {
    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn mean_rate(&self) -> f64 {
        self.mean_rate_at(Instant::now())
    }

    fn one_minute_rate(&self) -> f64 {
        self.rate_at(Instant::now(), |r| r.m1.rate())
    }

    fn five_minute_rate(&self) -> f64 {
        self.rate_at(Instant::now(), |r| r.m5.rate())
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.rate_at(Instant::now(), |r| r.m15.rate())
    }
}
