use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use crate::metric::Counting;

/// Incrementing and decrementing count.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.dec_by(1);
    }

    pub fn dec_by(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Counting for Counter {
    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_up_and_down() {
        let counter = Counter::new();
        counter.inc();
        counter.inc_by(10);
        counter.dec();
        assert_eq!(counter.count(), 10);

        counter.dec_by(15);
        assert_eq!(counter.count(), -5);

        counter.clear();
        assert_eq!(counter.count(), 0);
    }
}
