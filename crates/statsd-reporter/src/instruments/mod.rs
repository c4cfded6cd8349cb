//! In-process instruments implementing the metric capability traits.

mod counter;
mod gauge;
mod histogram;
mod meter;
mod timer;

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

pub use counter::Counter;
pub use gauge::FnGauge;
pub use histogram::Histogram;
pub use meter::Meter;
pub use timer::Timer;
pub use timer::TimerContext;

/// Lock ignoring poison: instrument state stays usable after a panicking writer.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
