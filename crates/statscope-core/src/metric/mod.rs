//! Metric primitives.
//!
//! Each primitive is a concurrency-safe accumulator with a lock-free record
//! path and two flush paths: `report` (buffered sink, name and tags passed in)
//! and `cached_report` (pre-allocated handle).

mod counter;
mod gauge;
mod histogram;
mod timer;

use std::time::{Duration, Instant};

pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::Histogram;
pub use timer::Timer;

/// Something a `Stopwatch` can hand its elapsed time to.
pub trait StopwatchRecorder: Send + Sync {
    fn record_stopwatch(&self, elapsed: Duration);
}

/// Measures the time between `start()` on a timer/histogram and `stop()`.
#[must_use = "a stopwatch records nothing until stop() is called"]
pub struct Stopwatch<'a> {
    start: Instant,
    recorder: &'a dyn StopwatchRecorder,
}

impl<'a> Stopwatch<'a> {
    pub fn new(start: Instant, recorder: &'a dyn StopwatchRecorder) -> Self {
        Self { start, recorder }
    }

    /// Record the elapsed time and return it.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.recorder.record_stopwatch(elapsed);
        elapsed
    }
}
