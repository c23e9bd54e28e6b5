use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::reporter::{CachedCount, StatsReporter};
use crate::tags::TagMap;

/// Monotonic delta counter.
///
/// `curr` accumulates; `prev` remembers what was last reported, so a report
/// emits `curr - prev` and then moves `prev` forward.
pub struct Counter {
    prev: AtomicI64,
    curr: AtomicI64,
    cached: Option<Arc<dyn CachedCount>>,
}

impl Counter {
    pub fn new(cached: Option<Arc<dyn CachedCount>>) -> Self {
        Self {
            prev: AtomicI64::new(0),
            curr: AtomicI64::new(0),
            cached,
        }
    }

    pub fn inc(&self, delta: i64) {
        self.curr.fetch_add(delta, Ordering::Relaxed);
    }

    /// Consume and return the unreported delta.
    pub fn value(&self) -> i64 {
        let curr = self.curr.load(Ordering::Relaxed);
        let prev = self.prev.swap(curr, Ordering::Relaxed);
        curr.wrapping_sub(prev)
    }

    pub fn report(&self, name: &str, tags: &TagMap, r: &dyn StatsReporter) {
        let delta = self.value();
        if delta == 0 {
            return;
        }
        r.report_counter(name, tags, delta);
    }

    pub fn cached_report(&self) {
        let Some(cached) = &self.cached else { return; };
        let delta = self.value();
        if delta == 0 {
            return;
        }
        cached.report_count(delta);
    }

    /// Unreported delta, without consuming it.
    pub fn snapshot(&self) -> i64 {
        self.curr
            .load(Ordering::Relaxed)
            .wrapping_sub(self.prev.load(Ordering::Relaxed))
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("unreported", &self.snapshot())
            .field("cached", &self.cached.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_resets_delta() {
        let c = Counter::default();
        c.inc(3);
        c.inc(2);
        assert_eq!(c.snapshot(), 5);
        assert_eq!(c.value(), 5);
        assert_eq!(c.value(), 0);
        c.inc(1);
        assert_eq!(c.snapshot(), 1);
    }
}
