use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::reporter::{CachedGauge, StatsReporter};
use crate::tags::TagMap;

/// Last-value gauge.
///
/// Once set, the last value is re-reported on every flush until the next
/// `update`. A gauge that was never set reports nothing.
pub struct Gauge {
    bits: AtomicU64,
    set: AtomicBool,
    cached: Option<Arc<dyn CachedGauge>>,
}

impl Gauge {
    pub fn new(cached: Option<Arc<dyn CachedGauge>>) -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
            set: AtomicBool::new(false),
            cached,
        }
    }

    pub fn update(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
        self.set.store(true, Ordering::Release);
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub fn report(&self, name: &str, tags: &TagMap, r: &dyn StatsReporter) {
        if self.is_set() {
            r.report_gauge(name, tags, self.value());
        }
    }

    pub fn cached_report(&self) {
        if let (true, Some(cached)) = (self.is_set(), &self.cached) {
            cached.report_gauge(self.value());
        }
    }

    pub fn snapshot(&self) -> f64 {
        self.value()
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge")
            .field("value", &self.value())
            .field("set", &self.is_set())
            .finish()
    }
}
