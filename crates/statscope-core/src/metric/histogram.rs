use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Counter, Stopwatch, StopwatchRecorder};
use crate::bucket_cache::BucketStorage;
use crate::buckets::{BucketPair, HistogramKind};
use crate::reporter::{CachedHistogram, CachedHistogramBucket, StatsReporter};
use crate::tags::TagMap;

/// Bucketed histogram over shared, interned bucket storage.
///
/// Each bucket keeps its own delta counter. Recording a value into a
/// duration histogram (or vice versa) is ignored.
pub struct Histogram {
    kind: HistogramKind,
    storage: Arc<BucketStorage>,
    samples: Vec<Counter>,
    cached_buckets: Vec<Arc<dyn CachedHistogramBucket>>,
}

impl Histogram {
    pub fn new(storage: Arc<BucketStorage>, cached: Option<Arc<dyn CachedHistogram>>) -> Self {
        let pairs = storage.pairs();
        let samples = pairs.iter().map(|_| Counter::default()).collect();
        let cached_buckets = match cached {
            Some(cached) => pairs
                .iter()
                .map(|p| match *p {
                    BucketPair::Value { lower, upper } => cached.value_bucket(lower, upper),
                    BucketPair::Duration { lower, upper } => cached.duration_bucket(lower, upper),
                })
                .collect(),
            None => Vec::new(),
        };
        Self {
            kind: storage.kind(),
            storage,
            samples,
            cached_buckets,
        }
    }

    pub fn kind(&self) -> HistogramKind {
        self.kind
    }

    pub fn storage(&self) -> &Arc<BucketStorage> {
        &self.storage
    }

    pub fn record_value(&self, value: f64) {
        if self.kind != HistogramKind::Value {
            return;
        }
        if let Some(c) = self.samples.get(self.storage.value_index(value)) {
            c.inc(1);
        }
    }

    pub fn record_duration(&self, value: Duration) {
        if self.kind != HistogramKind::Duration {
            return;
        }
        if let Some(c) = self.samples.get(self.storage.duration_index(value)) {
            c.inc(1);
        }
    }

    pub fn start(&self) -> Stopwatch<'_> {
        Stopwatch::new(Instant::now(), self)
    }

    pub fn report(&self, name: &str, tags: &TagMap, r: &dyn StatsReporter) {
        let buckets = self.storage.buckets();
        for (pair, samples) in self.storage.pairs().iter().zip(&self.samples) {
            let delta = samples.value();
            if delta == 0 {
                continue;
            }
            match *pair {
                BucketPair::Value { lower, upper } => {
                    r.report_histogram_value_samples(name, tags, buckets, lower, upper, delta)
                }
                BucketPair::Duration { lower, upper } => {
                    r.report_histogram_duration_samples(name, tags, buckets, lower, upper, delta)
                }
            }
        }
    }

    pub fn cached_report(&self) {
        for (samples, handle) in self.samples.iter().zip(&self.cached_buckets) {
            let delta = samples.value();
            if delta == 0 {
                continue;
            }
            handle.report_samples(delta);
        }
    }

    /// Unreported sample counts by upper bound (value histograms only).
    pub fn snapshot_values(&self) -> Vec<(f64, i64)> {
        if self.kind != HistogramKind::Value {
            return Vec::new();
        }
        self.storage
            .pairs()
            .iter()
            .zip(&self.samples)
            .filter_map(|(pair, c)| match *pair {
                BucketPair::Value { upper, .. } => Some((upper, c.snapshot())),
                BucketPair::Duration { .. } => None,
            })
            .collect()
    }

    /// Unreported sample counts by upper bound (duration histograms only).
    pub fn snapshot_durations(&self) -> Vec<(Duration, i64)> {
        if self.kind != HistogramKind::Duration {
            return Vec::new();
        }
        self.storage
            .pairs()
            .iter()
            .zip(&self.samples)
            .filter_map(|(pair, c)| match *pair {
                BucketPair::Duration { upper, .. } => Some((upper, c.snapshot())),
                BucketPair::Value { .. } => None,
            })
            .collect()
    }
}

impl StopwatchRecorder for Histogram {
    fn record_stopwatch(&self, elapsed: Duration) {
        self.record_duration(elapsed);
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("kind", &self.kind)
            .field("buckets", &self.samples.len())
            .field("cached", &!self.cached_buckets.is_empty())
            .finish()
    }
}
