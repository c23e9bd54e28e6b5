#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use statscope_core::{
    BaseStatsReporter, Buckets, CachedCount, CachedGauge, CachedHistogram, CachedHistogramBucket,
    CachedStatsReporter, CachedTimer, Capabilities, Result, StatScopeError, StatsReporter, TagMap,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Counter { name: String, tags: TagMap, value: i64 },
    Gauge { name: String, tags: TagMap, value: f64 },
    Timer { name: String, tags: TagMap, value: Duration },
    ValueSamples { name: String, upper: f64, samples: i64 },
    DurationSamples { name: String, upper: Duration, samples: i64 },
}

impl Call {
    pub fn name(&self) -> &str {
        match self {
            Call::Counter { name, .. }
            | Call::Gauge { name, .. }
            | Call::Timer { name, .. }
            | Call::ValueSamples { name, .. }
            | Call::DurationSamples { name, .. } => name,
        }
    }
}

pub fn tags(pairs: &[(&str, &str)]) -> TagMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

type Calls = Arc<Mutex<Vec<Call>>>;

/// Records every call; usable as either sink flavour.
#[derive(Default)]
pub struct Recorder {
    calls: Calls,
    flushes: AtomicUsize,
    closes: AtomicUsize,
    allocations: AtomicUsize,
    fail_close: bool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_close() -> Arc<Self> {
        Arc::new(Self {
            fail_close: true,
            ..Self::default()
        })
    }

    /// Drain recorded calls.
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BaseStatsReporter for Recorder {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            reporting: true,
            tagging: true,
        }
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(StatScopeError::Reporter("sink unavailable".into()));
        }
        Ok(())
    }
}

impl StatsReporter for Recorder {
    fn report_counter(&self, name: &str, tags: &TagMap, value: i64) {
        self.push(Call::Counter {
            name: name.into(),
            tags: tags.clone(),
            value,
        });
    }

    fn report_gauge(&self, name: &str, tags: &TagMap, value: f64) {
        self.push(Call::Gauge {
            name: name.into(),
            tags: tags.clone(),
            value,
        });
    }

    fn report_timer(&self, name: &str, tags: &TagMap, interval: Duration) {
        self.push(Call::Timer {
            name: name.into(),
            tags: tags.clone(),
            value: interval,
        });
    }

    fn report_histogram_value_samples(
        &self,
        name: &str,
        _tags: &TagMap,
        _buckets: &Buckets,
        _lower: f64,
        upper: f64,
        samples: i64,
    ) {
        self.push(Call::ValueSamples {
            name: name.into(),
            upper,
            samples,
        });
    }

    fn report_histogram_duration_samples(
        &self,
        name: &str,
        _tags: &TagMap,
        _buckets: &Buckets,
        _lower: Duration,
        upper: Duration,
        samples: i64,
    ) {
        self.push(Call::DurationSamples {
            name: name.into(),
            upper,
            samples,
        });
    }
}

struct Handle {
    calls: Calls,
    name: String,
    tags: TagMap,
}

impl CachedCount for Handle {
    fn report_count(&self, value: i64) {
        self.calls.lock().unwrap().push(Call::Counter {
            name: self.name.clone(),
            tags: self.tags.clone(),
            value,
        });
    }
}

impl CachedGauge for Handle {
    fn report_gauge(&self, value: f64) {
        self.calls.lock().unwrap().push(Call::Gauge {
            name: self.name.clone(),
            tags: self.tags.clone(),
            value,
        });
    }
}

impl CachedTimer for Handle {
    fn report_timer(&self, interval: Duration) {
        self.calls.lock().unwrap().push(Call::Timer {
            name: self.name.clone(),
            tags: self.tags.clone(),
            value: interval,
        });
    }
}

impl CachedHistogram for Handle {
    fn value_bucket(&self, _lower: f64, upper: f64) -> Arc<dyn CachedHistogramBucket> {
        Arc::new(BucketHandle {
            calls: Arc::clone(&self.calls),
            name: self.name.clone(),
            upper: Upper::Value(upper),
        })
    }

    fn duration_bucket(&self, _lower: Duration, upper: Duration) -> Arc<dyn CachedHistogramBucket> {
        Arc::new(BucketHandle {
            calls: Arc::clone(&self.calls),
            name: self.name.clone(),
            upper: Upper::Duration(upper),
        })
    }
}

enum Upper {
    Value(f64),
    Duration(Duration),
}

struct BucketHandle {
    calls: Calls,
    name: String,
    upper: Upper,
}

impl CachedHistogramBucket for BucketHandle {
    fn report_samples(&self, samples: i64) {
        let call = match self.upper {
            Upper::Value(upper) => Call::ValueSamples {
                name: self.name.clone(),
                upper,
                samples,
            },
            Upper::Duration(upper) => Call::DurationSamples {
                name: self.name.clone(),
                upper,
                samples,
            },
        };
        self.calls.lock().unwrap().push(call);
    }
}

impl Recorder {
    fn handle(&self, name: &str, tags: &TagMap) -> Arc<Handle> {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        Arc::new(Handle {
            calls: Arc::clone(&self.calls),
            name: name.into(),
            tags: tags.clone(),
        })
    }
}

impl CachedStatsReporter for Recorder {
    fn allocate_counter(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedCount> {
        self.handle(name, tags)
    }

    fn allocate_gauge(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedGauge> {
        self.handle(name, tags)
    }

    fn allocate_timer(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedTimer> {
        self.handle(name, tags)
    }

    fn allocate_histogram(
        &self,
        name: &str,
        tags: &TagMap,
        _buckets: &Buckets,
    ) -> Arc<dyn CachedHistogram> {
        self.handle(name, tags)
    }
}
