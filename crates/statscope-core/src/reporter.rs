//! Reporting sink contracts.
//!
//! A sink is either *buffered* (name and tags passed on every call) or
//! *cached* (a handle is allocated once per metric and reported into without
//! any per-flush marshaling). Both share `BaseStatsReporter`.
//!
//! Implementations are expected to be in-memory/non-blocking: scopes call them
//! while holding a metric-kind read lock.

use std::sync::Arc;
use std::time::Duration;

use crate::buckets::Buckets;
use crate::error::Result;
use crate::tags::TagMap;

/// What a sink can do with the values it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub reporting: bool,
    pub tagging: bool,
}

impl Capabilities {
    /// Capabilities of a scope with no sink.
    pub const NONE: Capabilities = Capabilities {
        reporting: false,
        tagging: false,
    };
}

/// Behaviour shared by both sink flavours.
pub trait BaseStatsReporter: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Push out anything buffered since the last flush.
    fn flush(&self);

    /// Release the sink's resources. Called once, when the root scope closes.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Sink that receives the fully-qualified name and tags on every call.
pub trait StatsReporter: BaseStatsReporter {
    fn report_counter(&self, name: &str, tags: &TagMap, value: i64);

    fn report_gauge(&self, name: &str, tags: &TagMap, value: f64);

    fn report_timer(&self, name: &str, tags: &TagMap, interval: Duration);

    fn report_histogram_value_samples(
        &self,
        name: &str,
        tags: &TagMap,
        buckets: &Buckets,
        bucket_lower_bound: f64,
        bucket_upper_bound: f64,
        samples: i64,
    );

    fn report_histogram_duration_samples(
        &self,
        name: &str,
        tags: &TagMap,
        buckets: &Buckets,
        bucket_lower_bound: Duration,
        bucket_upper_bound: Duration,
        samples: i64,
    );
}

pub trait CachedCount: Send + Sync {
    fn report_count(&self, value: i64);
}

pub trait CachedGauge: Send + Sync {
    fn report_gauge(&self, value: f64);
}

pub trait CachedTimer: Send + Sync {
    fn report_timer(&self, interval: Duration);
}

pub trait CachedHistogramBucket: Send + Sync {
    fn report_samples(&self, value: i64);
}

pub trait CachedHistogram: Send + Sync {
    fn value_bucket(&self, lower: f64, upper: f64) -> Arc<dyn CachedHistogramBucket>;

    fn duration_bucket(&self, lower: Duration, upper: Duration) -> Arc<dyn CachedHistogramBucket>;
}

/// Sink that hands out a pre-allocated handle per metric.
pub trait CachedStatsReporter: BaseStatsReporter {
    fn allocate_counter(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedCount>;

    fn allocate_gauge(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedGauge>;

    fn allocate_timer(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedTimer>;

    fn allocate_histogram(
        &self,
        name: &str,
        tags: &TagMap,
        buckets: &Buckets,
    ) -> Arc<dyn CachedHistogram>;
}

/// Discards everything. Backs the process-wide no-op scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatsReporter;

impl BaseStatsReporter for NullStatsReporter {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn flush(&self) {}
}

impl StatsReporter for NullStatsReporter {
    fn report_counter(&self, _name: &str, _tags: &TagMap, _value: i64) {}
    fn report_gauge(&self, _name: &str, _tags: &TagMap, _value: f64) {}
    fn report_timer(&self, _name: &str, _tags: &TagMap, _interval: Duration) {}

    fn report_histogram_value_samples(
        &self,
        _name: &str,
        _tags: &TagMap,
        _buckets: &Buckets,
        _bucket_lower_bound: f64,
        _bucket_upper_bound: f64,
        _samples: i64,
    ) {
    }

    fn report_histogram_duration_samples(
        &self,
        _name: &str,
        _tags: &TagMap,
        _buckets: &Buckets,
        _bucket_lower_bound: Duration,
        _bucket_upper_bound: Duration,
        _samples: i64,
    ) {
    }
}

impl CachedCount for NullStatsReporter {
    fn report_count(&self, _value: i64) {}
}

impl CachedGauge for NullStatsReporter {
    fn report_gauge(&self, _value: f64) {}
}

impl CachedTimer for NullStatsReporter {
    fn report_timer(&self, _interval: Duration) {}
}

impl CachedHistogramBucket for NullStatsReporter {
    fn report_samples(&self, _value: i64) {}
}

impl CachedHistogram for NullStatsReporter {
    fn value_bucket(&self, _lower: f64, _upper: f64) -> Arc<dyn CachedHistogramBucket> {
        Arc::new(NullStatsReporter)
    }

    fn duration_bucket(&self, _lower: Duration, _upper: Duration) -> Arc<dyn CachedHistogramBucket> {
        Arc::new(NullStatsReporter)
    }
}

impl CachedStatsReporter for NullStatsReporter {
    fn allocate_counter(&self, _name: &str, _tags: &TagMap) -> Arc<dyn CachedCount> {
        Arc::new(NullStatsReporter)
    }

    fn allocate_gauge(&self, _name: &str, _tags: &TagMap) -> Arc<dyn CachedGauge> {
        Arc::new(NullStatsReporter)
    }

    fn allocate_timer(&self, _name: &str, _tags: &TagMap) -> Arc<dyn CachedTimer> {
        Arc::new(NullStatsReporter)
    }

    fn allocate_histogram(
        &self,
        _name: &str,
        _tags: &TagMap,
        _buckets: &Buckets,
    ) -> Arc<dyn CachedHistogram> {
        Arc::new(NullStatsReporter)
    }
}
