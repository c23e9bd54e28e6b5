//! statscope core: runtime-free metric primitives, reporter contracts, and the
//! naming/bucketing helpers shared by every scope.
//!
//! This crate carries no async runtime so the primitives can be embedded and
//! tested without tokio. Scope orchestration (registry, flush loop, snapshots)
//! lives in `statscope-runtime`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Recording a metric
//! can never fail; fallible construction paths surface `StatScopeError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bucket_cache;
pub mod buckets;
pub mod error;
pub mod metric;
pub mod reporter;
pub mod sanitize;
pub mod tags;

/// Shared result type.
pub use error::{ErrorKind, Result, StatScopeError};

pub use bucket_cache::{BucketCache, BucketStorage};
pub use buckets::{BucketPair, Buckets, HistogramKind};
pub use metric::{Counter, Gauge, Histogram, Stopwatch, Timer};
pub use reporter::{
    BaseStatsReporter, CachedCount, CachedGauge, CachedHistogram, CachedHistogramBucket,
    CachedStatsReporter, CachedTimer, Capabilities, NullStatsReporter, StatsReporter,
};
pub use sanitize::{SanitizeOptions, Sanitizer, ValidCharacters};
pub use tags::{key_for_prefixed_string_map, merge_right_tags, TagMap, Tags};
