//! Interning cache for histogram bucket storage.
//!
//! Histograms created with identical boundaries share one immutable
//! `BucketStorage` instead of each allocating their own pair list.

use std::sync::Arc;

use dashmap::DashMap;

use crate::buckets::{BucketPair, Buckets, HistogramKind};

/// Immutable, shareable bucket layout.
#[derive(Debug)]
pub struct BucketStorage {
    kind: HistogramKind,
    buckets: Buckets,
    pairs: Vec<BucketPair>,
}

impl BucketStorage {
    pub fn new(kind: HistogramKind, buckets: &Buckets) -> Self {
        Self {
            kind,
            buckets: buckets.clone(),
            pairs: buckets.bucket_pairs(),
        }
    }

    pub fn kind(&self) -> HistogramKind {
        self.kind
    }

    /// The definition the storage was built from.
    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn pairs(&self) -> &[BucketPair] {
        &self.pairs
    }

    /// Index of the bucket a value falls into (first upper bound >= value).
    pub fn value_index(&self, value: f64) -> usize {
        let idx = self.pairs.partition_point(|p| match p {
            BucketPair::Value { upper, .. } => *upper < value,
            BucketPair::Duration { .. } => true,
        });
        idx.min(self.pairs.len().saturating_sub(1))
    }

    /// Index of the bucket a duration falls into.
    pub fn duration_index(&self, value: std::time::Duration) -> usize {
        let idx = self.pairs.partition_point(|p| match p {
            BucketPair::Duration { upper, .. } => *upper < value,
            BucketPair::Value { .. } => true,
        });
        idx.min(self.pairs.len().saturating_sub(1))
    }
}

type CacheKey = (HistogramKind, Vec<u128>);

fn cache_key(kind: HistogramKind, buckets: &Buckets) -> CacheKey {
    let bits = match buckets {
        Buckets::Values(v) => v.iter().map(|b| u128::from(b.to_bits())).collect(),
        Buckets::Durations(d) => d.iter().map(|b| b.as_nanos()).collect(),
    };
    (kind, bits)
}

/// Concurrent map from `(kind, boundaries)` to shared storage.
#[derive(Debug, Default)]
pub struct BucketCache {
    map: DashMap<CacheKey, Arc<BucketStorage>>,
}

impl BucketCache {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    /// Return the shared storage for `(kind, buckets)`, creating it once.
    pub fn get(&self, kind: HistogramKind, buckets: &Buckets) -> Arc<BucketStorage> {
        let key = cache_key(kind, buckets);
        if let Some(hit) = self.map.get(&key) {
            return Arc::clone(hit.value());
        }
        let entry = self
            .map
            .entry(key)
            .or_insert_with(|| Arc::new(BucketStorage::new(kind, buckets)));
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
