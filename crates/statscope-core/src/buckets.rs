//! Histogram bucket definitions.
//!
//! A definition is a sorted list of upper bounds. `n` bounds describe `n + 1`
//! buckets: the first is open below and the last is open above.

use std::time::Duration;

use crate::error::{Result, StatScopeError};

/// Whether a histogram records plain values or durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistogramKind {
    Value,
    Duration,
}

/// Bucket boundaries; the variant decides the histogram kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Buckets {
    Values(Vec<f64>),
    Durations(Vec<Duration>),
}

/// One bucket's `(lower, upper]` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BucketPair {
    Value { lower: f64, upper: f64 },
    Duration { lower: Duration, upper: Duration },
}

impl Buckets {
    pub fn kind(&self) -> HistogramKind {
        match self {
            Buckets::Values(_) => HistogramKind::Value,
            Buckets::Durations(_) => HistogramKind::Duration,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buckets::Values(v) => v.len(),
            Buckets::Durations(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `count` buckets starting at `start`, each `width` apart.
    pub fn linear_values(start: f64, width: f64, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(StatScopeError::InvalidBuckets("count must be positive".into()));
        }
        if !(width > 0.0) {
            return Err(StatScopeError::InvalidBuckets("width must be positive".into()));
        }
        Ok(Buckets::Values(
            (0..count).map(|i| start + width * i as f64).collect(),
        ))
    }

    /// `count` buckets starting at `start`, each `factor` times the previous.
    pub fn exponential_values(start: f64, factor: f64, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(StatScopeError::InvalidBuckets("count must be positive".into()));
        }
        if !(start > 0.0) {
            return Err(StatScopeError::InvalidBuckets("start must be positive".into()));
        }
        if !(factor > 1.0) {
            return Err(StatScopeError::InvalidBuckets("factor must be greater than 1".into()));
        }
        let mut out = Vec::with_capacity(count);
        let mut cur = start;
        for _ in 0..count {
            out.push(cur);
            cur *= factor;
        }
        Ok(Buckets::Values(out))
    }

    pub fn linear_durations(start: Duration, width: Duration, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(StatScopeError::InvalidBuckets("count must be positive".into()));
        }
        if width.is_zero() {
            return Err(StatScopeError::InvalidBuckets("width must be positive".into()));
        }
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let step = u32::try_from(i)
                .ok()
                .and_then(|i| width.checked_mul(i))
                .and_then(|w| start.checked_add(w))
                .ok_or_else(|| StatScopeError::InvalidBuckets("duration overflow".into()))?;
            out.push(step);
        }
        Ok(Buckets::Durations(out))
    }

    pub fn exponential_durations(start: Duration, factor: f64, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(StatScopeError::InvalidBuckets("count must be positive".into()));
        }
        if start.is_zero() {
            return Err(StatScopeError::InvalidBuckets("start must be positive".into()));
        }
        if !(factor > 1.0) {
            return Err(StatScopeError::InvalidBuckets("factor must be greater than 1".into()));
        }
        let mut out = Vec::with_capacity(count);
        let mut secs = start.as_secs_f64();
        for _ in 0..count {
            let d = Duration::try_from_secs_f64(secs)
                .map_err(|e| StatScopeError::InvalidBuckets(format!("duration overflow: {e}")))?;
            out.push(d);
            secs *= factor;
        }
        Ok(Buckets::Durations(out))
    }

    /// Sorted `(lower, upper]` pairs, one more than the number of bounds.
    pub fn bucket_pairs(&self) -> Vec<BucketPair> {
        match self {
            Buckets::Values(bounds) => {
                let mut sorted = bounds.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mut lower = -f64::MAX;
                let mut pairs = Vec::with_capacity(sorted.len() + 1);
                for upper in sorted {
                    pairs.push(BucketPair::Value { lower, upper });
                    lower = upper;
                }
                pairs.push(BucketPair::Value { lower, upper: f64::MAX });
                pairs
            }
            Buckets::Durations(bounds) => {
                let mut sorted = bounds.clone();
                sorted.sort();
                let mut lower = Duration::ZERO;
                let mut pairs = Vec::with_capacity(sorted.len() + 1);
                for upper in sorted {
                    pairs.push(BucketPair::Duration { lower, upper });
                    lower = upper;
                }
                pairs.push(BucketPair::Duration { lower, upper: Duration::MAX });
                pairs
            }
        }
    }
}

/// Buckets used when a histogram is created without a definition.
pub fn default_scope_buckets() -> Buckets {
    Buckets::Durations(
        [0, 10, 25, 50, 75, 100, 200, 300, 400, 500, 600, 800, 1_000, 2_000, 5_000]
            .into_iter()
            .map(Duration::from_millis)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_values_are_evenly_spaced() {
        let b = Buckets::linear_values(0.0, 10.0, 3).unwrap_or(Buckets::Values(vec![]));
        assert_eq!(b, Buckets::Values(vec![0.0, 10.0, 20.0]));
    }

    #[test]
    fn exponential_rejects_small_factor() {
        let err = Buckets::exponential_values(1.0, 1.0, 4).err().map(|e| e.kind());
        assert_eq!(err, Some(crate::ErrorKind::InvalidBuckets));
    }

    #[test]
    fn pairs_cover_both_open_ends() {
        let pairs = Buckets::Values(vec![5.0, 1.0]).bucket_pairs();
        assert_eq!(
            pairs,
            vec![
                BucketPair::Value { lower: -f64::MAX, upper: 1.0 },
                BucketPair::Value { lower: 1.0, upper: 5.0 },
                BucketPair::Value { lower: 5.0, upper: f64::MAX },
            ]
        );
    }

    #[test]
    fn empty_definition_is_one_catch_all() {
        let pairs = Buckets::Durations(vec![]).bucket_pairs();
        assert_eq!(
            pairs,
            vec![BucketPair::Duration { lower: Duration::ZERO, upper: Duration::MAX }]
        );
    }

    #[test]
    fn default_buckets_are_durations() {
        let b = default_scope_buckets();
        assert_eq!(b.kind(), HistogramKind::Duration);
        assert_eq!(b.len(), 15);
    }
}
