//! Point-in-time copies of a scope tree's metrics.
//!
//! Records are keyed by `key_for_prefixed_string_map(fully_qualified_name,
//! tags)`. They own their data: tags are copied once per scope and shared
//! between that scope's records, never aliased with live scope state.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use statscope_core::Tags;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub(crate) counters: BTreeMap<String, CounterSnapshot>,
    pub(crate) gauges: BTreeMap<String, GaugeSnapshot>,
    pub(crate) timers: BTreeMap<String, TimerSnapshot>,
    pub(crate) histograms: BTreeMap<String, HistogramSnapshot>,
}

impl Snapshot {
    /// Unreported counter deltas.
    pub fn counters(&self) -> &BTreeMap<String, CounterSnapshot> {
        &self.counters
    }

    /// Last gauge values.
    pub fn gauges(&self) -> &BTreeMap<String, GaugeSnapshot> {
        &self.gauges
    }

    /// Captured timer values (test scopes only; empty with a reporter).
    pub fn timers(&self) -> &BTreeMap<String, TimerSnapshot> {
        &self.timers
    }

    /// Unreported histogram bucket counts.
    pub fn histograms(&self) -> &BTreeMap<String, HistogramSnapshot> {
        &self.histograms
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.gauges.is_empty()
            && self.timers.is_empty()
            && self.histograms.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    name: String,
    tags: Tags,
    value: i64,
}

impl CounterSnapshot {
    pub(crate) fn new(name: String, tags: Tags, value: i64) -> Self {
        Self { name, tags, value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GaugeSnapshot {
    name: String,
    tags: Tags,
    value: f64,
}

impl GaugeSnapshot {
    pub(crate) fn new(name: String, tags: Tags, value: f64) -> Self {
        Self { name, tags, value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    name: String,
    tags: Tags,
    values: Vec<Duration>,
}

impl TimerSnapshot {
    pub(crate) fn new(name: String, tags: Tags, values: Vec<Duration>) -> Self {
        Self { name, tags, values }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn values(&self) -> &[Duration] {
        &self.values
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    name: String,
    tags: Tags,
    values: Vec<(f64, i64)>,
    durations: Vec<(Duration, i64)>,
}

impl HistogramSnapshot {
    pub(crate) fn new(
        name: String,
        tags: Tags,
        values: Vec<(f64, i64)>,
        durations: Vec<(Duration, i64)>,
    ) -> Self {
        Self {
            name,
            tags,
            values,
            durations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// `(upper bound, count)` per bucket of a value histogram.
    pub fn values(&self) -> &[(f64, i64)] {
        &self.values
    }

    /// `(upper bound, count)` per bucket of a duration histogram.
    pub fn durations(&self) -> &[(Duration, i64)] {
        &self.durations
    }

    /// Count in the bucket whose upper bound is `upper`.
    pub fn value_count(&self, upper: f64) -> Option<i64> {
        self.values.iter().find(|(u, _)| *u == upper).map(|(_, n)| *n)
    }

    pub fn duration_count(&self, upper: Duration) -> Option<i64> {
        self.durations
            .iter()
            .find(|(u, _)| *u == upper)
            .map(|(_, n)| *n)
    }
}
