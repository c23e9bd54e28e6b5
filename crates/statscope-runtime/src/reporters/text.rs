//! In-memory reporter that renders Prometheus text exposition.
//!
//! Series are keyed by the reported name plus sorted tags, backed by
//! `DashMap` so buffered reports and cached handles can write concurrently.
//! Counters accumulate deltas, gauges keep the last value, timers keep a
//! count and a sum, and histograms keep per-bucket sample counts that are
//! rendered cumulatively.
//!
//! Implements both sink flavours, so it can back a buffered or a cached root.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use statscope_core::{
    BaseStatsReporter, Buckets, CachedCount, CachedGauge, CachedHistogram,
    CachedHistogramBucket, CachedStatsReporter, CachedTimer, Capabilities, Result,
    StatsReporter, TagMap,
};

type SeriesKey = (String, Vec<(String, String)>);

fn series_key(name: &str, tags: &TagMap) -> SeriesKey {
    // BTreeMap iteration is already sorted
    let labels = tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    (name.to_owned(), labels)
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Map a dotted metric name onto the exposition charset `[a-zA-Z0-9_:]`.
fn exposition_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn label_str(labels: &[(String, String)]) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", exposition_name(k), escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn upper_seconds(upper: Duration) -> f64 {
    if upper == Duration::MAX {
        f64::INFINITY
    } else {
        upper.as_secs_f64()
    }
}

fn format_le(upper: f64) -> String {
    if upper >= f64::MAX {
        "+Inf".to_owned()
    } else {
        upper.to_string()
    }
}

#[derive(Default)]
struct GaugeCell(AtomicU64);

impl GaugeCell {
    fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Default)]
struct TimerCell {
    count: AtomicU64,
    sum_nanos: AtomicU64,
}

impl TimerCell {
    fn record(&self, d: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// Per-bucket sample counts keyed by upper bound (seconds for durations).
#[derive(Default)]
struct HistogramCell {
    buckets: Mutex<Vec<(f64, i64)>>,
}

impl HistogramCell {
    fn add(&self, upper: f64, samples: i64) {
        let mut buckets = self.buckets.lock();
        let idx = buckets.partition_point(|(u, _)| *u < upper);
        if let Some((u, n)) = buckets.get_mut(idx) {
            if *u == upper {
                *n += samples;
                return;
            }
        }
        buckets.insert(idx, (upper, samples));
    }

    fn total(&self) -> i64 {
        self.buckets.lock().iter().map(|(_, n)| n).sum()
    }
}

/// Prometheus-text sink. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct TextReporter {
    counters: DashMap<SeriesKey, Arc<AtomicI64>>,
    gauges: DashMap<SeriesKey, Arc<GaugeCell>>,
    timers: DashMap<SeriesKey, Arc<TimerCell>>,
    histograms: DashMap<SeriesKey, Arc<HistogramCell>>,
    flushes: AtomicU64,
    closes: AtomicU64,
}

impl TextReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter_cell(&self, name: &str, tags: &TagMap) -> Arc<AtomicI64> {
        Arc::clone(self.counters.entry(series_key(name, tags)).or_default().value())
    }

    fn gauge_cell(&self, name: &str, tags: &TagMap) -> Arc<GaugeCell> {
        Arc::clone(self.gauges.entry(series_key(name, tags)).or_default().value())
    }

    fn timer_cell(&self, name: &str, tags: &TagMap) -> Arc<TimerCell> {
        Arc::clone(self.timers.entry(series_key(name, tags)).or_default().value())
    }

    fn histogram_cell(&self, name: &str, tags: &TagMap) -> Arc<HistogramCell> {
        Arc::clone(self.histograms.entry(series_key(name, tags)).or_default().value())
    }

    /// Accumulated counter total.
    pub fn counter_value(&self, name: &str, tags: &TagMap) -> Option<i64> {
        self.counters
            .get(&series_key(name, tags))
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Last reported gauge value.
    pub fn gauge_value(&self, name: &str, tags: &TagMap) -> Option<f64> {
        self.gauges.get(&series_key(name, tags)).map(|g| g.get())
    }

    /// Number of timer recordings.
    pub fn timer_count(&self, name: &str, tags: &TagMap) -> Option<u64> {
        self.timers
            .get(&series_key(name, tags))
            .map(|t| t.count.load(Ordering::Relaxed))
    }

    /// Total histogram samples across all buckets.
    pub fn histogram_count(&self, name: &str, tags: &TagMap) -> Option<i64> {
        self.histograms.get(&series_key(name, tags)).map(|h| h.total())
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }

    /// Render every series, sorted by name then labels.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (key, v) in sorted(&self.counters, |c| c.load(Ordering::Relaxed)) {
            write_series(&mut out, "counter", &key, v);
        }
        for (key, v) in sorted(&self.gauges, |g| g.get()) {
            write_series(&mut out, "gauge", &key, v);
        }
        for ((name, labels), (count, sum)) in sorted(&self.timers, |t| {
            (
                t.count.load(Ordering::Relaxed),
                Duration::from_nanos(t.sum_nanos.load(Ordering::Relaxed)).as_secs_f64(),
            )
        }) {
            let name = exposition_name(&name);
            let labels = label_str(&labels);
            let _ = writeln!(out, "# TYPE {name} summary");
            let _ = writeln!(out, "{name}_sum{{{labels}}} {sum}");
            let _ = writeln!(out, "{name}_count{{{labels}}} {count}");
        }
        for ((name, labels), buckets) in sorted(&self.histograms, |h| h.buckets.lock().clone()) {
            let name = exposition_name(&name);
            let labels = label_str(&labels);
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{labels},")
            };
            let _ = writeln!(out, "# TYPE {name} histogram");
            let mut cumulative = 0i64;
            let mut saw_inf = false;
            for (upper, n) in buckets {
                cumulative += n;
                let le = format_le(upper);
                saw_inf |= le == "+Inf";
                let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"{le}\"}} {cumulative}");
            }
            if !saw_inf {
                let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {cumulative}");
            }
            let _ = writeln!(out, "{name}_count{{{labels}}} {cumulative}");
        }
        out
    }
}

fn sorted<C, T, F>(map: &DashMap<SeriesKey, Arc<C>>, read: F) -> Vec<(SeriesKey, T)>
where
    F: Fn(&C) -> T,
{
    let mut rows: Vec<_> = map
        .iter()
        .map(|e| (e.key().clone(), read(&**e.value())))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

fn write_series<T: std::fmt::Display>(out: &mut String, kind: &str, key: &SeriesKey, v: T) {
    let name = exposition_name(&key.0);
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name}{{{}}} {v}", label_str(&key.1));
}

impl BaseStatsReporter for TextReporter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            reporting: true,
            tagging: true,
        }
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl StatsReporter for TextReporter {
    fn report_counter(&self, name: &str, tags: &TagMap, value: i64) {
        self.counter_cell(name, tags).fetch_add(value, Ordering::Relaxed);
    }

    fn report_gauge(&self, name: &str, tags: &TagMap, value: f64) {
        self.gauge_cell(name, tags).set(value);
    }

    fn report_timer(&self, name: &str, tags: &TagMap, interval: Duration) {
        self.timer_cell(name, tags).record(interval);
    }

    fn report_histogram_value_samples(
        &self,
        name: &str,
        tags: &TagMap,
        _buckets: &Buckets,
        _bucket_lower_bound: f64,
        bucket_upper_bound: f64,
        samples: i64,
    ) {
        self.histogram_cell(name, tags).add(bucket_upper_bound, samples);
    }

    fn report_histogram_duration_samples(
        &self,
        name: &str,
        tags: &TagMap,
        _buckets: &Buckets,
        _bucket_lower_bound: Duration,
        bucket_upper_bound: Duration,
        samples: i64,
    ) {
        self.histogram_cell(name, tags)
            .add(upper_seconds(bucket_upper_bound), samples);
    }
}

struct CountHandle(Arc<AtomicI64>);

impl CachedCount for CountHandle {
    fn report_count(&self, value: i64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }
}

struct GaugeHandle(Arc<GaugeCell>);

impl CachedGauge for GaugeHandle {
    fn report_gauge(&self, value: f64) {
        self.0.set(value);
    }
}

struct TimerHandle(Arc<TimerCell>);

impl CachedTimer for TimerHandle {
    fn report_timer(&self, interval: Duration) {
        self.0.record(interval);
    }
}

struct HistogramHandle(Arc<HistogramCell>);

struct BucketHandle {
    cell: Arc<HistogramCell>,
    upper: f64,
}

impl CachedHistogramBucket for BucketHandle {
    fn report_samples(&self, value: i64) {
        self.cell.add(self.upper, value);
    }
}

impl CachedHistogram for HistogramHandle {
    fn value_bucket(&self, _lower: f64, upper: f64) -> Arc<dyn CachedHistogramBucket> {
        Arc::new(BucketHandle {
            cell: Arc::clone(&self.0),
            upper,
        })
    }

    fn duration_bucket(&self, _lower: Duration, upper: Duration) -> Arc<dyn CachedHistogramBucket> {
        Arc::new(BucketHandle {
            cell: Arc::clone(&self.0),
            upper: upper_seconds(upper),
        })
    }
}

impl CachedStatsReporter for TextReporter {
    fn allocate_counter(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedCount> {
        Arc::new(CountHandle(self.counter_cell(name, tags)))
    }

    fn allocate_gauge(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedGauge> {
        Arc::new(GaugeHandle(self.gauge_cell(name, tags)))
    }

    fn allocate_timer(&self, name: &str, tags: &TagMap) -> Arc<dyn CachedTimer> {
        Arc::new(TimerHandle(self.timer_cell(name, tags)))
    }

    fn allocate_histogram(
        &self,
        name: &str,
        tags: &TagMap,
        _buckets: &Buckets,
    ) -> Arc<dyn CachedHistogram> {
        Arc::new(HistogramHandle(self.histogram_cell(name, tags)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn render_counter_and_gauge() {
        let r = TextReporter::new();
        let t = tags(&[("env", "prod")]);
        r.report_counter("svc.requests", &t, 2);
        r.report_counter("svc.requests", &t, 3);
        r.report_gauge("svc.queue", &t, 1.5);

        let out = r.render();
        assert!(out.contains("# TYPE svc_requests counter"));
        assert!(out.contains("svc_requests{env=\"prod\"} 5"));
        assert!(out.contains("svc_queue{env=\"prod\"} 1.5"));
        assert_eq!(r.counter_value("svc.requests", &t), Some(5));
    }

    #[test]
    fn histogram_renders_cumulative_buckets() {
        let r = TextReporter::new();
        let t = TagMap::new();
        let b = Buckets::Values(vec![1.0, 2.0]);
        r.report_histogram_value_samples("h", &t, &b, -f64::MAX, 1.0, 2);
        r.report_histogram_value_samples("h", &t, &b, 2.0, f64::MAX, 1);
        r.report_histogram_value_samples("h", &t, &b, 1.0, 2.0, 4);

        let out = r.render();
        assert!(out.contains("h_bucket{le=\"1\"} 2"));
        assert!(out.contains("h_bucket{le=\"2\"} 6"));
        assert!(out.contains("h_bucket{le=\"+Inf\"} 7"));
        assert_eq!(r.histogram_count("h", &t), Some(7));
    }

    #[test]
    fn cached_handles_share_series_with_buffered_path() {
        let r = TextReporter::new();
        let t = tags(&[("a", "b")]);
        let handle = r.allocate_counter("c", &t);
        handle.report_count(4);
        r.report_counter("c", &t, 1);
        assert_eq!(r.counter_value("c", &t), Some(5));

        let timer = r.allocate_timer("t", &t);
        timer.report_timer(Duration::from_millis(3));
        assert_eq!(r.timer_count("t", &t), Some(1));
    }

    #[test]
    fn escapes_label_values() {
        let r = TextReporter::new();
        r.report_gauge("g", &tags(&[("path", "a\"b")]), 1.0);
        assert!(r.render().contains("g{path=\"a\\\"b\"} 1"));
    }
}
