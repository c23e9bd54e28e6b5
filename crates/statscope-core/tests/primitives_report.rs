//! Buffered and cached report paths of the metric primitives.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use statscope_core::{
    BaseStatsReporter, BucketCache, Buckets, CachedCount, Capabilities, Counter, Gauge, Histogram,
    HistogramKind, StatsReporter, TagMap, Timer,
};

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl BaseStatsReporter for Recorder {
    fn capabilities(&self) -> Capabilities {
        Capabilities { reporting: true, tagging: true }
    }
    fn flush(&self) {}
}

impl StatsReporter for Recorder {
    fn report_counter(&self, name: &str, _tags: &TagMap, value: i64) {
        self.calls.lock().unwrap().push(format!("counter {name} {value}"));
    }
    fn report_gauge(&self, name: &str, _tags: &TagMap, value: f64) {
        self.calls.lock().unwrap().push(format!("gauge {name} {value}"));
    }
    fn report_timer(&self, name: &str, _tags: &TagMap, interval: Duration) {
        self.calls.lock().unwrap().push(format!("timer {name} {}", interval.as_millis()));
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
        self.calls.lock().unwrap().push(format!("hv {name} {upper} {samples}"));
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
        self.calls
            .lock()
            .unwrap()
            .push(format!("hd {name} {} {samples}", upper.as_millis()));
    }
}

#[derive(Default)]
struct CountHandle(Mutex<Vec<i64>>);

impl CachedCount for CountHandle {
    fn report_count(&self, value: i64) {
        self.0.lock().unwrap().push(value);
    }
}

#[test]
fn counter_reports_delta_then_nothing() {
    let r = Recorder::default();
    let c = Counter::default();
    c.inc(3);
    c.inc(2);
    c.report("svc.requests", &TagMap::new(), &r);
    c.report("svc.requests", &TagMap::new(), &r);
    assert_eq!(r.take(), vec!["counter svc.requests 5"]);
}

#[test]
fn counter_cached_report_uses_handle() {
    let handle = Arc::new(CountHandle::default());
    let c = Counter::new(Some(handle.clone()));
    c.inc(7);
    c.cached_report();
    c.cached_report();
    assert_eq!(*handle.0.lock().unwrap(), vec![7]);
}

#[test]
fn gauge_rereports_last_value() {
    let r = Recorder::default();
    let g = Gauge::default();
    g.report("g", &TagMap::new(), &r);
    assert!(r.take().is_empty());

    g.update(4.0);
    g.report("g", &TagMap::new(), &r);
    g.report("g", &TagMap::new(), &r);
    assert_eq!(r.take(), vec!["gauge g 4", "gauge g 4"]);
}

#[test]
fn timer_reports_immediately() {
    let r = Arc::new(Recorder::default());
    let t = Timer::new("svc.t".into(), Arc::new(TagMap::new()), Some(r.clone()), None);
    t.record(Duration::from_millis(12));
    assert_eq!(r.take(), vec!["timer svc.t 12"]);
    assert!(t.snapshot().is_empty());
}

#[test]
fn histogram_reports_non_empty_buckets_once() {
    let cache = BucketCache::new();
    let buckets = Buckets::Durations(vec![Duration::from_millis(10), Duration::from_millis(100)]);
    let h = Histogram::new(cache.get(HistogramKind::Duration, &buckets), None);
    h.record_duration(Duration::from_millis(50));
    h.record_duration(Duration::from_millis(60));

    let r = Recorder::default();
    h.report("lat", &TagMap::new(), &r);
    assert_eq!(r.take(), vec!["hd lat 100 2"]);

    h.report("lat", &TagMap::new(), &r);
    assert!(r.take().is_empty());
    assert!(h.snapshot_durations().iter().all(|(_, n)| *n == 0));
}
