use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{Stopwatch, StopwatchRecorder};
use crate::reporter::{CachedTimer, StatsReporter};
use crate::tags::Tags;

enum TimerSink {
    Buffered(Arc<dyn StatsReporter>),
    Cached(Arc<dyn CachedTimer>),
    /// No sink configured: keep values for snapshots.
    Capture(Mutex<Vec<Duration>>),
}

/// Timer bound to its fully-qualified name and tags.
///
/// Timers are never buffered: every `record` goes straight to the sink.
pub struct Timer {
    name: String,
    tags: Tags,
    sink: TimerSink,
}

impl Timer {
    /// The buffered reporter wins when both are present.
    pub fn new(
        name: String,
        tags: Tags,
        reporter: Option<Arc<dyn StatsReporter>>,
        cached: Option<Arc<dyn CachedTimer>>,
    ) -> Self {
        let sink = match (reporter, cached) {
            (Some(r), _) => TimerSink::Buffered(r),
            (None, Some(c)) => TimerSink::Cached(c),
            (None, None) => TimerSink::Capture(Mutex::new(Vec::new())),
        };
        Self { name, tags, sink }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record(&self, interval: Duration) {
        match &self.sink {
            TimerSink::Buffered(r) => r.report_timer(&self.name, &self.tags, interval),
            TimerSink::Cached(c) => c.report_timer(interval),
            TimerSink::Capture(values) => values.lock().push(interval),
        }
    }

    pub fn start(&self) -> Stopwatch<'_> {
        Stopwatch::new(Instant::now(), self)
    }

    /// Values captured when no sink is configured; empty otherwise.
    pub fn snapshot(&self) -> Vec<Duration> {
        match &self.sink {
            TimerSink::Capture(values) => values.lock().clone(),
            _ => Vec::new(),
        }
    }
}

impl StopwatchRecorder for Timer {
    fn record_stopwatch(&self, elapsed: Duration) {
        self.record(elapsed);
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match &self.sink {
            TimerSink::Buffered(_) => "buffered",
            TimerSink::Cached(_) => "cached",
            TimerSink::Capture(_) => "capture",
        };
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("sink", &sink)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_without_sink() {
        let t = Timer::new("svc.latency".into(), Tags::default(), None, None);
        t.record(Duration::from_millis(5));
        let elapsed = t.start().stop();
        let values = t.snapshot();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], Duration::from_millis(5));
        assert_eq!(values[1], elapsed);
    }
}
