//! Scope: the tagged, hierarchical context metrics are created under.
//!
//! Every scope owns one map per metric kind, each behind its own
//! reader/writer lock, so recording against one kind never contends with a
//! flush or snapshot walking another. Metric creation uses double-checked
//! locking: an optimistic read-locked lookup, then a re-check under the write
//! lock before inserting.
//!
//! Counters, gauges, and histograms are also kept in an insertion-ordered
//! list that the cached flush protocol walks. Timers have no list: they
//! report straight to the sink on every record and are never flush-buffered.
//!
//! Lock order for anything taking more than one kind lock:
//! counters, gauges, timers, histograms.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use statscope_core::bucket_cache::BucketCache;
use statscope_core::buckets::default_scope_buckets;
use statscope_core::{
    key_for_prefixed_string_map, Buckets, Capabilities, Counter, Gauge, Histogram,
    NullStatsReporter, Result, Sanitizer, StatScopeError, StatsReporter, TagMap, Tags, Timer,
};

use crate::options::{ReportingMode, ScopeOptions, DEFAULT_SEPARATOR};
use crate::registry::ScopeRegistry;
use crate::snapshot::{
    CounterSnapshot, GaugeSnapshot, HistogramSnapshot, Snapshot, TimerSnapshot,
};

/// State shared by every scope under one root. Immutable after construction.
pub(crate) struct ScopeShared {
    pub(crate) mode: ReportingMode,
    pub(crate) sanitizer: Sanitizer,
    pub(crate) separator: String,
    pub(crate) default_buckets: Buckets,
    pub(crate) bucket_cache: BucketCache,
}

impl ScopeShared {
    fn sanitize_tags<'a, I>(&self, tags: I) -> TagMap
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        tags.into_iter()
            .map(|(k, v)| (self.sanitizer.key(k), self.sanitizer.value(v)))
            .collect()
    }
}

/// Name-indexed metrics plus, for flushable kinds, their creation order.
pub(crate) struct MetricMap<M> {
    by_name: HashMap<String, Arc<M>>,
    ordered: Option<Vec<Arc<M>>>,
}

impl<M> MetricMap<M> {
    fn ordered() -> Self {
        Self {
            by_name: HashMap::new(),
            ordered: Some(Vec::with_capacity(16)),
        }
    }

    fn unordered() -> Self {
        Self {
            by_name: HashMap::new(),
            ordered: None,
        }
    }

    fn get(&self, name: &str) -> Option<&Arc<M>> {
        self.by_name.get(name)
    }

    fn insert(&mut self, name: String, metric: Arc<M>) {
        if let Some(list) = &mut self.ordered {
            list.push(Arc::clone(&metric));
        }
        self.by_name.insert(name, metric);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Arc<M>)> {
        self.by_name.iter()
    }

    /// Creation-ordered list (empty for unordered maps).
    pub(crate) fn in_order(&self) -> &[Arc<M>] {
        self.ordered.as_deref().unwrap_or(&[])
    }

    pub(crate) fn len(&self) -> usize {
        self.by_name.len()
    }

    fn clear(&mut self) {
        self.by_name.clear();
        if let Some(list) = &mut self.ordered {
            list.clear();
        }
    }
}

/// Double-checked get-or-create on one kind's map.
fn get_or_create<M, F>(lock: &RwLock<MetricMap<M>>, name: String, make: F) -> Arc<M>
where
    F: FnOnce(&str) -> M,
{
    if let Some(m) = lock.read().get(&name) {
        return Arc::clone(m);
    }

    let mut map = lock.write();
    if let Some(m) = map.get(&name) {
        return Arc::clone(m);
    }
    let metric = Arc::new(make(&name));
    map.insert(name, Arc::clone(&metric));
    metric
}

/// The per-scope state tracked by the registry.
pub(crate) struct ScopeInner {
    pub(crate) key: String,
    pub(crate) prefix: String,
    pub(crate) tags: Tags,
    pub(crate) shared: Arc<ScopeShared>,
    root: bool,

    pub(crate) counters: RwLock<MetricMap<Counter>>,
    pub(crate) gauges: RwLock<MetricMap<Gauge>>,
    pub(crate) timers: RwLock<MetricMap<Timer>>,
    pub(crate) histograms: RwLock<MetricMap<Histogram>>,

    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ScopeInner {
    pub(crate) fn new(prefix: String, tags: Tags, shared: Arc<ScopeShared>, root: bool) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            key: key_for_prefixed_string_map(&prefix, &tags),
            prefix,
            tags,
            shared,
            root,
            counters: RwLock::new(MetricMap::ordered()),
            gauges: RwLock::new(MetricMap::ordered()),
            timers: RwLock::new(MetricMap::unordered()),
            histograms: RwLock::new(MetricMap::ordered()),
            closed: AtomicBool::new(false),
            shutdown,
        }
    }

    pub(crate) fn is_root(&self) -> bool {
        self.root
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// `prefix + separator + name`, or `name` alone for an empty prefix.
    ///
    /// All three parts are already sanitized, so the result is too.
    pub(crate) fn fully_qualified_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            return name.to_owned();
        }
        let mut out =
            String::with_capacity(self.prefix.len() + self.shared.separator.len() + name.len());
        out.push_str(&self.prefix);
        out.push_str(&self.shared.separator);
        out.push_str(name);
        out
    }

    fn counter(&self, name: &str) -> Arc<Counter> {
        let name = self.shared.sanitizer.name(name);
        get_or_create(&self.counters, name, |name| {
            let cached = self
                .shared
                .mode
                .allocator()
                .map(|r| r.allocate_counter(&self.fully_qualified_name(name), &self.tags));
            Counter::new(cached)
        })
    }

    fn gauge(&self, name: &str) -> Arc<Gauge> {
        let name = self.shared.sanitizer.name(name);
        get_or_create(&self.gauges, name, |name| {
            let cached = self
                .shared
                .mode
                .allocator()
                .map(|r| r.allocate_gauge(&self.fully_qualified_name(name), &self.tags));
            Gauge::new(cached)
        })
    }

    fn timer(&self, name: &str) -> Arc<Timer> {
        let name = self.shared.sanitizer.name(name);
        get_or_create(&self.timers, name, |name| {
            let fqn = self.fully_qualified_name(name);
            let cached = self
                .shared
                .mode
                .allocator()
                .map(|r| r.allocate_timer(&fqn, &self.tags));
            let reporter = self.shared.mode.buffered().cloned();
            Timer::new(fqn, Arc::clone(&self.tags), reporter, cached)
        })
    }

    fn histogram(&self, name: &str, buckets: Option<&Buckets>) -> Arc<Histogram> {
        let name = self.shared.sanitizer.name(name);
        get_or_create(&self.histograms, name, |name| {
            let buckets = buckets.unwrap_or(&self.shared.default_buckets);
            let cached = self.shared.mode.allocator().map(|r| {
                r.allocate_histogram(&self.fully_qualified_name(name), &self.tags, buckets)
            });
            let storage = self.shared.bucket_cache.get(buckets.kind(), buckets);
            Histogram::new(storage, cached)
        })
    }

    /// Buffered protocol: walk each kind's map, passing name and tags.
    pub(crate) fn report(&self, r: &dyn StatsReporter) {
        {
            let counters = self.counters.read();
            for (name, c) in counters.iter() {
                c.report(&self.fully_qualified_name(name), &self.tags, r);
            }
        }
        {
            let gauges = self.gauges.read();
            for (name, g) in gauges.iter() {
                g.report(&self.fully_qualified_name(name), &self.tags, r);
            }
        }
        // timers already reported on record
        {
            let histograms = self.histograms.read();
            for (name, h) in histograms.iter() {
                h.report(&self.fully_qualified_name(name), &self.tags, r);
            }
        }
    }

    /// Cached protocol: walk each kind's creation-ordered list.
    pub(crate) fn cached_report(&self) {
        for c in self.counters.read().in_order() {
            c.cached_report();
        }
        for g in self.gauges.read().in_order() {
            g.cached_report();
        }
        for h in self.histograms.read().in_order() {
            h.cached_report();
        }
    }

    /// Drop every metric. Takes all four kind locks in the fixed order.
    pub(crate) fn clear_metrics(&self) {
        let mut counters = self.counters.write();
        let mut gauges = self.gauges.write();
        let mut timers = self.timers.write();
        let mut histograms = self.histograms.write();

        counters.clear();
        gauges.clear();
        timers.clear();
        histograms.clear();

        drop(counters);
        drop(gauges);
        drop(timers);
        drop(histograms);
    }

    /// Copy this scope's current values into `snap`.
    pub(crate) fn snapshot_into(&self, snap: &mut Snapshot) {
        // tags are immutable: copy once per scope, share across its records
        let tags: Tags = Arc::new(TagMap::clone(&self.tags));

        {
            let counters = self.counters.read();
            for (key, c) in counters.iter() {
                let name = self.fully_qualified_name(key);
                let id = key_for_prefixed_string_map(&name, &tags);
                snap.counters.insert(
                    id,
                    CounterSnapshot::new(name, Arc::clone(&tags), c.snapshot()),
                );
            }
        }
        {
            let gauges = self.gauges.read();
            for (key, g) in gauges.iter() {
                let name = self.fully_qualified_name(key);
                let id = key_for_prefixed_string_map(&name, &tags);
                snap.gauges
                    .insert(id, GaugeSnapshot::new(name, Arc::clone(&tags), g.snapshot()));
            }
        }
        {
            let timers = self.timers.read();
            for (key, t) in timers.iter() {
                let name = self.fully_qualified_name(key);
                let id = key_for_prefixed_string_map(&name, &tags);
                snap.timers
                    .insert(id, TimerSnapshot::new(name, Arc::clone(&tags), t.snapshot()));
            }
        }
        {
            let histograms = self.histograms.read();
            for (key, h) in histograms.iter() {
                let name = self.fully_qualified_name(key);
                let id = key_for_prefixed_string_map(&name, &tags);
                snap.histograms.insert(
                    id,
                    HistogramSnapshot::new(
                        name,
                        Arc::clone(&tags),
                        h.snapshot_values(),
                        h.snapshot_durations(),
                    ),
                );
            }
        }
    }

    /// open -> closed, exactly once. Returns whether this call won.
    fn mark_closed(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.shutdown.send_replace(true);
        true
    }
}

/// Handle to a scope. Cheap to clone; clones share the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
    registry: Arc<ScopeRegistry>,
}

impl Scope {
    /// Build a root scope and, for a non-zero `interval`, start its flush loop.
    ///
    /// The flush loop is a tokio task, so a non-zero interval must be
    /// requested from inside a runtime.
    pub fn new_root(opts: ScopeOptions, interval: Duration) -> Result<Self> {
        let scope = Self::build_root(opts);
        if !interval.is_zero() {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|_| StatScopeError::NoRuntime)?;
            let shutdown = scope.inner.shutdown.subscribe();
            let registry = Arc::downgrade(&scope.registry);
            handle.spawn(report_loop(registry, interval, shutdown));
        }
        Ok(scope)
    }

    /// A root scope with no reporter whose timers capture values, for
    /// asserting on `snapshot()` in tests.
    pub fn new_test<I, K, V>(prefix: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::build_root(ScopeOptions::new().with_prefix(prefix).with_tags(tags))
    }

    fn build_root(opts: ScopeOptions) -> Self {
        let sanitizer = opts.sanitize.map(Sanitizer::new).unwrap_or_default();
        let separator = if opts.separator.is_empty() {
            sanitizer.name(DEFAULT_SEPARATOR)
        } else {
            sanitizer.name(&opts.separator)
        };
        let default_buckets = match opts.default_buckets {
            Some(b) if !b.is_empty() => b,
            _ => default_scope_buckets(),
        };

        let shared = Arc::new(ScopeShared {
            mode: ReportingMode::resolve(opts.reporter, opts.cached_reporter),
            sanitizer,
            separator,
            default_buckets,
            bucket_cache: BucketCache::new(),
        });

        let prefix = shared.sanitizer.name(&opts.prefix);
        // copy on creation so caller-side changes never leak in
        let tags = Arc::new(shared.sanitize_tags(&opts.tags));
        let root = Arc::new(ScopeInner::new(prefix, tags, Arc::clone(&shared), true));
        let registry = Arc::new(ScopeRegistry::new(Arc::clone(&root), opts.internal_metrics));

        tracing::debug!(
            prefix = %root.prefix,
            mode = shared.mode.name(),
            "root scope created"
        );

        Self { inner: root, registry }
    }

    pub fn counter(&self, name: &str) -> Arc<Counter> {
        self.inner.counter(name)
    }

    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        self.inner.gauge(name)
    }

    pub fn timer(&self, name: &str) -> Arc<Timer> {
        self.inner.timer(name)
    }

    /// Get or create a histogram. `None` uses the scope's default buckets;
    /// the bucket variant decides whether it records values or durations.
    pub fn histogram(&self, name: &str, buckets: Option<&Buckets>) -> Arc<Histogram> {
        self.inner.histogram(name, buckets)
    }

    /// Same prefix, tags merged with `tags` (new keys win).
    pub fn tagged<I, K, V>(&self, tags: I) -> Scope
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sanitizer = &self.inner.shared.sanitizer;
        let tags: TagMap = tags
            .into_iter()
            .map(|(k, v)| {
                let (k, v): (String, String) = (k.into(), v.into());
                (sanitizer.key(&k), sanitizer.value(&v))
            })
            .collect();
        self.subscope(self.inner.prefix.clone(), Arc::new(tags))
    }

    /// Prefix extended by `name`, tags unchanged.
    pub fn sub_scope(&self, name: &str) -> Scope {
        let name = self.inner.shared.sanitizer.name(name);
        let prefix = self.inner.fully_qualified_name(&name);
        self.subscope(prefix, Arc::new(TagMap::new()))
    }

    fn subscope(&self, prefix: String, tags: Tags) -> Scope {
        match self.registry.subscope(&self.inner, prefix, tags) {
            Some(inner) => Scope {
                inner,
                registry: Arc::clone(&self.registry),
            },
            None => noop_scope().clone(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.shared.mode.capabilities()
    }

    /// Point-in-time copy of every metric in the whole scope tree.
    ///
    /// Walks every live scope under read locks; meant for test assertions,
    /// not production polling. Nothing is reset.
    pub fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::default();
        self.registry.for_each_scope(|s| s.snapshot_into(&mut snap));
        snap
    }

    /// Close the scope. Only the first call does anything.
    ///
    /// Closing the root stops the flush loop, runs one final synchronous
    /// flush of the whole tree, and closes the reporter, returning its error.
    /// A closed subscope is reported once more and dropped from the registry
    /// on the next report pass.
    pub fn close(&self) -> Result<()> {
        // the shared no-op scope stays open for every holder
        if self.same_scope(noop_scope()) {
            return Ok(());
        }
        if !self.inner.mark_closed() {
            return Ok(());
        }
        if !self.inner.is_root() {
            return Ok(());
        }

        tracing::info!(prefix = %self.inner.prefix, "closing root scope");
        self.registry.report_all();
        if let Err(e) = self.inner.shared.mode.close() {
            tracing::warn!(prefix = %self.inner.prefix, error = %e, "reporter close failed");
            return Err(e);
        }
        Ok(())
    }

    /// Flush the whole tree now, as one tick of the flush loop would.
    pub fn flush(&self) {
        self.registry.report_loop_run();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn is_root(&self) -> bool {
        self.inner.is_root()
    }

    /// Fully-qualified prefix (sanitized).
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn separator(&self) -> &str {
        &self.inner.shared.separator
    }

    /// Merged, sanitized tags. Shared, never mutated.
    pub fn tags(&self) -> &Tags {
        &self.inner.tags
    }

    /// Canonical identity used by the registry.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// Whether two handles refer to the same scope.
    pub fn same_scope(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("prefix", &self.inner.prefix)
            .field("tags", &self.inner.tags)
            .field("root", &self.inner.root)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

/// Inert scope usable when no instrumentation is configured.
///
/// Built once through the regular constructor, backed by a discard sink.
pub fn noop_scope() -> &'static Scope {
    static NOOP: OnceLock<Scope> = OnceLock::new();
    NOOP.get_or_init(|| {
        Scope::build_root(ScopeOptions::new().with_reporter(Arc::new(NullStatsReporter)))
    })
}

async fn report_loop(
    registry: Weak<ScopeRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    tick.tick().await;

    tracing::debug!(interval_ms = interval.as_millis() as u64, "report loop started");
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let Some(registry) = registry.upgrade() else { break; };
                registry.report_loop_run();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("report loop stopped");
}
