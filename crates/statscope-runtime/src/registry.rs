//! Scope registry: canonical identity -> live scope.
//!
//! The registry is the only place subscopes are deduplicated. Keys are
//! `prefix+k1=v1,...` over the fully-merged, sanitized tags, so any two
//! derivations that normalize to the same key get the same scope.
//!
//! Closed subscopes are reclaimed lazily: the next report pass reports them
//! one last time, removes them, and clears their metrics. Entries are never
//! evicted otherwise, so unbounded tag cardinality means unbounded growth.

use std::sync::Arc;

use dashmap::DashMap;

use statscope_core::{
    key_for_prefixed_string_map, merge_right_tags, CachedGauge, StatsReporter, Tags,
};

use crate::options::ReportingMode;
use crate::scope::ScopeInner;

/// Name of the gauge reporting the number of live scopes.
pub const NUM_ACTIVE_SCOPES: &str = "statscope.internal.num_active_scopes";

struct InternalMetrics {
    name: String,
    tags: Tags,
    cached: Option<Arc<dyn CachedGauge>>,
}

/// Sharded map of every live scope under one root.
pub struct ScopeRegistry {
    root: Arc<ScopeInner>,
    scopes: DashMap<String, Arc<ScopeInner>>,
    internal: Option<InternalMetrics>,
}

impl ScopeRegistry {
    pub(crate) fn new(root: Arc<ScopeInner>, internal_metrics: bool) -> Self {
        let internal = internal_metrics.then(|| {
            let name = root.fully_qualified_name(&root.shared.sanitizer.name(NUM_ACTIVE_SCOPES));
            let cached = root
                .shared
                .mode
                .allocator()
                .map(|r| r.allocate_gauge(&name, &root.tags));
            InternalMetrics {
                name,
                tags: Arc::clone(&root.tags),
                cached,
            }
        });

        let scopes = DashMap::new();
        scopes.insert(root.key.clone(), Arc::clone(&root));

        Self {
            root,
            scopes,
            internal,
        }
    }

    /// Get or create the scope for `prefix` and `parent.tags` merged with `tags`.
    ///
    /// Returns `None` once the root or the parent is closed; callers hand out
    /// the no-op scope instead.
    pub(crate) fn subscope(
        &self,
        parent: &ScopeInner,
        prefix: String,
        tags: Tags,
    ) -> Option<Arc<ScopeInner>> {
        if self.root.is_closed() || parent.is_closed() {
            return None;
        }

        let merged = merge_right_tags(&parent.tags, &tags);
        let key = key_for_prefixed_string_map(&prefix, &merged);

        if let Some(existing) = self.scopes.get(&key) {
            return Some(Arc::clone(existing.value()));
        }

        let entry = self.scopes.entry(key).or_insert_with(|| {
            Arc::new(ScopeInner::new(
                prefix,
                merged,
                Arc::clone(&parent.shared),
                false,
            ))
        });
        Some(Arc::clone(entry.value()))
    }

    /// Visit every live scope. Shard locks are not held during the visit.
    pub(crate) fn for_each_scope<F>(&self, mut f: F)
    where
        F: FnMut(&ScopeInner),
    {
        for s in self.live() {
            f(&s);
        }
    }

    /// Buffered protocol over the whole tree.
    pub(crate) fn report(&self, r: &dyn StatsReporter) {
        if let Some(internal) = &self.internal {
            r.report_gauge(&internal.name, &internal.tags, self.scopes.len() as f64);
        }

        for s in self.live() {
            s.report(r);
            if s.is_closed() && !s.is_root() {
                self.reap(&s);
            }
        }

        self.purge_if_root_closed();
    }

    /// Cached protocol over the whole tree.
    pub(crate) fn cached_report(&self) {
        if let Some(InternalMetrics {
            cached: Some(gauge), ..
        }) = &self.internal
        {
            gauge.report_gauge(self.scopes.len() as f64);
        }

        for s in self.live() {
            s.cached_report();
            if s.is_closed() && !s.is_root() {
                self.reap(&s);
            }
        }

        self.purge_if_root_closed();
    }

    /// Run the configured protocol, then flush the sink.
    pub(crate) fn report_all(&self) {
        match &self.root.shared.mode {
            ReportingMode::Buffered { reporter, .. } => {
                self.report(&**reporter);
                reporter.flush();
            }
            ReportingMode::Cached(cached) => {
                self.cached_report();
                cached.flush();
            }
            ReportingMode::Inert => {}
        }
    }

    /// One flush-loop tick: a no-op once the root is closed.
    pub(crate) fn report_loop_run(&self) {
        if self.root.is_closed() {
            return;
        }
        self.report_all();
    }

    /// Number of live scopes, root included.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    fn live(&self) -> Vec<Arc<ScopeInner>> {
        self.scopes.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Remove a closed scope and drop its metrics.
    ///
    /// A record that lands between the scope's last report and its close is
    /// cleared here without being reported. That window is accepted.
    fn reap(&self, s: &Arc<ScopeInner>) {
        let removed = self
            .scopes
            .remove_if(&s.key, |_, v| Arc::ptr_eq(v, s))
            .is_some();
        s.clear_metrics();
        if removed {
            tracing::debug!(key = %s.key, "closed scope removed from registry");
        }
    }

    fn purge_if_root_closed(&self) {
        if !self.root.is_closed() {
            return;
        }
        for s in self.live() {
            self.scopes.remove_if(&s.key, |_, v| Arc::ptr_eq(v, &s));
            s.clear_metrics();
        }
    }
}
