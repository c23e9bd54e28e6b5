//! Root scope options and the one-time reporter resolution.

use std::fmt;
use std::sync::Arc;

use statscope_core::{
    Buckets, CachedStatsReporter, Capabilities, Result, SanitizeOptions, StatsReporter, TagMap,
};

/// Separator used to join nested scope names when none is configured.
pub const DEFAULT_SEPARATOR: &str = ".";

/// Options for building a root scope.
///
/// Providing no reporter gives an inert scope. Providing both makes the
/// buffered reporter authoritative for flushing and timers; cached handles
/// are still allocated for every metric.
#[derive(Clone, Default)]
pub struct ScopeOptions {
    pub prefix: String,
    pub tags: TagMap,
    pub separator: String,
    pub reporter: Option<Arc<dyn StatsReporter>>,
    pub cached_reporter: Option<Arc<dyn CachedStatsReporter>>,
    pub default_buckets: Option<Buckets>,
    pub sanitize: Option<SanitizeOptions>,
    pub internal_metrics: bool,
}

impl ScopeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags = tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn StatsReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_cached_reporter(mut self, reporter: Arc<dyn CachedStatsReporter>) -> Self {
        self.cached_reporter = Some(reporter);
        self
    }

    pub fn with_default_buckets(mut self, buckets: Buckets) -> Self {
        self.default_buckets = Some(buckets);
        self
    }

    pub fn with_sanitize(mut self, sanitize: SanitizeOptions) -> Self {
        self.sanitize = Some(sanitize);
        self
    }

    pub fn with_internal_metrics(mut self, enabled: bool) -> Self {
        self.internal_metrics = enabled;
        self
    }
}

impl fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("prefix", &self.prefix)
            .field("tags", &self.tags)
            .field("separator", &self.separator)
            .field("reporter", &self.reporter.is_some())
            .field("cached_reporter", &self.cached_reporter.is_some())
            .field("default_buckets", &self.default_buckets)
            .field("sanitize", &self.sanitize.is_some())
            .field("internal_metrics", &self.internal_metrics)
            .finish()
    }
}

/// Which flush protocol a scope tree uses. Decided once at root construction.
#[derive(Clone)]
pub(crate) enum ReportingMode {
    Inert,
    Buffered {
        reporter: Arc<dyn StatsReporter>,
        cached: Option<Arc<dyn CachedStatsReporter>>,
    },
    Cached(Arc<dyn CachedStatsReporter>),
}

impl ReportingMode {
    pub(crate) fn resolve(
        reporter: Option<Arc<dyn StatsReporter>>,
        cached: Option<Arc<dyn CachedStatsReporter>>,
    ) -> Self {
        match (reporter, cached) {
            (Some(reporter), cached) => ReportingMode::Buffered { reporter, cached },
            (None, Some(cached)) => ReportingMode::Cached(cached),
            (None, None) => ReportingMode::Inert,
        }
    }

    /// Reporter used by the buffered protocol and by timers.
    pub(crate) fn buffered(&self) -> Option<&Arc<dyn StatsReporter>> {
        match self {
            ReportingMode::Buffered { reporter, .. } => Some(reporter),
            _ => None,
        }
    }

    /// Reporter that hands out per-metric handles, if any.
    pub(crate) fn allocator(&self) -> Option<&Arc<dyn CachedStatsReporter>> {
        match self {
            ReportingMode::Buffered { cached, .. } => cached.as_ref(),
            ReportingMode::Cached(cached) => Some(cached),
            ReportingMode::Inert => None,
        }
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        match self {
            ReportingMode::Buffered { reporter, .. } => reporter.capabilities(),
            ReportingMode::Cached(cached) => cached.capabilities(),
            ReportingMode::Inert => Capabilities::NONE,
        }
    }

    pub(crate) fn close(&self) -> Result<()> {
        match self {
            ReportingMode::Buffered { reporter, .. } => reporter.close(),
            ReportingMode::Cached(cached) => cached.close(),
            ReportingMode::Inert => Ok(()),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            ReportingMode::Buffered { .. } => "buffered",
            ReportingMode::Cached(_) => "cached",
            ReportingMode::Inert => "inert",
        }
    }
}
