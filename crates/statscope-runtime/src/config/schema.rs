use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use statscope_core::error::{Result, StatScopeError};
use statscope_core::{Buckets, SanitizeOptions};

use crate::options::ScopeOptions;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatScopeConfig {
    pub version: u32,

    #[serde(default)]
    pub scope: ScopeSection,
}

impl StatScopeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(StatScopeError::UnsupportedVersion);
        }
        self.scope.validate()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeSection {
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// 0 disables the flush loop.
    #[serde(default = "default_reporting_interval_ms")]
    pub reporting_interval_ms: u64,

    #[serde(default)]
    pub default_buckets: Option<BucketsSection>,

    #[serde(default)]
    pub sanitize: Option<SanitizeOptions>,

    #[serde(default)]
    pub internal_metrics: bool,
}

impl Default for ScopeSection {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            separator: default_separator(),
            tags: BTreeMap::new(),
            reporting_interval_ms: default_reporting_interval_ms(),
            default_buckets: None,
            sanitize: None,
            internal_metrics: false,
        }
    }
}

impl ScopeSection {
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(StatScopeError::BadConfig(
                "scope.separator must not be empty".into(),
            ));
        }
        if self.reporting_interval_ms != 0
            && !(10..=3_600_000).contains(&self.reporting_interval_ms)
        {
            return Err(StatScopeError::BadConfig(
                "scope.reporting_interval_ms must be 0 or between 10 and 3600000".into(),
            ));
        }
        if let Some(b) = &self.default_buckets {
            b.to_buckets()?;
        }
        Ok(())
    }

    pub fn reporting_interval(&self) -> Duration {
        Duration::from_millis(self.reporting_interval_ms)
    }

    /// Options without a reporter; attach one with `with_reporter` or
    /// `with_cached_reporter`.
    pub fn to_options(&self) -> Result<ScopeOptions> {
        let mut opts = ScopeOptions::new()
            .with_prefix(self.prefix.clone())
            .with_tags(self.tags.clone())
            .with_separator(self.separator.clone())
            .with_internal_metrics(self.internal_metrics);
        if let Some(b) = &self.default_buckets {
            opts = opts.with_default_buckets(b.to_buckets()?);
        }
        if let Some(s) = &self.sanitize {
            opts = opts.with_sanitize(s.clone());
        }
        Ok(opts)
    }
}

fn default_separator() -> String {
    ".".into()
}
fn default_reporting_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKind {
    Values,
    /// Bounds in milliseconds.
    Durations,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearSpec {
    pub start: f64,
    pub width: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExponentialSpec {
    pub start: f64,
    pub factor: f64,
    pub count: usize,
}

/// Exactly one of `bounds`, `linear`, or `exponential`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketsSection {
    pub kind: BucketKind,
    #[serde(default)]
    pub bounds: Option<Vec<f64>>,
    #[serde(default)]
    pub linear: Option<LinearSpec>,
    #[serde(default)]
    pub exponential: Option<ExponentialSpec>,
}

impl BucketsSection {
    pub fn to_buckets(&self) -> Result<Buckets> {
        match (&self.bounds, &self.linear, &self.exponential) {
            (Some(bounds), None, None) => self.bounds_to_buckets(bounds),
            (None, Some(l), None) => match self.kind {
                BucketKind::Values => Buckets::linear_values(l.start, l.width, l.count),
                BucketKind::Durations => {
                    Buckets::linear_durations(millis(l.start)?, millis(l.width)?, l.count)
                }
            },
            (None, None, Some(e)) => match self.kind {
                BucketKind::Values => Buckets::exponential_values(e.start, e.factor, e.count),
                BucketKind::Durations => {
                    Buckets::exponential_durations(millis(e.start)?, e.factor, e.count)
                }
            },
            _ => Err(StatScopeError::BadConfig(
                "scope.default_buckets needs exactly one of bounds, linear, exponential".into(),
            )),
        }
    }

    fn bounds_to_buckets(&self, bounds: &[f64]) -> Result<Buckets> {
        if bounds.is_empty() {
            return Err(StatScopeError::InvalidBuckets("bounds must not be empty".into()));
        }
        if !bounds.windows(2).all(|w| w[0] < w[1]) {
            return Err(StatScopeError::InvalidBuckets(
                "bounds must be strictly ascending".into(),
            ));
        }
        match self.kind {
            BucketKind::Values => Ok(Buckets::Values(bounds.to_vec())),
            BucketKind::Durations => Ok(Buckets::Durations(
                bounds.iter().map(|ms| millis(*ms)).collect::<Result<_>>()?,
            )),
        }
    }
}

fn millis(ms: f64) -> Result<Duration> {
    let nanos = (ms * 1_000_000.0).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return Err(StatScopeError::InvalidBuckets(format!("bad duration {ms}ms")));
    }
    Ok(Duration::from_nanos(nanos as u64))
}
