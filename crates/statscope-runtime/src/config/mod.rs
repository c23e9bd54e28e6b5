//! Scope config loader (strict parsing).

pub mod schema;

use std::fs;

use statscope_core::error::{Result, StatScopeError};

pub use schema::{BucketsSection, ScopeSection, StatScopeConfig};

pub fn load_from_file(path: &str) -> Result<StatScopeConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| StatScopeError::BadConfig(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<StatScopeConfig> {
    let cfg: StatScopeConfig = serde_yaml::from_str(s)
        .map_err(|e| StatScopeError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
