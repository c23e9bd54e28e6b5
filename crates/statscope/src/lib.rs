//! Top-level facade crate for statscope.
//!
//! Re-exports the core primitives and the scope runtime so users can depend
//! on a single crate.

pub mod core {
    pub use statscope_core::*;
}

pub mod runtime {
    pub use statscope_runtime::*;
}

pub use statscope_core::{Buckets, Counter, Gauge, Histogram, StatScopeError, Timer};
pub use statscope_runtime::{noop_scope, Scope, ScopeOptions, Snapshot};
