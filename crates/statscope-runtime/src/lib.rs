//! statscope runtime: scopes, the scope registry, and the flush loop.
//!
//! A root scope owns a registry of every scope derived from it and, when
//! built with a non-zero interval inside a tokio runtime, a background task
//! that reports the whole tree to the configured sink on each tick.
//! It is intended to be consumed by the demo binary (`main.rs`) and by
//! integration tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied in library code.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod options;
pub mod registry;
pub mod reporters;
pub mod scope;
pub mod snapshot;

pub use options::{ScopeOptions, DEFAULT_SEPARATOR};
pub use registry::{ScopeRegistry, NUM_ACTIVE_SCOPES};
pub use reporters::TextReporter;
pub use scope::{noop_scope, Scope};
pub use snapshot::{CounterSnapshot, GaugeSnapshot, HistogramSnapshot, Snapshot, TimerSnapshot};
