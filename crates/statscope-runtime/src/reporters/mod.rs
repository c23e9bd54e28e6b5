//! Bundled reporters.

pub mod text;

pub use text::TextReporter;
