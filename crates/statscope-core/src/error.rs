//! Shared error type across statscope crates.

use thiserror::Error;

/// Stable error categories (used for assertions and log fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration failed to parse or validate.
    BadConfig,
    /// Unsupported config schema version.
    UnsupportedVersion,
    /// Bucket definition could not be built.
    InvalidBuckets,
    /// A flush loop was requested outside a tokio runtime.
    NoRuntime,
    /// The reporting sink failed to close.
    Reporter,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadConfig => "BAD_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::InvalidBuckets => "INVALID_BUCKETS",
            ErrorKind::NoRuntime => "NO_RUNTIME",
            ErrorKind::Reporter => "REPORTER",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, StatScopeError>;

/// Unified error type used by core and runtime.
#[derive(Debug, Error)]
pub enum StatScopeError {
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("invalid buckets: {0}")]
    InvalidBuckets(String),
    #[error("reporting interval requires a tokio runtime")]
    NoRuntime,
    #[error("reporter: {0}")]
    Reporter(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl StatScopeError {
    /// Map the error to its stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StatScopeError::BadConfig(_) => ErrorKind::BadConfig,
            StatScopeError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            StatScopeError::InvalidBuckets(_) => ErrorKind::InvalidBuckets,
            StatScopeError::NoRuntime => ErrorKind::NoRuntime,
            StatScopeError::Reporter(_) => ErrorKind::Reporter,
            StatScopeError::Internal(_) => ErrorKind::Internal,
        }
    }
}
