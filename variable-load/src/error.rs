//! Error types.

use thiserror::Error;

/// Errors raised while turning workload parameters into a demand function.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A range had more than two dash-separated endpoints, such as `1-2-3`.
    #[error("invalid range `{value}` for `{key}`: expected `value` or `low-high`")]
    TooManyEndpoints {
        /// The parameter the range belongs to.
        key: &'static str,
        /// The offending list entry.
        value: String,
    },

    /// A value could not be parsed as a number.
    #[error("invalid number `{value}` for `{key}`")]
    InvalidNumber {
        /// The parameter the value belongs to.
        key: &'static str,
        /// The offending value.
        value: String,
    },

    /// A period resolved to zero or a negative number of seconds.
    #[error("period must be positive, got {0}")]
    NonPositivePeriod(f64),

    /// An amplitude resolved to zero or a negative number.
    #[error("amplitude must be positive, got {0}")]
    NonPositiveAmplitude(f64),

    /// A value was infinite or NaN, or too large for the demand to stay finite.
    #[error("value {value} for `{key}` is out of range")]
    OutOfRange {
        /// The parameter the value belongs to.
        key: &'static str,
        /// The offending value.
        value: f64,
    },

    /// The component count was negative.
    #[error("component count must not be negative, got {0}")]
    NegativeCount(i64),
}

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend was used after [`close`](crate::backend::Backend::close).
    #[error("backend `{0}` is closed")]
    Closed(&'static str),
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
