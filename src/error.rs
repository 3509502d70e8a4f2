//! Crate-wide error types shared by codecs, queues, and pools.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by codec, queue, and pool operations.
///
/// Failures always propagate to the caller; nothing in this crate retries or
/// degrades silently. Retry and backoff policy belong to the caller, which can
/// use [`Error::is_retryable`] to classify a failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Work item could not be serialized for the wire
    #[error("encode error: {0}")]
    Encode(String),

    /// Wire payload could not be turned back into a work item
    #[error("decode error: {0}")]
    Decode(String),

    /// Backing-store operation failed (network, timeout, protocol)
    #[error("store error: {0}")]
    Store(String),

    /// No pool is registered under the requested alias
    #[error("no pool registered for alias '{0}'")]
    PoolNotFound(String),

    /// Connection could not be acquired or failed a requested health check
    #[error("connection error: {0}")]
    Connection(String),

    /// Invalid input such as a key template, owner name, or pool sizing
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Returns true if this error is potentially recoverable with a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Connection(_))
    }
}

// Conversion from Redis errors
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Store(err.to_string())
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}
