//! Error types for lock operations.

use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur while acquiring a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The acquisition was not serviced within the requested deadline.
    ///
    /// The waiter has been removed from the queue; no residual entry
    /// remains.
    #[error("lock timeout on key {key:?} after {timeout_ms}ms")]
    Timeout {
        /// The contended key.
        key: String,
        /// The deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

impl LockError {
    /// Creates a timeout error.
    pub fn timeout(key: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            key: key.into(),
            timeout_ms,
        }
    }
}
