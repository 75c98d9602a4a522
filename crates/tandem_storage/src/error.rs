//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key or one of its segments failed validation.
    #[error("invalid key {key:?}: {message}")]
    InvalidKey {
        /// The offending key, rendered with `/` separators.
        key: String,
        /// Which rule was violated.
        message: String,
    },

    /// A serialized document exceeded the size limit.
    #[error("value for key {key:?} is {size} bytes, limit is {limit}")]
    ValueTooLarge {
        /// The key being written.
        key: String,
        /// Serialized size in bytes.
        size: usize,
        /// The enforced limit in bytes.
        limit: usize,
    },

    /// The key has no document.
    #[error("key not found: {key}")]
    NotFound {
        /// The absent key, rendered with `/` separators.
        key: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A transaction was used after it was committed or rolled back.
    #[error("transaction misuse: {message}")]
    TransactionState {
        /// What was attempted and why it is illegal.
        message: String,
    },

    /// Another process holds the storage root.
    #[error("storage root is locked by another process")]
    RootLocked,
}

impl StorageError {
    /// Creates an invalid-key error.
    pub fn invalid_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a transaction-misuse error.
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState {
            message: message.into(),
        }
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
