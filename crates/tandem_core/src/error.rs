//! Error types for session operations.

use tandem_lock::LockError;
use tandem_storage::StorageError;
use tandem_sync::SyncError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session does not exist.
    #[error("session not found: {id}")]
    NotFound {
        /// The absent session id.
        id: String,
    },

    /// The message does not exist.
    #[error("message not found: {id}")]
    MessageNotFound {
        /// The absent message id.
        id: String,
    },

    /// The session has no share.
    #[error("session is not shared: {id}")]
    NotShared {
        /// The unshared session id.
        id: String,
    },

    /// Sharing is disabled by configuration.
    #[error("sharing is disabled by configuration")]
    SharingDisabled,

    /// The cascading delete's transaction failed; the session tree is
    /// fully intact.
    #[error("failed to remove session {id}: {source}")]
    RemoveFailed {
        /// The removal root.
        id: String,
        /// What broke the transaction.
        #[source]
        source: StorageError,
    },

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A lock acquisition failed.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// The share endpoint failed on a call whose outcome the caller needs.
    #[error("share endpoint error: {0}")]
    Remote(#[from] SyncError),
}

impl SessionError {
    /// Creates a session-not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a not-shared error.
    pub fn not_shared(id: impl Into<String>) -> Self {
        Self::NotShared { id: id.into() }
    }
}
