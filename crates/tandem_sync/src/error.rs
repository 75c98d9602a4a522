//! Error types for remote share operations.

use thiserror::Error;

/// Result type for remote share operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while talking to the share endpoint.
///
/// Inside [`crate::ShareSync`] these are caught and logged; they surface
/// only from direct transport calls (share creation and deletion) where the
/// caller decides what a remote failure means.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport failed before a response arrived.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The request did not complete within the deadline.
    #[error("remote request timed out after {seconds}s")]
    Timeout {
        /// The deadline that elapsed, in seconds.
        seconds: u64,
    },

    /// The endpoint answered with a non-success status.
    #[error("remote returned status {status}")]
    RemoteStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the decode failure.
        message: String,
    },
}

impl SyncError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}
