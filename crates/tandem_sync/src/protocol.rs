//! Wire types for the share endpoint.
//!
//! The endpoint speaks JSON over three POST routes: `/share_create`,
//! `/share_sync`, and `/share_delete`.

use serde::{Deserialize, Serialize};

/// The local record of an active share: the write `secret` and the public
/// `url`. At most one exists per session; it is created by `share()` and
/// destroyed by `unshare()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    /// Write credential presented on every sync and delete.
    pub secret: String,
    /// Public, externally reachable URL of the shared session.
    pub url: String,
}

/// Request for `/share_create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCreateRequest {
    /// The session being published.
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

impl ShareCreateRequest {
    /// Creates a share-create request.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

/// Response from `/share_create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCreateResponse {
    /// Write credential for subsequent syncs.
    pub secret: String,
    /// Public URL of the share.
    pub url: String,
}

/// Request for `/share_sync`: replicates one record's latest content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSyncRequest {
    /// The owning session.
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Write credential from the share record.
    pub secret: String,
    /// The record key being replicated.
    pub key: String,
    /// The record's latest content.
    pub content: serde_json::Value,
}

impl ShareSyncRequest {
    /// Creates a share-sync request.
    pub fn new(
        session_id: impl Into<String>,
        secret: impl Into<String>,
        key: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            secret: secret.into(),
            key: key.into(),
            content,
        }
    }
}

/// Request for `/share_delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareDeleteRequest {
    /// The session whose share is being destroyed.
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Write credential from the share record.
    pub secret: String,
}

impl ShareDeleteRequest {
    /// Creates a share-delete request.
    pub fn new(session_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            secret: secret.into(),
        }
    }
}
