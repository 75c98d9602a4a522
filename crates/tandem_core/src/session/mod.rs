//! The session tree data model.
//!
//! A session is one conversation between user and assistant; children
//! represent delegated sub-work. Messages belong to exactly one session,
//! parts to exactly one message. Parent/child is a weak back-reference:
//! children are discovered by scanning, and `parent_id` always points at an
//! earlier-created id, so the tree is acyclic by construction.

pub mod manager;

use serde::{Deserialize, Serialize};
use tandem_storage::{StorageKey, StorageResult};

/// Timestamps on a session, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTime {
    /// When the session was created.
    pub created: u64,
    /// When the session was last modified.
    pub updated: u64,
    /// Set while the session's history is being compacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compacting: Option<u64>,
}

/// The public face of an active share on a session.
///
/// The write secret lives in the share record
/// ([`tandem_sync::ShareInfo`]), not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionShare {
    /// Public URL of the shared session.
    pub url: String,
}

/// A pending revert marker: the session is rewound to just before the
/// named message (and optionally part).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRevert {
    /// The message the revert points at.
    #[serde(rename = "messageID")]
    pub message_id: String,
    /// The part the revert points at, if finer-grained than a message.
    #[serde(rename = "partID", skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    /// Snapshot reference for restoring working-tree state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

/// One conversation in the session tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Ascending, lexicographically sortable id (`ses_` prefix).
    pub id: String,
    /// The owning project.
    #[serde(rename = "projectID")]
    pub project_id: String,
    /// Working directory the session operates in.
    pub directory: String,
    /// The parent session; always an earlier id.
    #[serde(rename = "parentID", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Human-readable title.
    pub title: String,
    /// Creation and modification times.
    pub time: SessionTime,
    /// Present while the session is shared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<SessionShare>,
    /// Present while a revert is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert: Option<SessionRevert>,
}

impl Session {
    /// Returns true if this session has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human.
    User,
    /// The assistant.
    Assistant,
}

/// Timestamps on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTime {
    /// When the message was created.
    pub created: u64,
    /// When the message finished streaming, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
}

/// One message, owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Ascending id (`msg_` prefix).
    pub id: String,
    /// The owning session.
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Who authored the message.
    pub role: MessageRole,
    /// Creation and completion times.
    pub time: MessageTime,
}

/// Typed content of a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PartBody {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Assistant reasoning, rendered collapsed.
    Reasoning {
        /// The reasoning text.
        text: String,
    },
    /// A file referenced by the conversation.
    File {
        /// Path relative to the session directory.
        path: String,
    },
}

/// One part, owned by exactly one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Ascending id (`prt_` prefix).
    pub id: String,
    /// The owning session.
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// The owning message.
    #[serde(rename = "messageID")]
    pub message_id: String,
    /// The part's content.
    #[serde(flatten)]
    pub body: PartBody,
}

/// Storage key of a session record: `session/<project>/<id>`.
pub fn session_key(project_id: &str, session_id: &str) -> StorageResult<StorageKey> {
    StorageKey::new(["session", project_id, session_id])
}

/// Storage key of a message record: `message/<session>/<message>`.
pub fn message_key(session_id: &str, message_id: &str) -> StorageResult<StorageKey> {
    StorageKey::new(["message", session_id, message_id])
}

/// Storage key of a part record: `part/<session>/<message>/<part>`.
pub fn part_key(session_id: &str, message_id: &str, part_id: &str) -> StorageResult<StorageKey> {
    StorageKey::new(["part", session_id, message_id, part_id])
}
