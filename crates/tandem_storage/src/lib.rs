//! # Tandem Storage
//!
//! Durable hierarchical key-value persistence for the Tandem core.
//!
//! Every key is an ordered, validated sequence of path segments
//! (e.g. `["session", project_id, session_id]`) that maps to one JSON
//! document under the storage root. Missing parent containers are created
//! transparently on write.
//!
//! ## Design Principles
//!
//! - Keys are validated before they ever touch the filesystem: no empty
//!   segments, no leading dots, no traversal characters
//! - Documents are written via write-to-temp + atomic rename
//! - Serialized documents are capped at 10 MiB
//! - Multi-record operations go through [`Transaction`]: staged operations
//!   apply all-at-once or not at all, and misuse of commit/rollback fails
//!   loudly instead of silently corrupting state
//! - One writer process per storage root, enforced with an advisory `LOCK`
//!   file
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_storage::{Storage, StorageKey};
//!
//! let storage = Storage::open(Path::new("data"))?;
//! let key = StorageKey::new(["session", "proj", "ses_01"])?;
//! storage.write(&key, &session).await?;
//! let back: Session = storage.read(&key).await?;
//! ```

mod error;
mod key;
mod store;
mod transaction;

pub use error::{StorageError, StorageResult};
pub use key::StorageKey;
pub use store::{Storage, MAX_VALUE_SIZE};
pub use transaction::{Transaction, TransactionState};
