//! # Tandem Lock
//!
//! Per-key reader-writer lock manager for the Tandem core.
//!
//! This crate coordinates the logical tasks of a single process. Each string
//! key names an independent lock; locks for different keys never interact.
//!
//! ## Design Principles
//!
//! - Many concurrent readers or exactly one writer per key
//! - **Writer priority**: when a holder releases, queued writers are serviced
//!   before any queued reader, so reader-heavy contention cannot starve
//!   writers
//! - Timeout-bounded acquisition with guaranteed waiter cleanup
//! - Guards release on every exit path (RAII); double release is a no-op
//! - The lock table prunes idle keys, so sustained churn leaves no trace
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_lock::LockManager;
//!
//! let locks = LockManager::new();
//! let guard = locks.write("session/ses_01").await;
//! // ... mutate the record ...
//! drop(guard); // queued writers are serviced first, then readers
//! ```

mod error;
mod guard;
mod manager;

pub use error::{LockError, LockResult};
pub use guard::{ReadGuard, WriteGuard};
pub use manager::{KeyDiagnostics, LockManager};
