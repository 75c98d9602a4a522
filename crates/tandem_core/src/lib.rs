//! # Tandem Core
//!
//! Session lifecycle for the Tandem coding assistant: the session tree, its
//! messages and parts, sharing, and the events other components consume.
//!
//! The crate ties the substrate together:
//! - [`tandem_storage`] persists every record and provides transactions
//! - [`tandem_lock`] serializes read-modify-write sequences per key
//! - [`tandem_sync`] replicates mutations of shared sessions to the remote
//!   collaboration endpoint, asynchronously and best-effort
//!
//! [`SessionManager`] is the entry point. It is an explicit service object
//! constructed from injected parts — storage, locks, bus, transport — with
//! no global state, so every test gets a fresh world.
//!
//! ## Consistency
//!
//! Multi-record operations (`remove`, `unshare`) run inside one storage
//! transaction: they apply fully or not at all. Remote calls never gate
//! local consistency — a failed remote delete is logged and the committed
//! local state stands.

mod bus;
mod config;
mod error;
mod identifier;
mod session;

pub use bus::{Bus, Event};
pub use config::{Config, SharePolicy, SHARE_URL_ENV};
pub use error::{SessionError, SessionResult};
pub use identifier::{ascending_id, IdKind};
pub use session::manager::SessionManager;
pub use session::{
    message_key, part_key, session_key, Message, MessageRole, MessageTime, Part, PartBody,
    Session, SessionRevert, SessionShare, SessionTime,
};
