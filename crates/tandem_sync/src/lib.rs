//! # Tandem Sync
//!
//! Asynchronous replication of session mutations to a remote collaboration
//! endpoint.
//!
//! The [`ShareSync`] queue is the only writer to the network: callers hand
//! it `(session, key, content)` triples and get back immediately. A single
//! worker task transmits pending payloads one at a time, preserving global
//! submission order, bounding every attempt with a timeout, and swallowing
//! (but logging) every failure — local correctness never depends on remote
//! reachability.
//!
//! ## Key Invariants
//!
//! - A sync for an unshared session is a cheap no-op
//! - One worker, strict submission order across all keys
//! - Per key, the latest payload wins; a payload arriving while an older
//!   one is in flight is never dropped
//! - A pending entry never outlives the transmission attempt that claimed
//!   it, so sustained network failure cannot grow the pending map
//! - Transmission errors are logged with `{key, error}` and never reach the
//!   caller

mod error;
mod http;
mod protocol;
mod queue;
mod transport;

pub use error::{SyncError, SyncResult};
pub use http::HttpShareClient;
pub use protocol::{
    ShareCreateRequest, ShareCreateResponse, ShareDeleteRequest, ShareInfo, ShareSyncRequest,
};
pub use queue::{ShareSync, REQUEST_TIMEOUT};
pub use transport::{MockCall, MockTransport, ShareTransport};
