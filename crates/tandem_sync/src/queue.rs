//! The serial share-sync queue.

use crate::protocol::{ShareInfo, ShareSyncRequest};
use crate::transport::ShareTransport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tandem_storage::{Storage, StorageKey, StorageResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Deadline for every remote request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The latest payload recorded for a key, plus the credentials it will be
/// transmitted with.
#[derive(Debug)]
struct Pending {
    session_id: String,
    secret: String,
    content: serde_json::Value,
}

#[derive(Debug)]
struct Inner {
    storage: Arc<Storage>,
    transport: Arc<dyn ShareTransport>,
    pending: Mutex<HashMap<String, Pending>>,
    jobs: Mutex<Option<mpsc::UnboundedSender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

/// Order-preserving, leak-free, failure-isolated replication queue.
///
/// One worker task drains the queue: transmissions happen one at a time, in
/// submission order across all keys. Per key only the latest payload is
/// pending; the worker claims (removes) the entry when its transmission
/// starts, so the pending map never grows under sustained failure, and a
/// payload recorded while an older one is in flight waits for its own
/// claim instead of being dropped.
///
/// Every failure — transport error, non-success status, 30-second timeout —
/// is logged with the key and swallowed. `sync` never blocks on the network
/// and never fails the originating call.
#[derive(Debug)]
pub struct ShareSync {
    inner: Arc<Inner>,
}

impl ShareSync {
    /// Creates the queue and spawns its worker. Must be called from within
    /// a tokio runtime.
    #[must_use]
    pub fn new(storage: Arc<Storage>, transport: Arc<dyn ShareTransport>) -> Self {
        Self::with_timeout(storage, transport, REQUEST_TIMEOUT)
    }

    /// Creates the queue with a custom per-transmission deadline.
    #[must_use]
    pub fn with_timeout(
        storage: Arc<Storage>,
        transport: Arc<dyn ShareTransport>,
        timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            storage,
            transport,
            pending: Mutex::new(HashMap::new()),
            jobs: Mutex::new(Some(tx)),
            worker: Mutex::new(None),
            timeout,
        });
        let handle = tokio::spawn(Self::worker_loop(Arc::clone(&inner), rx));
        *inner.worker.lock() = Some(handle);
        Self { inner }
    }

    /// The storage key of a session's share record.
    ///
    /// Share records are keyed by session id alone; session ids are
    /// globally unique.
    pub fn share_record_key(session_id: &str) -> StorageResult<StorageKey> {
        StorageKey::new(["share", session_id])
    }

    /// Records `content` as the latest pending payload for `key` and
    /// enqueues its transmission.
    ///
    /// A cheap no-op if `session_id` has no share record. Never blocks on
    /// the network; never fails the caller.
    pub async fn sync(&self, session_id: &str, key: impl Into<String>, content: serde_json::Value) {
        let key = key.into();
        let Ok(record_key) = Self::share_record_key(session_id) else {
            tracing::trace!(key, session_id, "session id is not a valid key segment");
            return;
        };
        let share: ShareInfo = match self.inner.storage.read(&record_key).await {
            Ok(info) => info,
            Err(_) => {
                tracing::trace!(key, session_id, "session not shared; skipping sync");
                return;
            }
        };

        let Some(sender) = self.inner.jobs.lock().as_ref().cloned() else {
            tracing::warn!(key, "share sync queue is shut down; dropping payload");
            return;
        };
        self.inner.pending.lock().insert(
            key.clone(),
            Pending {
                session_id: session_id.to_string(),
                secret: share.secret,
                content,
            },
        );
        // The receiver outlives every sender clone; this cannot fail.
        let _ = sender.send(key);
    }

    /// Number of payloads currently awaiting transmission.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Returns true if `key` has a payload awaiting transmission.
    #[must_use]
    pub fn has_pending(&self, key: &str) -> bool {
        self.inner.pending.lock().contains_key(key)
    }

    /// Stops accepting new work and waits for already-enqueued
    /// transmissions to drain.
    pub async fn shutdown(&self) {
        let sender = self.inner.jobs.lock().take();
        drop(sender);
        let worker = self.inner.worker.lock().take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "share sync worker panicked");
            }
        }
    }

    async fn worker_loop(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<String>) {
        while let Some(key) = rx.recv().await {
            // Claim the latest payload. An empty claim means an earlier
            // attempt already carried this payload (coalesced).
            let Some(pending) = inner.pending.lock().remove(&key) else {
                continue;
            };
            let request = ShareSyncRequest::new(
                pending.session_id,
                pending.secret,
                key.clone(),
                pending.content,
            );
            match tokio::time::timeout(inner.timeout, inner.transport.share_sync(&request)).await
            {
                Ok(Ok(())) => {
                    tracing::debug!(key, "share sync delivered");
                }
                Ok(Err(error)) => {
                    tracing::warn!(key, error = %error, "share sync failed");
                }
                Err(_) => {
                    tracing::warn!(
                        key,
                        timeout_s = inner.timeout.as_secs(),
                        "share sync timed out"
                    );
                }
            }
        }
    }
}

impl Drop for ShareSync {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit on its own;
        // without this the worker would hold the inner Arc forever.
        self.inner.jobs.lock().take();
    }
}
