//! Transport abstraction for the share endpoint.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    ShareCreateRequest, ShareCreateResponse, ShareDeleteRequest, ShareSyncRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// The three operations the share endpoint exposes.
///
/// Implement this trait to provide the actual transport;
/// [`crate::HttpShareClient`] is the production implementation and
/// [`MockTransport`] the test one.
#[async_trait]
pub trait ShareTransport: Send + Sync + std::fmt::Debug {
    /// Creates a remote share record and returns its credentials.
    async fn share_create(&self, request: &ShareCreateRequest) -> SyncResult<ShareCreateResponse>;

    /// Replicates one record's latest content to the share.
    async fn share_sync(&self, request: &ShareSyncRequest) -> SyncResult<()>;

    /// Destroys the remote share record.
    async fn share_delete(&self, request: &ShareDeleteRequest) -> SyncResult<()>;
}

/// One call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// A `share_create` call.
    Create {
        /// The published session.
        session_id: String,
    },
    /// A `share_sync` call.
    Sync {
        /// The replicated key.
        key: String,
        /// The replicated content.
        content: serde_json::Value,
    },
    /// A `share_delete` call.
    Delete {
        /// The unpublished session.
        session_id: String,
    },
}

/// An in-memory transport that records every call.
///
/// Failure and latency are injectable, so tests can drive the queue through
/// timeout and error paths without a network.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<MockCall>>,
    fail: AtomicBool,
    delay_ms: AtomicU64,
    next_share: AtomicU64,
}

impl MockTransport {
    /// Creates a well-behaved mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with a transport error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Delays every subsequent call by `delay` before it resolves.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Returns every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded `share_sync` keys, in order.
    #[must_use]
    pub fn sync_keys(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::Sync { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    async fn observe(&self, call: MockCall) -> SyncResult<()> {
        self.calls.lock().push(call);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::transport("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ShareTransport for MockTransport {
    async fn share_create(&self, request: &ShareCreateRequest) -> SyncResult<ShareCreateResponse> {
        self.observe(MockCall::Create {
            session_id: request.session_id.clone(),
        })
        .await?;
        let serial = self.next_share.fetch_add(1, Ordering::SeqCst);
        Ok(ShareCreateResponse {
            secret: format!("mock-secret-{serial}"),
            url: format!("https://share.invalid/s/{}", request.session_id),
        })
    }

    async fn share_sync(&self, request: &ShareSyncRequest) -> SyncResult<()> {
        self.observe(MockCall::Sync {
            key: request.key.clone(),
            content: request.content.clone(),
        })
        .await
    }

    async fn share_delete(&self, request: &ShareDeleteRequest) -> SyncResult<()> {
        self.observe(MockCall::Delete {
            session_id: request.session_id.clone(),
        })
        .await
    }
}
