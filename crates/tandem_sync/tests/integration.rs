//! Integration tests for the share queue against real storage.

use std::sync::Arc;
use std::time::Duration;
use tandem_storage::Storage;
use tandem_sync::{
    MockCall, MockTransport, ShareCreateRequest, ShareInfo, ShareSync, ShareTransport,
};
use tempfile::tempdir;

#[tokio::test]
async fn share_lifecycle_gates_the_queue() {
    let temp = tempdir().unwrap();
    let storage = Arc::new(Storage::open(temp.path()).unwrap());
    let mock = Arc::new(MockTransport::new());
    let sync = ShareSync::new(Arc::clone(&storage), mock.clone());

    // Before the share record exists, syncs are no-ops.
    sync.sync("ses_01", "session/p/ses_01", serde_json::json!(1))
        .await;

    // Create the remote share and persist the local record, the way the
    // session layer does.
    let created = mock
        .share_create(&ShareCreateRequest::new("ses_01"))
        .await
        .unwrap();
    let record_key = ShareSync::share_record_key("ses_01").unwrap();
    storage
        .write(
            &record_key,
            &ShareInfo {
                secret: created.secret,
                url: created.url,
            },
        )
        .await
        .unwrap();

    // Now syncs flow through.
    sync.sync("ses_01", "session/p/ses_01", serde_json::json!(2))
        .await;
    sync.sync("ses_01", "message/ses_01/msg_01", serde_json::json!(3))
        .await;

    // Destroying the record gates the queue again.
    storage.remove(&record_key).await.unwrap();
    sync.sync("ses_01", "session/p/ses_01", serde_json::json!(4))
        .await;

    sync.shutdown().await;

    let keys = mock.sync_keys();
    assert_eq!(keys, vec!["session/p/ses_01", "message/ses_01/msg_01"]);
    assert_eq!(sync.pending_len(), 0);
}

#[tokio::test]
async fn sustained_failure_does_not_grow_the_pending_map() {
    let temp = tempdir().unwrap();
    let storage = Arc::new(Storage::open(temp.path()).unwrap());
    let mock = Arc::new(MockTransport::new());
    storage
        .write(
            &ShareSync::share_record_key("ses_01").unwrap(),
            &ShareInfo {
                secret: "sec".into(),
                url: "https://share.invalid/s/ses_01".into(),
            },
        )
        .await
        .unwrap();

    mock.set_fail(true);
    mock.set_delay(Duration::from_millis(5));
    let sync = ShareSync::new(storage, mock.clone());

    for i in 0..50 {
        sync.sync("ses_01", format!("key/{}", i % 5), serde_json::json!(i))
            .await;
    }
    sync.shutdown().await;

    // Every attempt resolved (with a failure) and claimed its entry.
    assert_eq!(sync.pending_len(), 0);
    assert!(mock
        .calls()
        .iter()
        .all(|c| matches!(c, MockCall::Sync { .. })));
}
