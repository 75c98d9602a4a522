//! The session lifecycle manager.

use crate::bus::{Bus, Event};
use crate::config::{Config, SharePolicy};
use crate::error::{SessionError, SessionResult};
use crate::identifier::{ascending_id, now_millis, IdKind};
use crate::session::{
    message_key, part_key, session_key, Message, MessageRole, MessageTime, Part, PartBody,
    Session, SessionShare, SessionTime,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tandem_lock::LockManager;
use tandem_storage::{Storage, StorageError, StorageKey};
use tandem_sync::{
    HttpShareClient, ShareCreateRequest, ShareDeleteRequest, ShareInfo, ShareSync, ShareTransport,
};

/// Atomic, consistent lifecycle operations over the session tree.
///
/// One manager serves one project within one storage root. It is an
/// explicit service object: every collaborator is injected, nothing is
/// global, and [`SessionManager::shutdown`] drains the share queue — so
/// tests get a fresh, fully resettable world each time.
///
/// # Consistency model
///
/// - `remove` and `unshare` stage their multi-record mutations in one
///   storage transaction: they apply fully or not at all
/// - `update` serializes read-modify-write per session via the lock
///   manager's write lock (plain [`tandem_storage::Storage::update`] does
///   not provide this on its own)
/// - remote share calls never gate local consistency: failures are logged
///   and published as [`Event::SessionError`], and the local outcome stands
///
/// Two concurrent `remove` calls over overlapping subtrees are not
/// coordinated; each transaction is individually atomic and record removal
/// is idempotent, so the worst case is that both succeed.
#[derive(Debug)]
pub struct SessionManager {
    project_id: String,
    directory: String,
    config: Config,
    storage: Arc<Storage>,
    locks: Arc<LockManager>,
    bus: Arc<Bus>,
    transport: Arc<dyn ShareTransport>,
    share_sync: Arc<ShareSync>,
}

impl SessionManager {
    /// Creates a manager for `project_id` rooted at `directory`.
    ///
    /// Spawns the share queue's worker, so this must be called from within
    /// a tokio runtime.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        directory: impl Into<String>,
        config: Config,
        storage: Arc<Storage>,
        locks: Arc<LockManager>,
        bus: Arc<Bus>,
        transport: Arc<dyn ShareTransport>,
    ) -> Self {
        let share_sync = Arc::new(ShareSync::new(
            Arc::clone(&storage),
            Arc::clone(&transport),
        ));
        Self {
            project_id: project_id.into(),
            directory: directory.into(),
            config,
            storage,
            locks,
            bus,
            transport,
            share_sync,
        }
    }

    /// Creates a manager whose transport is the HTTP share client pointed
    /// at `config.share_base_url`.
    pub fn with_http_transport(
        project_id: impl Into<String>,
        directory: impl Into<String>,
        config: Config,
        storage: Arc<Storage>,
        locks: Arc<LockManager>,
        bus: Arc<Bus>,
    ) -> SessionResult<Self> {
        let client = HttpShareClient::new(config.share_base_url.clone())?;
        Ok(Self::new(
            project_id,
            directory,
            config,
            storage,
            locks,
            bus,
            Arc::new(client) as Arc<dyn ShareTransport>,
        ))
    }

    /// Returns the event bus.
    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Returns the share queue.
    #[must_use]
    pub fn share_sync(&self) -> &ShareSync {
        &self.share_sync
    }

    /// Returns the project this manager serves.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Drains the share queue and stops its worker.
    pub async fn shutdown(&self) {
        self.share_sync.shutdown().await;
    }

    // ------------------------------------------------------------------
    // Session records
    // ------------------------------------------------------------------

    /// Creates a session, optionally as a child of `parent_id`.
    ///
    /// Publishes [`Event::SessionUpdated`]. Under
    /// [`SharePolicy::Auto`], root sessions are shared best-effort: a
    /// share failure is logged and published as an error event but never
    /// fails the creation.
    pub async fn create(
        &self,
        parent_id: Option<String>,
        title: Option<String>,
    ) -> SessionResult<Session> {
        if let Some(parent) = &parent_id {
            self.get(parent).await?;
        }
        let now = now_millis();
        let session = Session {
            id: ascending_id(IdKind::Session),
            project_id: self.project_id.clone(),
            directory: self.directory.clone(),
            parent_id,
            title: title.unwrap_or_else(|| "Untitled session".to_string()),
            time: SessionTime {
                created: now,
                updated: now,
                compacting: None,
            },
            share: None,
            revert: None,
        };
        self.storage
            .write(&session_key(&self.project_id, &session.id)?, &session)
            .await?;
        self.bus.publish(Event::SessionUpdated {
            info: session.clone(),
        });

        if session.is_root() && self.config.share == SharePolicy::Auto {
            match self.share(&session.id).await {
                Ok(_) => return self.get(&session.id).await,
                Err(error) => {
                    tracing::warn!(session_id = %session.id, error = %error, "auto-share failed");
                    self.bus.publish(Event::SessionError {
                        session_id: Some(session.id.clone()),
                        message: error.to_string(),
                    });
                }
            }
        }
        Ok(session)
    }

    /// Reads a session.
    pub async fn get(&self, id: &str) -> SessionResult<Session> {
        self.storage
            .read(&session_key(&self.project_id, id)?)
            .await
            .map_err(|e| session_not_found(e, id))
    }

    /// Lists the project's sessions, newest first.
    pub async fn list(&self) -> SessionResult<Vec<Session>> {
        let prefix = StorageKey::new(["session", &self.project_id])?;
        let mut sessions = Vec::new();
        for key in self.storage.list(&prefix).await? {
            sessions.push(self.storage.read::<Session>(&key).await?);
        }
        sessions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(sessions)
    }

    /// Lists the direct children of `parent_id`, newest first.
    pub async fn children(&self, parent_id: &str) -> SessionResult<Vec<Session>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.parent_id.as_deref() == Some(parent_id))
            .collect())
    }

    /// Read-modify-write of a session's fields.
    ///
    /// Serialized against concurrent updates of the same session via the
    /// lock manager. Always refreshes `time.updated`; publishes
    /// [`Event::SessionUpdated`].
    pub async fn update<F>(&self, id: &str, editor: F) -> SessionResult<Session>
    where
        F: FnOnce(&mut Session),
    {
        let key = session_key(&self.project_id, id)?;
        let guard = self.locks.write(key.to_string()).await;
        let result = self
            .storage
            .update::<Session, _>(&key, |session| {
                editor(session);
                session.time.updated = now_millis();
            })
            .await;
        drop(guard);

        let session = result.map_err(|e| session_not_found(e, id))?;
        self.bus.publish(Event::SessionUpdated {
            info: session.clone(),
        });
        self.sync_session(&session).await;
        Ok(session)
    }

    /// Removes a session and its whole descendant subtree: every message,
    /// part, share record, and session record, in one transaction.
    ///
    /// After the commit the root's remote share (if any) is deleted
    /// best-effort, and exactly one [`Event::SessionDeleted`] is published
    /// for the root. A failed transaction leaves the tree fully intact and
    /// fails with [`SessionError::RemoveFailed`].
    pub async fn remove(&self, id: &str) -> SessionResult<()> {
        let root = self.get(id).await?;

        // Children are discovered by scanning. Ids make cycles
        // unconstructible, but the traversal is guarded anyway.
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for session in self.list().await? {
            if let Some(parent) = session.parent_id {
                children.entry(parent).or_default().push(session.id);
            }
        }
        let mut doomed = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root.id.clone()];
        while let Some(session_id) = stack.pop() {
            if !visited.insert(session_id.clone()) {
                continue;
            }
            if let Some(kids) = children.get(&session_id) {
                stack.extend(kids.iter().cloned());
            }
            doomed.push(session_id);
        }

        // The root's credentials, read before the records disappear.
        let root_share = self.get_share(id).await.ok();

        let mut keys = Vec::new();
        for session_id in &doomed {
            let parts = StorageKey::new(["part", session_id])?;
            keys.extend(self.storage.list(&parts).await?);
            let messages = StorageKey::new(["message", session_id])?;
            keys.extend(self.storage.list(&messages).await?);
            keys.push(ShareSync::share_record_key(session_id)?);
            keys.push(session_key(&self.project_id, session_id)?);
        }

        let mut tx = self.storage.transaction();
        for key in keys {
            tx.remove(key)?;
        }
        tx.commit()
            .await
            .map_err(|source| SessionError::RemoveFailed {
                id: id.to_string(),
                source,
            })?;

        if let Some(share) = root_share {
            if let Err(error) = self
                .transport
                .share_delete(&ShareDeleteRequest::new(id, &share.secret))
                .await
            {
                tracing::warn!(
                    session_id = id,
                    error = %error,
                    "remote share delete failed during remove; local delete stands"
                );
                self.bus.publish(Event::SessionError {
                    session_id: Some(id.to_string()),
                    message: error.to_string(),
                });
            }
        }

        self.bus.publish(Event::SessionDeleted { info: root });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sharing
    // ------------------------------------------------------------------

    /// Reads a session's share credentials.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotShared`] when no share exists.
    pub async fn get_share(&self, id: &str) -> SessionResult<ShareInfo> {
        match self
            .storage
            .read::<ShareInfo>(&ShareSync::share_record_key(id)?)
            .await
        {
            Ok(info) => Ok(info),
            Err(e) if e.is_not_found() => Err(SessionError::not_shared(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Publishes a session. Idempotent: an already-shared session returns
    /// its existing credentials without touching the remote endpoint.
    ///
    /// A fresh share creates the remote record, persists the local share
    /// record, sets the session's share pointer, and then replays the
    /// session with every existing message and part through the share
    /// queue, so a late share starts from a consistent snapshot.
    pub async fn share(&self, id: &str) -> SessionResult<ShareInfo> {
        if self.config.share == SharePolicy::Disabled {
            return Err(SessionError::SharingDisabled);
        }
        self.get(id).await?;
        if let Ok(existing) = self.get_share(id).await {
            return Ok(existing);
        }

        let response = self
            .transport
            .share_create(&ShareCreateRequest::new(id))
            .await?;
        let info = ShareInfo {
            secret: response.secret,
            url: response.url,
        };
        self.storage
            .write(&ShareSync::share_record_key(id)?, &info)
            .await?;
        let url = info.url.clone();
        let session = self
            .update(id, move |s| s.share = Some(SessionShare { url }))
            .await?;

        self.sync_session(&session).await;
        for message in self.messages(id).await? {
            self.sync_message(&message).await;
            for part in self.parts(id, &message.id).await? {
                self.sync_part(&part).await;
            }
        }
        Ok(info)
    }

    /// Unpublishes a session.
    ///
    /// One transaction removes the share record and clears the session's
    /// share pointer; local state commits first. The remote delete
    /// afterwards is best-effort: its failure is logged and published as an
    /// error event, never rolled back into the local state.
    pub async fn unshare(&self, id: &str) -> SessionResult<Session> {
        let share = self.get_share(id).await?;
        let mut session = self.get(id).await?;
        session.share = None;
        session.time.updated = now_millis();

        let mut tx = self.storage.transaction();
        tx.remove(ShareSync::share_record_key(id)?)?;
        tx.write(session_key(&self.project_id, id)?, &session)?;
        tx.commit().await?;

        if let Err(error) = self
            .transport
            .share_delete(&ShareDeleteRequest::new(id, &share.secret))
            .await
        {
            tracing::warn!(
                session_id = id,
                error = %error,
                "remote share delete failed; local unshare stands"
            );
            self.bus.publish(Event::SessionError {
                session_id: Some(id.to_string()),
                message: error.to_string(),
            });
        }

        self.bus.publish(Event::SessionUpdated {
            info: session.clone(),
        });
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Messages and parts
    // ------------------------------------------------------------------

    /// Appends a message to a session.
    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
    ) -> SessionResult<Message> {
        self.get(session_id).await?;
        let message = Message {
            id: ascending_id(IdKind::Message),
            session_id: session_id.to_string(),
            role,
            time: MessageTime {
                created: now_millis(),
                completed: None,
            },
        };
        self.storage
            .write(&message_key(session_id, &message.id)?, &message)
            .await?;
        self.bus.publish(Event::MessageUpdated {
            info: message.clone(),
        });
        self.sync_message(&message).await;
        Ok(message)
    }

    /// Reads a message.
    pub async fn get_message(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> SessionResult<Message> {
        self.storage
            .read(&message_key(session_id, message_id)?)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    SessionError::MessageNotFound {
                        id: message_id.to_string(),
                    }
                } else {
                    e.into()
                }
            })
    }

    /// Lists a session's messages, oldest first.
    pub async fn messages(&self, session_id: &str) -> SessionResult<Vec<Message>> {
        let prefix = StorageKey::new(["message", session_id])?;
        let mut messages = Vec::new();
        for key in self.storage.list(&prefix).await? {
            messages.push(self.storage.read::<Message>(&key).await?);
        }
        Ok(messages)
    }

    /// Removes a message and its parts in one transaction; publishes
    /// [`Event::MessageRemoved`].
    pub async fn remove_message(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> SessionResult<()> {
        self.get_message(session_id, message_id).await?;

        let mut tx = self.storage.transaction();
        let parts = StorageKey::new(["part", session_id, message_id])?;
        for key in self.storage.list(&parts).await? {
            tx.remove(key)?;
        }
        tx.remove(message_key(session_id, message_id)?)?;
        tx.commit().await?;

        self.bus.publish(Event::MessageRemoved {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    /// Appends a part to a message.
    pub async fn add_part(
        &self,
        session_id: &str,
        message_id: &str,
        body: PartBody,
    ) -> SessionResult<Part> {
        self.get_message(session_id, message_id).await?;
        let part = Part {
            id: ascending_id(IdKind::Part),
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            body,
        };
        self.storage
            .write(&part_key(session_id, message_id, &part.id)?, &part)
            .await?;
        self.bus.publish(Event::PartUpdated { info: part.clone() });
        self.sync_part(&part).await;
        Ok(part)
    }

    /// Lists a message's parts, oldest first.
    pub async fn parts(&self, session_id: &str, message_id: &str) -> SessionResult<Vec<Part>> {
        let prefix = StorageKey::new(["part", session_id, message_id])?;
        let mut parts = Vec::new();
        for key in self.storage.list(&prefix).await? {
            parts.push(self.storage.read::<Part>(&key).await?);
        }
        Ok(parts)
    }

    // ------------------------------------------------------------------
    // Share queue feeding
    // ------------------------------------------------------------------

    async fn sync_session(&self, session: &Session) {
        let Ok(key) = session_key(&session.project_id, &session.id) else {
            return;
        };
        if let Ok(content) = serde_json::to_value(session) {
            self.share_sync
                .sync(&session.id, key.to_string(), content)
                .await;
        }
    }

    async fn sync_message(&self, message: &Message) {
        let Ok(key) = message_key(&message.session_id, &message.id) else {
            return;
        };
        if let Ok(content) = serde_json::to_value(message) {
            self.share_sync
                .sync(&message.session_id, key.to_string(), content)
                .await;
        }
    }

    async fn sync_part(&self, part: &Part) {
        let Ok(key) = part_key(&part.session_id, &part.message_id, &part.id) else {
            return;
        };
        if let Ok(content) = serde_json::to_value(part) {
            self.share_sync
                .sync(&part.session_id, key.to_string(), content)
                .await;
        }
    }
}

fn session_not_found(error: StorageError, id: &str) -> SessionError {
    if error.is_not_found() {
        SessionError::not_found(id)
    } else {
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_sync::MockTransport;
    use tempfile::{tempdir, TempDir};

    struct World {
        _temp: TempDir,
        manager: SessionManager,
        mock: Arc<MockTransport>,
    }

    fn world(config: Config) -> World {
        let temp = tempdir().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let locks = Arc::new(LockManager::new());
        let bus = Arc::new(Bus::new());
        let mock = Arc::new(MockTransport::new());
        let manager = SessionManager::new(
            "proj",
            "/work",
            config,
            storage,
            locks,
            bus,
            mock.clone() as Arc<dyn ShareTransport>,
        );
        World {
            _temp: temp,
            manager,
            mock,
        }
    }

    #[tokio::test]
    async fn create_persists_and_publishes() {
        let w = world(Config::new());
        let mut events = w.manager.bus().subscribe();

        let session = w.manager.create(None, Some("hello".into())).await.unwrap();
        assert!(session.id.starts_with("ses_"));
        assert!(session.is_root());
        assert_eq!(session.title, "hello");
        assert_eq!(session.time.created, session.time.updated);

        let back = w.manager.get(&session.id).await.unwrap();
        assert_eq!(back, session);
        assert!(matches!(
            events.try_recv(),
            Ok(Event::SessionUpdated { .. })
        ));
    }

    #[tokio::test]
    async fn get_absent_session_is_not_found() {
        let w = world(Config::new());
        let err = w.manager.get("ses_missing").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn children_link_to_parents() {
        let w = world(Config::new());
        let parent = w.manager.create(None, None).await.unwrap();
        let child = w
            .manager
            .create(Some(parent.id.clone()), None)
            .await
            .unwrap();
        assert!(child.id > parent.id);

        let kids = w.manager.children(&parent.id).await.unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].id, child.id);
    }

    #[tokio::test]
    async fn create_with_absent_parent_fails() {
        let w = world(Config::new());
        let err = w
            .manager
            .create(Some("ses_missing".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let w = world(Config::new());
        let first = w.manager.create(None, None).await.unwrap();
        let second = w.manager.create(None, None).await.unwrap();

        let listed = w.manager.list().await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn update_refreshes_timestamp() {
        let w = world(Config::new());
        let session = w.manager.create(None, None).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(15)).await;
        let updated = w
            .manager
            .update(&session.id, |s| s.title = "renamed".into())
            .await
            .unwrap();
        assert_eq!(updated.title, "renamed");
        assert!(updated.time.updated > session.time.updated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_serialized() {
        let w = world(Config::new());
        let session = w.manager.create(None, Some(String::new())).await.unwrap();
        let manager = Arc::new(w.manager);

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let manager = Arc::clone(&manager);
            let id = session.id.clone();
            tasks.push(tokio::spawn(async move {
                manager.update(&id, |s| s.title.push('x')).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Every append survived: no read-modify-write was lost.
        let final_state = manager.get(&session.id).await.unwrap();
        assert_eq!(final_state.title, "x".repeat(10));
    }

    #[tokio::test]
    async fn share_is_idempotent() {
        let w = world(Config::new());
        let session = w.manager.create(None, None).await.unwrap();

        let first = w.manager.share(&session.id).await.unwrap();
        let second = w.manager.share(&session.id).await.unwrap();
        assert_eq!(first, second);

        let creates = w
            .mock
            .calls()
            .iter()
            .filter(|c| matches!(c, tandem_sync::MockCall::Create { .. }))
            .count();
        assert_eq!(creates, 1);

        let shared = w.manager.get(&session.id).await.unwrap();
        assert_eq!(shared.share.unwrap().url, first.url);
    }

    #[tokio::test]
    async fn share_fails_when_disabled() {
        let w = world(Config::new().with_share(SharePolicy::Disabled));
        let session = w.manager.create(None, None).await.unwrap();
        let err = w.manager.share(&session.id).await.unwrap_err();
        assert!(matches!(err, SessionError::SharingDisabled));
    }

    #[tokio::test]
    async fn unshare_clears_local_state_even_when_remote_fails() {
        let w = world(Config::new());
        let session = w.manager.create(None, None).await.unwrap();
        w.manager.share(&session.id).await.unwrap();

        w.mock.set_fail(true);
        let unshared = w.manager.unshare(&session.id).await.unwrap();
        assert!(unshared.share.is_none());

        let err = w.manager.get_share(&session.id).await.unwrap_err();
        assert!(matches!(err, SessionError::NotShared { .. }));
        let back = w.manager.get(&session.id).await.unwrap();
        assert!(back.share.is_none());
    }

    #[tokio::test]
    async fn unshare_of_unshared_session_fails() {
        let w = world(Config::new());
        let session = w.manager.create(None, None).await.unwrap();
        let err = w.manager.unshare(&session.id).await.unwrap_err();
        assert!(matches!(err, SessionError::NotShared { .. }));
    }

    #[tokio::test]
    async fn auto_share_publishes_root_sessions() {
        let w = world(Config::new().with_share(SharePolicy::Auto));
        let session = w.manager.create(None, None).await.unwrap();
        assert!(session.share.is_some());
        assert!(w.manager.get_share(&session.id).await.is_ok());

        // Children are not auto-shared.
        let child = w
            .manager
            .create(Some(session.id.clone()), None)
            .await
            .unwrap();
        assert!(child.share.is_none());
    }

    #[tokio::test]
    async fn auto_share_failure_never_fails_creation() {
        let w = world(Config::new().with_share(SharePolicy::Auto));
        w.mock.set_fail(true);
        let mut events = w.manager.bus().subscribe();

        let session = w.manager.create(None, None).await.unwrap();
        assert!(session.share.is_none());

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, Event::SessionError { .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn messages_and_parts_are_owned_records() {
        let w = world(Config::new());
        let session = w.manager.create(None, None).await.unwrap();

        let message = w
            .manager
            .add_message(&session.id, MessageRole::User)
            .await
            .unwrap();
        let part = w
            .manager
            .add_part(
                &session.id,
                &message.id,
                PartBody::Text { text: "hi".into() },
            )
            .await
            .unwrap();

        assert_eq!(w.manager.messages(&session.id).await.unwrap(), vec![message.clone()]);
        assert_eq!(
            w.manager.parts(&session.id, &message.id).await.unwrap(),
            vec![part]
        );

        w.manager
            .remove_message(&session.id, &message.id)
            .await
            .unwrap();
        assert!(w.manager.messages(&session.id).await.unwrap().is_empty());
        assert!(w
            .manager
            .parts(&session.id, &message.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn add_part_to_absent_message_fails() {
        let w = world(Config::new());
        let session = w.manager.create(None, None).await.unwrap();
        let err = w
            .manager
            .add_part(&session.id, "msg_missing", PartBody::Text { text: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::MessageNotFound { .. }));
    }

    #[tokio::test]
    async fn remove_cascades_over_descendants() {
        let w = world(Config::new());
        let s1 = w.manager.create(None, None).await.unwrap();
        let s2 = w.manager.create(Some(s1.id.clone()), None).await.unwrap();
        let s3 = w.manager.create(Some(s2.id.clone()), None).await.unwrap();

        let m = w
            .manager
            .add_message(&s3.id, MessageRole::Assistant)
            .await
            .unwrap();
        w.manager
            .add_part(&s3.id, &m.id, PartBody::Text { text: "deep".into() })
            .await
            .unwrap();

        w.manager.remove(&s1.id).await.unwrap();

        for id in [&s1.id, &s2.id, &s3.id] {
            let err = w.manager.get(id).await.unwrap_err();
            assert!(matches!(err, SessionError::NotFound { .. }));
        }
        assert!(w.manager.messages(&s3.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_remove_leaves_tree_intact() {
        let temp = tempdir().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let locks = Arc::new(LockManager::new());
        let bus = Arc::new(Bus::new());
        let mock = Arc::new(MockTransport::new());
        let manager = SessionManager::new(
            "proj",
            "/work",
            Config::new(),
            storage,
            locks,
            bus,
            mock as Arc<dyn ShareTransport>,
        );

        let s1 = manager.create(None, None).await.unwrap();
        let s2 = manager.create(Some(s1.id.clone()), None).await.unwrap();
        let s3 = manager.create(Some(s2.id.clone()), None).await.unwrap();
        let _m = manager.add_message(&s3.id, MessageRole::User).await.unwrap();

        // A directory squatting on a staged document path: the transaction
        // cannot snapshot it, so the commit must fail with nothing applied.
        let squat = temp.path().join(format!("share/{}.json", s3.id));
        std::fs::create_dir_all(&squat).unwrap();

        let err = manager.remove(&s1.id).await.unwrap_err();
        match err {
            SessionError::RemoveFailed { id, .. } => assert_eq!(id, s1.id),
            other => panic!("expected RemoveFailed, got {other}"),
        }

        // The whole tree survived, messages included.
        for id in [&s1.id, &s2.id, &s3.id] {
            assert!(manager.get(id).await.is_ok());
        }
        assert_eq!(manager.messages(&s3.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_fires_exactly_one_deleted_event() {
        let w = world(Config::new());
        let s1 = w.manager.create(None, None).await.unwrap();
        let s2 = w.manager.create(Some(s1.id.clone()), None).await.unwrap();
        let _s3 = w.manager.create(Some(s2.id.clone()), None).await.unwrap();

        let mut events = w.manager.bus().subscribe();
        w.manager.remove(&s1.id).await.unwrap();

        let mut deleted = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::SessionDeleted { info } = event {
                deleted.push(info.id);
            }
        }
        assert_eq!(deleted, vec![s1.id]);
    }
}
