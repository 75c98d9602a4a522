//! Staged multi-document transactions.

use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;
use crate::store::Storage;
use serde::Serialize;
use std::collections::HashMap;

/// State of a transaction.
///
/// At most one of `Committed`/`RolledBack` is ever reached; once either is,
/// every further stage, commit, or rollback fails with
/// [`StorageError::TransactionState`] and never touches durable state
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// The transaction accepts staged operations.
    Active,
    /// `commit` applied every staged operation.
    Committed,
    /// `rollback` discarded the staged operations, or a failed commit was
    /// undone.
    RolledBack,
}

/// One staged operation.
#[derive(Debug)]
enum StagedOp {
    Write { key: StorageKey, payload: Vec<u8> },
    Remove { key: StorageKey },
}

impl StagedOp {
    fn key(&self) -> &StorageKey {
        match self {
            StagedOp::Write { key, .. } | StagedOp::Remove { key } => key,
        }
    }
}

/// An ordered batch of storage mutations applied all-at-once or not at all.
///
/// Staging (`write`/`remove`) touches no durable state. `commit` snapshots
/// the prior contents of every affected key, applies the operations in
/// order, and on any failure restores the snapshots before propagating, so
/// storage is never left half-mutated.
///
/// # Example
///
/// ```rust,ignore
/// let mut tx = storage.transaction();
/// tx.write(info_key, &session)?;
/// tx.remove(share_key)?;
/// tx.commit().await?;
/// ```
#[derive(Debug)]
pub struct Transaction<'a> {
    storage: &'a Storage,
    ops: Vec<StagedOp>,
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            ops: Vec::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if the transaction still accepts operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Stages a write of `value` at `key`.
    ///
    /// Serialization and the size limit are enforced at staging time so a
    /// doomed transaction fails before `commit` mutates anything.
    pub fn write<T: Serialize>(&mut self, key: StorageKey, value: &T) -> StorageResult<()> {
        self.ensure_active("write")?;
        let payload = serde_json::to_vec(value)?;
        if payload.len() > crate::store::MAX_VALUE_SIZE {
            return Err(StorageError::ValueTooLarge {
                key: key.to_string(),
                size: payload.len(),
                limit: crate::store::MAX_VALUE_SIZE,
            });
        }
        self.ops.push(StagedOp::Write { key, payload });
        Ok(())
    }

    /// Stages a remove of `key`.
    pub fn remove(&mut self, key: StorageKey) -> StorageResult<()> {
        self.ensure_active("remove")?;
        self.ops.push(StagedOp::Remove { key });
        Ok(())
    }

    /// Applies every staged operation, in order.
    ///
    /// On failure the prior contents of every affected key are restored,
    /// the transaction becomes `RolledBack`, and the cause propagates:
    /// nothing is left durably half-applied.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] if the transaction already
    /// committed or rolled back.
    pub async fn commit(&mut self) -> StorageResult<()> {
        self.ensure_active("commit")?;

        // Snapshot the first-seen prior state of each affected key.
        let mut snapshots: HashMap<&StorageKey, Option<Vec<u8>>> = HashMap::new();
        for op in &self.ops {
            if snapshots.contains_key(op.key()) {
                continue;
            }
            let prior = match self.storage.read_raw(op.key()).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.is_not_found() => None,
                Err(e) => {
                    self.state = TransactionState::RolledBack;
                    return Err(e);
                }
            };
            snapshots.insert(op.key(), prior);
        }

        for (index, op) in self.ops.iter().enumerate() {
            let result = match op {
                StagedOp::Write { key, payload } => {
                    self.storage.write_raw(key, payload).await
                }
                StagedOp::Remove { key } => self.storage.remove(key).await,
            };
            if let Err(cause) = result {
                tracing::warn!(
                    key = %op.key(),
                    error = %cause,
                    "transaction apply failed; restoring prior state"
                );
                Self::restore(self.storage, &self.ops[..index], &snapshots).await;
                self.state = TransactionState::RolledBack;
                return Err(cause);
            }
        }

        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Discards the staged operations without touching durable state.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] if the transaction already
    /// committed or rolled back.
    pub fn rollback(&mut self) -> StorageResult<()> {
        self.ensure_active("rollback")?;
        self.ops.clear();
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    /// Puts back the prior contents of every key the applied prefix
    /// touched. Best-effort: a key that cannot be restored is logged and
    /// skipped so the remaining keys still recover.
    async fn restore(
        storage: &Storage,
        applied: &[StagedOp],
        snapshots: &HashMap<&StorageKey, Option<Vec<u8>>>,
    ) {
        let mut restored: Vec<&StorageKey> = Vec::new();
        for op in applied.iter().rev() {
            let key = op.key();
            if restored.contains(&key) {
                continue;
            }
            restored.push(key);
            let outcome = match snapshots.get(key) {
                Some(Some(bytes)) => storage.write_raw(key, bytes).await,
                Some(None) => storage.remove(key).await,
                None => Ok(()),
            };
            if let Err(e) = outcome {
                tracing::error!(key = %key, error = %e, "failed to restore key during rollback");
            }
        }
    }

    fn ensure_active(&self, operation: &str) -> StorageResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(StorageError::transaction_state(format!(
                "{operation} on a transaction that already committed"
            ))),
            TransactionState::RolledBack => Err(StorageError::transaction_state(format!(
                "{operation} on a transaction that already rolled back"
            ))),
        }
    }
}
