//! The lock table and acquisition paths.

use crate::error::{LockError, LockResult};
use crate::guard::{ReadGuard, WriteGuard};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Which class of hold a caller is asking for or releasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HolderKind {
    /// Shared hold.
    Read,
    /// Exclusive hold.
    Write,
}

/// A queued acquisition waiting to be serviced.
#[derive(Debug)]
struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

/// Per-key holder state plus FIFO waiter queues split by class.
///
/// Invariant: a key with no holder has no waiters. Grants are direct
/// handoffs (holder state is transferred before the waiter is woken), so
/// a released key either passes straight to the next holder or becomes
/// idle and is pruned.
#[derive(Debug)]
struct KeyState {
    writer_held: bool,
    reader_count: usize,
    acquired_at: Instant,
    waiting_readers: VecDeque<Waiter>,
    waiting_writers: VecDeque<Waiter>,
}

impl KeyState {
    fn new() -> Self {
        Self {
            writer_held: false,
            reader_count: 0,
            acquired_at: Instant::now(),
            waiting_readers: VecDeque::new(),
            waiting_writers: VecDeque::new(),
        }
    }

    fn is_idle(&self) -> bool {
        !self.writer_held
            && self.reader_count == 0
            && self.waiting_readers.is_empty()
            && self.waiting_writers.is_empty()
    }
}

/// A point-in-time snapshot of one key's lock state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDiagnostics {
    /// Whether a writer currently holds the key.
    pub writer_held: bool,
    /// Number of readers currently holding the key.
    pub reader_count: usize,
    /// Number of queued read acquisitions.
    pub waiting_readers: usize,
    /// Number of queued write acquisitions.
    pub waiting_writers: usize,
    /// How long the current holder(s) have held the key, in milliseconds.
    pub held_for_ms: u64,
}

/// The shared lock table. Guards hold an `Arc` to it so release works on
/// every exit path without borrowing the manager.
#[derive(Debug)]
pub(crate) struct Table {
    map: Mutex<HashMap<String, KeyState>>,
    next_waiter: AtomicU64,
}

impl Table {
    fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            next_waiter: AtomicU64::new(1),
        }
    }

    /// Releases one hold of the given class. Absent keys and over-releases
    /// are tolerated so guard drop is always safe.
    pub(crate) fn release(&self, key: &str, kind: HolderKind) {
        let mut map = self.map.lock();
        Self::release_locked(&mut map, key, kind);
    }

    fn release_locked(map: &mut HashMap<String, KeyState>, key: &str, kind: HolderKind) {
        let Some(state) = map.get_mut(key) else {
            return;
        };
        match kind {
            HolderKind::Write => {
                if !state.writer_held {
                    return;
                }
                state.writer_held = false;
            }
            HolderKind::Read => {
                if state.reader_count == 0 {
                    return;
                }
                state.reader_count -= 1;
                if state.reader_count > 0 {
                    return;
                }
            }
        }
        Self::service_queues(state);
        if state.is_idle() {
            map.remove(key);
        }
    }

    /// Hands the freed key to the next holder(s): queued writers first, and
    /// only if none remain, every queued reader at once.
    ///
    /// A send can fail when the waiting future was dropped (caller went
    /// away); such waiters are skipped.
    fn service_queues(state: &mut KeyState) {
        while let Some(waiter) = state.waiting_writers.pop_front() {
            if waiter.tx.send(()).is_ok() {
                state.writer_held = true;
                state.acquired_at = Instant::now();
                return;
            }
        }
        let mut granted = 0;
        while let Some(waiter) = state.waiting_readers.pop_front() {
            if waiter.tx.send(()).is_ok() {
                granted += 1;
            }
        }
        if granted > 0 {
            state.reader_count = granted;
            state.acquired_at = Instant::now();
        }
    }

    /// Removes a timed-out waiter.
    ///
    /// If the grant raced the deadline (the waiter is no longer queued and
    /// the channel carries the grant), the hold is released in place, so the
    /// caller observes a clean timeout either way and nothing leaks.
    fn cancel_waiter(
        &self,
        key: &str,
        id: u64,
        kind: HolderKind,
        rx: &mut oneshot::Receiver<()>,
    ) {
        let mut map = self.map.lock();
        if let Some(state) = map.get_mut(key) {
            let queue = match kind {
                HolderKind::Read => &mut state.waiting_readers,
                HolderKind::Write => &mut state.waiting_writers,
            };
            if let Some(pos) = queue.iter().position(|w| w.id == id) {
                queue.remove(pos);
                if state.is_idle() {
                    map.remove(key);
                }
                return;
            }
        }
        if rx.try_recv().is_ok() {
            tracing::trace!(key, "grant raced timeout; releasing the stale hold");
            Self::release_locked(&mut map, key, kind);
        }
    }
}

/// Per-key reader-writer lock manager.
///
/// An explicit service object: construct one per process (or per test) and
/// share it via `Arc` or clone. There is no global state.
///
/// # Fairness
///
/// Waiters queue FIFO within their class. On release, queued writers are
/// serviced before any queued reader, and an arriving reader queues behind
/// waiting writers instead of joining the current read generation. This is
/// the policy that keeps writers live under read-heavy contention.
#[derive(Debug, Clone)]
pub struct LockManager {
    table: Arc<Table>,
}

impl LockManager {
    /// Creates an empty lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(Table::new()),
        }
    }

    /// Acquires a shared hold on `key`, waiting as long as it takes.
    pub async fn read(&self, key: impl Into<String>) -> ReadGuard {
        let key = key.into();
        self.acquire_wait(&key, HolderKind::Read).await;
        ReadGuard::new(Arc::clone(&self.table), key)
    }

    /// Acquires an exclusive hold on `key`, waiting as long as it takes.
    pub async fn write(&self, key: impl Into<String>) -> WriteGuard {
        let key = key.into();
        self.acquire_wait(&key, HolderKind::Write).await;
        WriteGuard::new(Arc::clone(&self.table), key)
    }

    /// Acquires a shared hold on `key`, failing with
    /// [`LockError::Timeout`] if not serviced within `timeout`.
    pub async fn read_timeout(
        &self,
        key: impl Into<String>,
        timeout: Duration,
    ) -> LockResult<ReadGuard> {
        let key = key.into();
        self.acquire_deadline(&key, HolderKind::Read, timeout).await?;
        Ok(ReadGuard::new(Arc::clone(&self.table), key))
    }

    /// Acquires an exclusive hold on `key`, failing with
    /// [`LockError::Timeout`] if not serviced within `timeout`.
    pub async fn write_timeout(
        &self,
        key: impl Into<String>,
        timeout: Duration,
    ) -> LockResult<WriteGuard> {
        let key = key.into();
        self.acquire_deadline(&key, HolderKind::Write, timeout).await?;
        Ok(WriteGuard::new(Arc::clone(&self.table), key))
    }

    /// Snapshots the lock table.
    ///
    /// Keys with no holder and no waiter never appear: they are pruned at
    /// release time, which bounds the table under acquire/release churn.
    #[must_use]
    pub fn diagnostics(&self) -> HashMap<String, KeyDiagnostics> {
        let map = self.table.map.lock();
        map.iter()
            .map(|(key, state)| {
                (
                    key.clone(),
                    KeyDiagnostics {
                        writer_held: state.writer_held,
                        reader_count: state.reader_count,
                        waiting_readers: state.waiting_readers.len(),
                        waiting_writers: state.waiting_writers.len(),
                        held_for_ms: state.acquired_at.elapsed().as_millis() as u64,
                    },
                )
            })
            .collect()
    }

    /// Tries the fast path; otherwise enqueues and returns the waiter.
    fn try_acquire(&self, key: &str, kind: HolderKind) -> Option<(u64, oneshot::Receiver<()>)> {
        let mut map = self.table.map.lock();
        let state = map
            .entry(key.to_string())
            .or_insert_with(KeyState::new);
        match kind {
            HolderKind::Read => {
                // Readers join only while no writer holds the key and none
                // is waiting to be serviced.
                if !state.writer_held && state.waiting_writers.is_empty() {
                    if state.reader_count == 0 {
                        state.acquired_at = Instant::now();
                    }
                    state.reader_count += 1;
                    return None;
                }
            }
            HolderKind::Write => {
                if !state.writer_held && state.reader_count == 0 {
                    state.writer_held = true;
                    state.acquired_at = Instant::now();
                    return None;
                }
            }
        }
        let (tx, rx) = oneshot::channel();
        let id = self.table.next_waiter.fetch_add(1, Ordering::Relaxed);
        let waiter = Waiter { id, tx };
        match kind {
            HolderKind::Read => state.waiting_readers.push_back(waiter),
            HolderKind::Write => state.waiting_writers.push_back(waiter),
        }
        Some((id, rx))
    }

    async fn acquire_wait(&self, key: &str, kind: HolderKind) {
        loop {
            let Some((_id, mut rx)) = self.try_acquire(key, kind) else {
                return;
            };
            if (&mut rx).await.is_ok() {
                return;
            }
            // The sender vanished without a grant; re-enter the acquire
            // path from scratch.
        }
    }

    async fn acquire_deadline(
        &self,
        key: &str,
        kind: HolderKind,
        timeout: Duration,
    ) -> LockResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let Some((id, mut rx)) = self.try_acquire(key, kind) else {
                return Ok(());
            };
            match tokio::time::timeout_at(deadline, &mut rx).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(_)) => continue,
                Err(_) => {
                    self.table.cancel_waiter(key, id, kind, &mut rx);
                    return Err(LockError::timeout(key, timeout.as_millis() as u64));
                }
            }
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
