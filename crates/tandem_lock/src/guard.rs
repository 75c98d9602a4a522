//! Lock guards.
//!
//! Guards release their hold when dropped, so a panic or early return on any
//! exit path cannot leak a hold. Releasing twice is a safe no-op.

use crate::manager::{HolderKind, Table};
use std::sync::Arc;

/// A shared (read) hold on a key.
///
/// Dropping the guard releases the hold. The explicit [`ReadGuard::release`]
/// consumes the guard for call sites that want the release to be visible in
/// the source.
#[derive(Debug)]
pub struct ReadGuard {
    table: Arc<Table>,
    key: String,
    released: bool,
}

impl ReadGuard {
    pub(crate) fn new(table: Arc<Table>, key: String) -> Self {
        Self {
            table,
            key,
            released: false,
        }
    }

    /// Returns the key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the hold now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.table.release(&self.key, HolderKind::Read);
        }
    }
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// An exclusive (write) hold on a key.
///
/// Dropping the guard releases the hold; queued writers are serviced before
/// queued readers.
#[derive(Debug)]
pub struct WriteGuard {
    table: Arc<Table>,
    key: String,
    released: bool,
}

impl WriteGuard {
    pub(crate) fn new(table: Arc<Table>, key: String) -> Self {
        Self {
            table,
            key,
            released: false,
        }
    }

    /// Returns the key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the hold now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.table.release(&self.key, HolderKind::Write);
        }
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
