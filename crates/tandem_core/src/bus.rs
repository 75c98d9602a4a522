//! Process-wide event bus.
//!
//! Session, message, and part mutations are published here and consumed by
//! presentation layers and by the share-sync wiring. Events are emitted
//! after the mutation is durable.

use crate::session::{Message, Part, Session};
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// A change event published by the session layer.
#[derive(Debug, Clone)]
pub enum Event {
    /// A session was created or modified.
    SessionUpdated {
        /// The session's new state.
        info: Session,
    },
    /// A session (and its subtree) was removed.
    SessionDeleted {
        /// The removed session's last state.
        info: Session,
    },
    /// A background operation on a session failed.
    SessionError {
        /// The session involved, when known.
        session_id: Option<String>,
        /// Human-readable description of the failure.
        message: String,
    },
    /// A message was created or modified.
    MessageUpdated {
        /// The message's new state.
        info: Message,
    },
    /// A message (and its parts) was removed.
    MessageRemoved {
        /// The owning session.
        session_id: String,
        /// The removed message.
        message_id: String,
    },
    /// A part was created or modified.
    PartUpdated {
        /// The part's new state.
        info: Part,
    },
}

/// Publish/subscribe fan-out with unbounded per-subscriber channels.
///
/// Publishing never blocks; a subscriber that went away is dropped from the
/// list on the next publish.
#[derive(Debug, Default)]
pub struct Bus {
    subscribers: RwLock<Vec<mpsc::UnboundedSender<Event>>>,
}

impl Bus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future events.
    ///
    /// The receiver should be drained regularly; the channel is unbounded.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Publishes an event to every live subscriber.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
