//! Monotonically-ordered identifier generation.
//!
//! Ids are prefixed, lexicographically sortable strings: a newer id always
//! sorts after an older one, which is what lets the session tree rely on
//! `parent_id` pointing at an earlier id (no cycle can be constructed) and
//! lets listings order by recency without a secondary index.
//!
//! Layout: `<prefix>_<millis:012x><counter:06x><random:4>`. The counter is
//! process-wide and strictly increasing within one millisecond; the random
//! tail keeps ids from different processes from colliding.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kinds of generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// A session id (`ses_`).
    Session,
    /// A message id (`msg_`).
    Message,
    /// A part id (`prt_`).
    Part,
}

impl IdKind {
    /// Returns the id prefix for this kind.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            IdKind::Session => "ses",
            IdKind::Message => "msg",
            IdKind::Part => "prt",
        }
    }
}

struct Clock {
    last_millis: u64,
    counter: u64,
}

static CLOCK: Mutex<Clock> = Mutex::new(Clock {
    last_millis: 0,
    counter: 0,
});

/// Generates a new ascending identifier of the given kind.
///
/// Two ids generated in order always compare in that order, even within
/// the same millisecond and across wall-clock regressions.
#[must_use]
pub fn ascending_id(kind: IdKind) -> String {
    let now = now_millis();
    let (millis, counter) = {
        let mut clock = CLOCK.lock();
        if now > clock.last_millis {
            clock.last_millis = now;
            clock.counter = 0;
        } else {
            // Same millisecond, or the wall clock went backwards: keep the
            // last timestamp and disambiguate with the counter.
            clock.counter += 1;
        }
        (clock.last_millis, clock.counter)
    };
    let tail = &uuid::Uuid::new_v4().simple().to_string()[..4];
    format!("{}_{millis:012x}{counter:06x}{tail}", kind.prefix())
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        assert!(ascending_id(IdKind::Session).starts_with("ses_"));
        assert!(ascending_id(IdKind::Message).starts_with("msg_"));
        assert!(ascending_id(IdKind::Part).starts_with("prt_"));
    }

    #[test]
    fn ids_ascend_lexicographically() {
        let mut previous = ascending_id(IdKind::Session);
        for _ in 0..1000 {
            let next = ascending_id(IdKind::Session);
            assert!(next > previous, "{next} should sort after {previous}");
            previous = next;
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(ascending_id(IdKind::Part)));
        }
    }

    #[test]
    fn ids_are_valid_key_segments() {
        let id = ascending_id(IdKind::Session);
        assert!(tandem_storage::StorageKey::new(["session", &id]).is_ok());
    }
}
