//! In-memory event log: records which transactions have already been
//! processed, keyed by transaction identity, for at-most-once processing.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::models::EventLogKey;

/// A set of already-processed transaction keys.
#[derive(Debug, Default)]
pub struct EventLog {
    seen: RefCell<HashSet<EventLogKey>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: EventLogKey) -> bool {
        self.seen.borrow().contains(&key)
    }

    /// Records `key` as processed. Returns `false` if it was already present.
    pub fn record(&self, key: EventLogKey) -> bool {
        self.seen.borrow_mut().insert(key)
    }

    pub fn snapshot(&self) -> HashSet<EventLogKey> {
        self.seen.borrow().clone()
    }

    pub fn restore(&self, keys: HashSet<EventLogKey>) {
        *self.seen.borrow_mut() = keys;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_at_most_once() {
        let log = EventLog::new();
        assert!(log.record(EventLogKey(1)));
        assert!(!log.record(EventLogKey(1)));
        assert!(log.contains(EventLogKey(1)));
        assert!(!log.contains(EventLogKey(2)));
    }
}
