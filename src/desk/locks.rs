//! In-process serialization of work on a single ticket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One mutex per ticket id, created on demand.
///
/// Operations on the same ticket run one at a time; different tickets do not
/// contend beyond the short map lookup.
#[derive(Debug, Default)]
pub struct TicketLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl TicketLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `ticket_id`.
    pub fn with_lock<T>(&self, ticket_id: i64, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(ticket_id).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map's copy plus ours: nobody else is waiting
        if Arc::strong_count(&lock) == 2 {
            map.remove(&ticket_id);
        }

        result
    }

    /// Number of tickets with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
