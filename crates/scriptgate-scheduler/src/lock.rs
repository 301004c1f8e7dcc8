//! In-memory advisory locks over named external resources.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

/// Tracks which run holds each named lock.
#[derive(Debug, Default)]
pub struct LockManager {
    holders: HashMap<String, String>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every lock in `locks` for `run_id`, or none of them.
    ///
    /// A lock already held by `run_id` counts as available.
    pub fn try_acquire(&mut self, run_id: &str, locks: &[String]) -> bool {
        let conflict = locks.iter().find(|lock| {
            self.holders.get(lock.as_str()).is_some_and(|holder| holder != run_id)
        });
        if let Some(lock) = conflict {
            debug!(run_id, lock = %lock, "lock unavailable");
            return false;
        }

        for lock in locks {
            self.holders.insert(lock.clone(), run_id.to_string());
        }
        true
    }

    /// Free every lock held by `run_id`. Releasing twice is a no-op.
    pub fn release(&mut self, run_id: &str) {
        self.holders.retain(|_, holder| holder != run_id);
    }

    pub fn holder(&self, lock: &str) -> Option<&str> {
        self.holders.get(lock).map(String::as_str)
    }

    /// Lock name → holding run id, sorted by lock name.
    pub fn held(&self) -> BTreeMap<String, String> {
        self.holders.iter().map(|(lock, run)| (lock.clone(), run.clone())).collect()
    }
}
