//! Run-wide deduplication of discovered targets

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Concurrency-safe set of claimed identities
///
/// An identity is claimed exactly once per run; there is no removal. The
/// scheduler claims on acceptance, adapters may only probe with `contains`.
#[derive(Debug, Default)]
pub struct DedupTracker {
    claimed: Mutex<HashSet<String>>,
}

impl DedupTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims an identity
    ///
    /// # Returns
    ///
    /// `true` for the first caller, `false` for everyone after
    pub fn try_claim(&self, identity: &str) -> bool {
        let mut claimed = self.lock();
        if claimed.contains(identity) {
            return false;
        }
        claimed.insert(identity.to_string())
    }

    /// Returns true if the identity has been claimed already
    pub fn contains(&self, identity: &str) -> bool {
        self.lock().contains(identity)
    }

    /// Number of claimed identities
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been claimed yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The set is only ever grown, so a poisoned guard still holds a valid set.
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
