//! Advisory key locks
//!
//! Locks are held in memory beside the store, not inside it: acquiring or
//! releasing one takes effect immediately and is unaffected by the commit or
//! abort of whatever transaction is running. They are non-reentrant. Locking a
//! key that is already held fails, even for the holder.

use std::hash::Hash;

use dashmap::DashSet;
use tracing::debug;

/// Set of held advisory locks keyed by `K`
#[derive(Debug)]
pub struct LockTable<K: Eq + Hash> {
    held: DashSet<K>,
}

impl<K: Eq + Hash> Default for LockTable<K> {
    fn default() -> Self {
        Self {
            held: DashSet::new(),
        }
    }
}

impl<K> LockTable<K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    /// Empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in `keys`, or none of them
    ///
    /// On conflict every key acquired by this call is released again and the
    /// first already-held key is returned. Duplicate keys in `keys` count once.
    pub fn lock(&self, keys: &[K]) -> Result<(), K> {
        let mut acquired: Vec<&K> = Vec::with_capacity(keys.len());
        for key in keys {
            if acquired.contains(&key) {
                continue;
            }
            if self.held.insert(key.clone()) {
                acquired.push(key);
            } else {
                for taken in acquired {
                    self.held.remove(taken);
                }
                debug!(target: "bitempo::lock", key = %key, "lock conflict");
                return Err(key.clone());
            }
        }
        debug!(target: "bitempo::lock", count = acquired.len(), "locks acquired");
        Ok(())
    }

    /// Release every key in `keys`; releasing an unheld key does nothing
    pub fn unlock(&self, keys: &[K]) {
        for key in keys {
            if self.held.remove(key).is_some() {
                debug!(target: "bitempo::lock", key = %key, "lock released");
            }
        }
    }

    /// True if `key` is currently held
    pub fn is_locked(&self, key: &K) -> bool {
        self.held.contains(key)
    }

    /// Number of held locks
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// True if no lock is held
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}
