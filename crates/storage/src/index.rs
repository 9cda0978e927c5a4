//! Secondary indices for efficient query patterns
//!
//! A `SecondaryIndex<K, P>` maps an index key (often a composite tuple) to the
//! set of primary keys of the rows carrying it. This turns prefix lookups such
//! as "all events of one stream" from O(table) into O(matching rows).

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;

/// Secondary index: index key → set of primary keys
#[derive(Debug, Clone)]
pub struct SecondaryIndex<K, P> {
    index: BTreeMap<K, BTreeSet<P>>,
}

impl<K: Ord + Clone, P: Ord + Clone> SecondaryIndex<K, P> {
    /// Create a new empty index
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
        }
    }

    /// Add a primary key under `key`
    pub fn insert(&mut self, key: K, primary: P) {
        self.index.entry(key).or_default().insert(primary);
    }

    /// Remove a primary key from `key`
    ///
    /// If the set becomes empty the index key is dropped entirely
    /// to avoid accumulating empty sets.
    pub fn remove(&mut self, key: &K, primary: &P) {
        if let Some(set) = self.index.get_mut(key) {
            set.remove(primary);
            if set.is_empty() {
                self.index.remove(key);
            }
        }
    }

    /// Primary keys filed under `key`
    pub fn get(&self, key: &K) -> impl Iterator<Item = &P> + '_ {
        self.index.get(key).into_iter().flatten()
    }

    /// True if `primary` is filed under `key`
    pub fn contains(&self, key: &K, primary: &P) -> bool {
        self.index
            .get(key)
            .map(|set| set.contains(primary))
            .unwrap_or(false)
    }

    /// Index keys within `range`
    pub fn keys_in<R: RangeBounds<K>>(&self, range: R) -> impl Iterator<Item = &K> + '_ {
        self.index.range(range).map(|(k, _)| k)
    }

    /// All index keys
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.index.keys()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of distinct index keys
    pub fn len(&self) -> usize {
        self.index.len()
    }
}

impl<K: Ord + Clone, P: Ord + Clone> Default for SecondaryIndex<K, P> {
    fn default() -> Self {
        Self::new()
    }
}
