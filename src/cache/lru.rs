//! LRU Tracker Module
//!
//! Access order of the keys held in the local cache.

use lru::LruCache;

use crate::models::Key;

// == LRU Tracker ==
/// Tracks access order for eviction. Every operation is O(1).
#[derive(Debug)]
pub struct LruTracker {
    order: LruCache<Key, ()>,
}

impl Default for LruTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LruTracker {
    pub fn new() -> Self {
        Self {
            order: LruCache::unbounded(),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &Key) {
        if self.order.get(key).is_none() {
            self.order.put(key.clone(), ());
        }
    }

    pub fn remove(&mut self, key: &Key) {
        self.order.pop(key);
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<Key> {
        self.order.pop_lru().map(|(key, _)| key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
