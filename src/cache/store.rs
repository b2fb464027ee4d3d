//! Cache Store Module
//!
//! In-memory map of the local cache with LRU eviction and expiration.

use std::collections::HashMap;

use chrono::Utc;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::error::CacheError;
use crate::models::{Key, Metadata, Value};

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<Key, CacheEntry>,
    lru: LruTracker,
    stats: CacheStats,
    max_entries: usize,
    /// Largest accepted value in bytes, unbounded when `None`
    max_value_size: Option<usize>,
}

impl CacheStore {
    /// Creates a store holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            max_value_size: None,
        }
    }

    /// Rejects values larger than `max_value_size` bytes.
    pub fn with_max_value_size(mut self, max_value_size: usize) -> Self {
        self.max_value_size = Some(max_value_size);
        self
    }

    // == Set ==
    /// Stores a value, evicting the least recently used entry when full.
    pub fn set(&mut self, key: Key, value: Value, metadata: Metadata) -> Result<(), CacheError> {
        if let Some(limit) = self.max_value_size {
            if value.size_hint() > limit {
                return Err(CacheError::InvalidRequest(format!(
                    "Value exceeds maximum size of {} bytes",
                    limit
                )));
            }
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                    self.stats.record_eviction();
                }
                None => {
                    return Err(CacheError::CacheFull(
                        "Cache is full and eviction failed".to_string(),
                    ))
                }
            }
        }

        self.lru.touch(&key);
        self.entries
            .insert(key, CacheEntry::new(value, metadata, Utc::now()));
        self.stats.set_total_entries(self.entries.len());
        Ok(())
    }

    // == Get ==
    /// Returns the value when present and not expired. Expired entries are dropped
    /// and count as misses.
    pub fn get(&mut self, key: &Key) -> Option<Value> {
        let now = Utc::now();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
            self.stats.record_miss();
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        let value = entry.value.clone();
        self.lru.touch(key);
        self.stats.record_hit();
        Some(value)
    }

    pub fn delete(&mut self, key: &Key) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    pub fn record_store_load(&mut self) {
        self.stats.record_store_load();
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
