//! Cache Statistics Module
//!
//! Hits, misses, evictions and store traffic of the local cache.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from memory
    pub hits: u64,
    /// Reads that found nothing in memory
    pub misses: u64,
    /// Entries dropped by the LRU policy
    pub evictions: u64,
    /// Misses answered by a store in the persistence chain
    pub store_loads: u64,
    /// Current number of entries in memory
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_store_load(&mut self) {
        self.store_loads += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_store_load();
        stats.record_store_load();
        stats.set_total_entries(7);
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();

        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.store_loads, 2);
        assert_eq!(stats.total_entries, 7);
        assert_eq!((stats.hits, stats.misses), (1, 2));
    }
}
