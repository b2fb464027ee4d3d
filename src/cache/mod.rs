//! Cache Module
//!
//! A local in-memory cache whose persistence chain is a list of REST stores. Reads
//! that miss memory go down the chain; writes go through to every store. This is
//! the cache a [`Migrator`](crate::Migrator) rehydrates.

mod entry;
mod lru;
mod stats;
mod store;

use std::sync::RwLock as SyncRwLock;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::CacheError;
use crate::models::{Entry, Key, Value};
use crate::store::RestStore;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Target Cache Trait ==
/// A live cache that can be rehydrated from REST stores.
#[async_trait]
pub trait TargetCache: Send + Sync {
    /// Name of the cache.
    fn name(&self) -> &str;

    /// Reads `key`, loading it from the persistence chain on a miss.
    async fn read_through(&self, key: &Key) -> Result<Option<Value>, CacheError>;

    /// The REST stores currently in the persistence chain.
    fn rest_stores(&self) -> Vec<RestStore>;

    /// Removes every REST store from the persistence chain and returns them.
    fn disable_rest_stores(&self) -> Vec<RestStore>;
}

// == Local Cache ==
#[derive(Debug)]
pub struct LocalCache {
    name: String,
    memory: RwLock<CacheStore>,
    stores: SyncRwLock<Vec<RestStore>>,
}

impl LocalCache {
    /// Creates an empty cache holding at most `max_entries` entries in memory.
    ///
    /// Values of any size are accepted.
    pub fn new(name: impl Into<String>, max_entries: usize) -> Self {
        Self::with_store(name, CacheStore::new(max_entries))
    }

    /// Creates an empty cache over a configured in-memory store.
    pub fn with_store(name: impl Into<String>, memory: CacheStore) -> Self {
        Self {
            name: name.into(),
            memory: RwLock::new(memory),
            stores: SyncRwLock::new(Vec::new()),
        }
    }

    /// Appends a store to the persistence chain.
    pub fn add_store(&self, store: RestStore) {
        self.stores
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(store);
    }

    fn chain(&self) -> Vec<RestStore> {
        self.stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // == Get ==
    /// Returns the value for `key` from memory, or from the first store that has it.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn get(&self, key: &Key) -> Result<Option<Value>, CacheError> {
        if let Some(value) = self.memory.write().await.get(key) {
            return Ok(Some(value));
        }

        for store in self.chain() {
            if let Some(entry) = store.load(key).await? {
                let Entry { key, value, metadata } = entry;
                let Some(value) = value else { continue };
                debug!("Loaded {} from {:?}", key, store);
                let mut memory = self.memory.write().await;
                memory.record_store_load();
                memory.set(key, value.clone(), metadata.unwrap_or_default())?;
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    // == Put ==
    /// Writes `entry` to every store in the chain, then keeps it in memory.
    #[instrument(skip_all, fields(cache = %self.name, key = %entry.key))]
    pub async fn put(&self, entry: Entry) -> Result<(), CacheError> {
        for store in self.chain() {
            store.write(&entry).await?;
        }
        let Entry { key, value, metadata } = entry;
        match value {
            Some(value) => self
                .memory
                .write()
                .await
                .set(key, value, metadata.unwrap_or_default()),
            None => Err(CacheError::InvalidRequest(format!("entry {key} has no value"))),
        }
    }

    // == Remove ==
    /// Removes `key` from memory and from every store; true if anything held it.
    #[instrument(skip(self), fields(cache = %self.name))]
    pub async fn remove(&self, key: &Key) -> Result<bool, CacheError> {
        let mut removed = self.memory.write().await.delete(key);
        for store in self.chain() {
            removed |= store.delete(key).await?;
        }
        Ok(removed)
    }

    /// Empties memory and every store.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.memory.write().await.clear();
        for store in self.chain() {
            store.clear().await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        self.memory.read().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.memory.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memory.read().await.is_empty()
    }
}

#[async_trait]
impl TargetCache for LocalCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_through(&self, key: &Key) -> Result<Option<Value>, CacheError> {
        self.get(key).await
    }

    fn rest_stores(&self) -> Vec<RestStore> {
        self.chain()
    }

    fn disable_rest_stores(&self) -> Vec<RestStore> {
        let removed = std::mem::take(&mut *self.stores.write().unwrap_or_else(|e| e.into_inner()));
        info!(
            "Removed {} REST stores from the chain of cache {}",
            removed.len(),
            self.name
        );
        removed
    }
}
