//! Migration Module
//!
//! Rehydrates a live cache from the REST stores in its persistence chain. Every key
//! of every store is read through the cache, which pulls it out of the store and
//! keeps it locally; the stores can then be disconnected.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Instrument, Span};

use crate::cache::TargetCache;
use crate::error::MigrationError;
use crate::models::Key;
use crate::store::WorkerPool;

/// Progress is logged every this many migrated keys.
const PROGRESS_INTERVAL: u64 = 100;

// == Migrator ==
#[derive(Debug, Clone)]
pub struct Migrator {
    exclude: HashSet<Key>,
    pool: WorkerPool,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Migrator {
    /// A migrator running one task per available processing unit.
    pub fn new() -> Self {
        Self {
            exclude: HashSet::new(),
            pool: WorkerPool::with_available_parallelism(),
        }
    }

    /// Keys that are never migrated.
    pub fn exclude(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.exclude.extend(keys);
        self
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    // == Synchronize ==
    /// Reads every remote key through `cache` and returns how many were migrated.
    ///
    /// See [`synchronize_until`](Migrator::synchronize_until).
    pub async fn synchronize<C>(&self, cache: Arc<C>) -> Result<u64, MigrationError>
    where
        C: TargetCache + 'static,
    {
        self.synchronize_until(cache, std::future::pending()).await
    }

    /// Reads every remote key through `cache` until done or `interrupt` resolves.
    ///
    /// The keys of each REST store are listed first; a listing failure ends the run.
    /// Each key then becomes one task on the pool. A key that fails to migrate is
    /// logged and skipped. `interrupt` is only watched while waiting for the tasks;
    /// when it fires the remaining tasks are aborted.
    ///
    /// # Arguments
    /// * `cache` - The cache to rehydrate
    /// * `interrupt` - Resolves when the wait must be abandoned
    #[instrument(skip_all, fields(cache = cache.name()))]
    pub async fn synchronize_until<C, I>(
        &self,
        cache: Arc<C>,
        interrupt: I,
    ) -> Result<u64, MigrationError>
    where
        C: TargetCache + 'static,
        I: Future<Output = ()>,
    {
        let migrated = Arc::new(AtomicU64::new(0));
        let mut tasks = JoinSet::new();

        for store in cache.rest_stores() {
            let keys = store
                .load_all_keys(&self.exclude)
                .await
                .map_err(MigrationError::Listing)?;
            info!("Migrating {} keys from {:?}", keys.len(), store);

            for key in keys {
                let cache = Arc::clone(&cache);
                let migrated = Arc::clone(&migrated);
                let pool = self.pool.clone();
                tasks.spawn(
                    async move {
                        let _permit = match pool.acquire().await {
                            Ok(permit) => permit,
                            Err(e) => {
                                error!("Unable to schedule migration of key {}: {}", key, e);
                                return;
                            }
                        };
                        match cache.read_through(&key).await {
                            Ok(_) => {
                                let count = migrated.fetch_add(1, Ordering::Relaxed) + 1;
                                if count % PROGRESS_INTERVAL == 0 {
                                    debug!("Migrated {} keys", count);
                                }
                            }
                            Err(e) => warn!("Failed to migrate key {}: {}", key, e),
                        }
                    }
                    .instrument(Span::current()),
                );
            }
        }

        tokio::pin!(interrupt);
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => error!("Migration task failed: {}", e),
                    None => break,
                },
                () = &mut interrupt => {
                    let pending = tasks.len();
                    tasks.abort_all();
                    warn!("Migration interrupted with {} keys pending", pending);
                    return Err(MigrationError::Aborted { pending });
                }
            }
        }

        let total = migrated.load(Ordering::Relaxed);
        info!("Migrated {} keys", total);
        Ok(total)
    }

    // == Disconnect Source ==
    /// Removes the REST stores from the cache's chain and stops them.
    ///
    /// Returns how many stores were disconnected.
    pub fn disconnect_source<C>(&self, cache: &C) -> usize
    where
        C: TargetCache + ?Sized,
    {
        let stores = cache.disable_rest_stores();
        for store in &stores {
            store.stop();
        }
        stores.len()
    }
}
