//! Batch Scanner
//!
//! Walks the remote keyset. The listing body is read chunk by chunk and cut into
//! batches; each batch runs as one task on a caller-supplied [`WorkerPool`]. The scan
//! returns once every dispatched batch has finished.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn, Instrument};

use super::transport::PooledResponse;
use super::RestStore;
use crate::error::{Result, StoreError};
use crate::models::{Entry, Key};

/// Keys per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Predicate deciding whether a listed key is processed.
pub type KeyFilter = Arc<dyn Fn(&Key) -> bool + Send + Sync>;

// == Task Context ==
/// Stop signal shared by every batch of one scan.
///
/// Once stopped it stays stopped. Batches check it before each key; a load already
/// in flight completes first.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    stopped: Arc<AtomicBool>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

// == Worker Pool ==
/// Bounds how many tasks run at once. Clones share the same bound.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// A pool running at most `size` tasks, at least one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// A pool sized to the available processing units.
    pub fn with_available_parallelism() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Waits for a free slot. The slot frees up when the permit is dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Task("worker pool closed".to_string()))
    }
}

// == Scan Options ==
/// What a scan fetches for each key.
#[derive(Clone)]
pub struct ScanOptions {
    pub batch_size: usize,
    pub load_value: bool,
    pub load_metadata: bool,
    pub filter: Option<KeyFilter>,
}

impl ScanOptions {
    /// Hands key-only placeholder entries to the callback.
    pub fn keys_only() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            load_value: false,
            load_metadata: false,
            filter: None,
        }
    }

    /// Loads every entry in full before handing it to the callback.
    pub fn entries() -> Self {
        Self {
            load_value: true,
            load_metadata: true,
            ..Self::keys_only()
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn filter(mut self, filter: impl Fn(&Key) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    fn needs_load(&self) -> bool {
        self.load_value || self.load_metadata
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::keys_only()
    }
}

impl std::fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("batch_size", &self.batch_size)
            .field("load_value", &self.load_value)
            .field("load_metadata", &self.load_metadata)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

// == Key Lines ==
/// Incremental reader of a newline-delimited listing body.
struct KeyLines {
    response: PooledResponse,
    buffer: Vec<u8>,
    eof: bool,
}

impl KeyLines {
    fn new(response: PooledResponse) -> Self {
        Self {
            response,
            buffer: Vec::new(),
            eof: false,
        }
    }

    /// Next non-empty line, `None` once the body is exhausted.
    async fn next_key(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                match decode_line(&line[..pos])? {
                    Some(key) => return Ok(Some(key)),
                    None => continue,
                }
            }
            if self.eof {
                let rest = std::mem::take(&mut self.buffer);
                return decode_line(&rest);
            }
            match self.response.chunk().await? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => self.eof = true,
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<String>> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return Ok(None);
    }
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|e| StoreError::Listing(format!("key is not valid UTF-8: {e}")))
}

impl RestStore {
    async fn open_listing(&self, global: bool) -> Result<KeyLines> {
        let transport = self.transport()?;
        let target = if global {
            format!("{}?global", self.path())
        } else {
            self.path().to_string()
        };
        let response = transport.listing(&target).await?;
        if !response.status().is_success() {
            return Err(StoreError::status(response.status()));
        }
        Ok(KeyLines::new(response))
    }

    // == Process ==
    /// Scans every remote key, calling `task` once per processed key.
    ///
    /// A key that is listed but answers 404 by the time it is loaded is skipped
    /// without reaching `task`: the callback only ever sees entries that exist.
    ///
    /// See [`process_with_context`](RestStore::process_with_context).
    pub async fn process<F>(&self, pool: &WorkerPool, options: ScanOptions, task: F) -> Result<()>
    where
        F: Fn(Result<Entry>, &TaskContext) + Send + Sync + 'static,
    {
        self.process_with_context(pool, options, TaskContext::new(), task)
            .await
    }

    /// Scans every remote key under an externally owned stop signal.
    ///
    /// Listed keys are grouped into batches of `options.batch_size` and each batch
    /// runs on `pool`. Per key, the batch checks `context`, applies the filter, then
    /// hands either a key-only entry or the loaded entry to `task`. Load failures are
    /// handed to `task` as errors; keys that vanished before their load are skipped.
    /// Stopping while the listing is still streaming ends the scan without an error.
    ///
    /// The listing stays open for the whole scan on the transport's listing budget;
    /// the loads it feeds use the regular request budget, so any number of concurrent
    /// scans make progress.
    #[instrument(parent = self.span(), skip_all, fields(batch_size = options.batch_size))]
    pub async fn process_with_context<F>(
        &self,
        pool: &WorkerPool,
        options: ScanOptions,
        context: TaskContext,
        task: F,
    ) -> Result<()>
    where
        F: Fn(Result<Entry>, &TaskContext) + Send + Sync + 'static,
    {
        let mut lines = self.open_listing(true).await?;
        let task = Arc::new(task);
        let options = Arc::new(options);
        let mut batches = JoinSet::new();
        let mut batch = HashSet::with_capacity(options.batch_size);
        let mut listed = 0usize;

        let listing = loop {
            if context.is_stopped() {
                debug!("Stop requested after listing {} keys", listed);
                break Ok(());
            }
            match lines.next_key().await {
                Ok(Some(key)) => {
                    listed += 1;
                    batch.insert(key);
                    if batch.len() >= options.batch_size {
                        let full = std::mem::replace(
                            &mut batch,
                            HashSet::with_capacity(options.batch_size),
                        );
                        if let Err(e) = self
                            .dispatch(&mut batches, pool, full, &options, &context, &task)
                            .await
                        {
                            break Err(e);
                        }
                    }
                }
                Ok(None) => {
                    if !batch.is_empty() {
                        let last = std::mem::take(&mut batch);
                        if let Err(e) = self
                            .dispatch(&mut batches, pool, last, &options, &context, &task)
                            .await
                        {
                            break Err(e);
                        }
                    }
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        drop(lines);

        if listing.is_err() {
            context.stop();
        }
        let drained = drain(&mut batches).await;
        debug!("Scan finished after listing {} keys", listed);
        listing.and(drained)
    }

    async fn dispatch<F>(
        &self,
        batches: &mut JoinSet<()>,
        pool: &WorkerPool,
        batch: HashSet<String>,
        options: &Arc<ScanOptions>,
        context: &TaskContext,
        task: &Arc<F>,
    ) -> Result<()>
    where
        F: Fn(Result<Entry>, &TaskContext) + Send + Sync + 'static,
    {
        let permit = pool.acquire().await?;
        let store = self.clone();
        let options = Arc::clone(options);
        let context = context.clone();
        let task = Arc::clone(task);
        debug!("Dispatching batch of {} keys", batch.len());

        batches.spawn(
            async move {
                let _permit = permit;
                store.run_batch(batch, &options, &context, task.as_ref()).await;
            }
            .instrument(tracing::Span::current()),
        );
        Ok(())
    }

    async fn run_batch<F>(
        &self,
        batch: HashSet<String>,
        options: &ScanOptions,
        context: &TaskContext,
        task: &F,
    ) where
        F: Fn(Result<Entry>, &TaskContext),
    {
        for raw in batch {
            if context.is_stopped() {
                break;
            }
            let key = Key::Text(raw);
            if let Some(filter) = &options.filter {
                if !filter(&key) {
                    continue;
                }
            }
            if !options.needs_load() {
                task(Ok(Entry::key_only(key)), context);
                continue;
            }
            match self.load(&key).await {
                Ok(Some(entry)) => task(Ok(entry), context),
                Ok(None) => debug!("Key {} was listed but is gone", key),
                Err(e) => task(Err(e), context),
            }
        }
    }

    // == Size ==
    /// Number of keys in the full listing.
    ///
    /// Blank lines are not keys and are not counted.
    #[instrument(parent = self.span(), skip_all)]
    pub async fn size(&self) -> Result<usize> {
        let mut lines = self.open_listing(true).await?;
        let mut count = 0;
        while lines.next_key().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    // == Load All Keys ==
    /// Every key of the plain listing, minus `exclude`.
    #[instrument(parent = self.span(), skip_all, fields(excluded = exclude.len()))]
    pub async fn load_all_keys(&self, exclude: &HashSet<Key>) -> Result<HashSet<Key>> {
        let mut lines = self.open_listing(false).await?;
        let mut keys = HashSet::new();
        while let Some(raw) = lines.next_key().await? {
            let key = Key::Text(raw);
            if !exclude.contains(&key) {
                keys.insert(key);
            }
        }
        Ok(keys)
    }

    // == Load Entries ==
    /// Loads up to `limit` full entries from the listing, one after another.
    #[instrument(parent = self.span(), skip_all, fields(limit = ?limit))]
    pub async fn load_entries(&self, limit: Option<usize>) -> Result<Vec<Entry>> {
        let mut lines = self.open_listing(true).await?;
        let mut entries = Vec::new();
        while limit.map_or(true, |limit| entries.len() < limit) {
            let Some(raw) = lines.next_key().await? else {
                break;
            };
            if let Some(entry) = self.load(&Key::Text(raw)).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

/// Waits for every batch; a panicked batch is reported once all have finished.
async fn drain(batches: &mut JoinSet<()>) -> Result<()> {
    let mut failure = None;
    while let Some(joined) = batches.join_next().await {
        if let Err(e) = joined {
            warn!("Scan batch failed: {}", e);
            failure.get_or_insert(StoreError::Task(e.to_string()));
        }
    }
    failure.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_context_is_shared_and_monotonic() {
        let context = TaskContext::new();
        let clone = context.clone();
        assert!(!clone.is_stopped());
        context.stop();
        assert!(clone.is_stopped());
        context.stop();
        assert!(clone.is_stopped());
    }

    #[test]
    fn test_worker_pool_minimum_size() {
        assert_eq!(WorkerPool::new(0).size(), 1);
        assert_eq!(WorkerPool::new(8).size(), 8);
        assert!(WorkerPool::with_available_parallelism().size() >= 1);
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_permits() {
        let pool = WorkerPool::new(2);
        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.permits.available_permits(), 0);
        drop(a);
        assert_eq!(pool.permits.available_permits(), 1);
    }

    #[test]
    fn test_scan_options() {
        let options = ScanOptions::keys_only();
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!options.needs_load());

        let options = ScanOptions::entries().batch_size(0).filter(|k| *k != Key::from("x"));
        assert!(options.needs_load());
        assert_eq!(options.batch_size, 1);
        let filter = options.filter.unwrap();
        assert!(filter(&Key::from("y")));
        assert!(!filter(&Key::from("x")));
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"key").unwrap(), Some("key".to_string()));
        assert_eq!(decode_line(b"key\r").unwrap(), Some("key".to_string()));
        assert_eq!(decode_line(b"").unwrap(), None);
        assert!(matches!(decode_line(&[0xff, 0xfe]), Err(StoreError::Listing(_))));
    }
}
