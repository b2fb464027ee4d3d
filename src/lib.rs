//! REST Store - A REST-backed persistence layer for in-memory caches
//!
//! Writes, loads and deletes cache entries on a remote REST server, scans the remote
//! keyset in parallel batches, and migrates a whole remote cache into a local one.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod migrate;
pub mod models;
pub mod store;

pub use cache::{LocalCache, TargetCache};
pub use config::{ConnectionPoolConfig, RestStoreConfig};
pub use error::{CacheError, ConfigError, MigrationError, StoreError};
pub use migrate::Migrator;
pub use models::{Entry, Key, Metadata, Value};
pub use store::{RestStore, ScanOptions, StoreContext, TaskContext, WorkerPool};
