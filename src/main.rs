//! REST Store - command line client
//!
//! Inspects and maintains one remote REST cache resource.
//!
//! # Usage
//! ```text
//! rest_store size            number of remote keys
//! rest_store keys            print every remote key
//! rest_store get <key>       print one value
//! rest_store delete <key>    remove one key
//! rest_store clear           remove every key
//! rest_store migrate         dry run: read every key through a throwaway local
//!                             cache, report the count and cache statistics
//! ```
//!
//! `migrate` checks that the whole remote keyset can be loaded. The local cache it
//! fills lives only as long as the process.
//!
//! The remote endpoint comes from `REST_STORE_*` environment variables, the cache name
//! from `REST_STORE_CACHE`.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rest_store::{
    Key, LocalCache, Migrator, RestStore, RestStoreConfig, ScanOptions, StoreContext, Value,
    WorkerPool,
};

const DEFAULT_CACHE_NAME: &str = "default";
const LOCAL_CACHE_CAPACITY: usize = 100_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rest_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "size".to_string());
    let argument = args.next();

    let config = RestStoreConfig::from_env();
    let cache_name =
        std::env::var("REST_STORE_CACHE").unwrap_or_else(|_| DEFAULT_CACHE_NAME.to_string());
    info!(
        "Configuration loaded: url={}, path={}, cache={}",
        config.base_url(),
        config.path,
        cache_name
    );

    let store = RestStore::new(config, StoreContext::new(cache_name))
        .context("invalid REST store configuration")?;
    store.start()?;
    let outcome = run(&store, &command, argument).await;
    store.stop();
    outcome
}

async fn run(store: &RestStore, command: &str, argument: Option<String>) -> anyhow::Result<()> {
    match command {
        "size" => println!("{}", store.size().await?),
        "keys" => {
            store
                .process(&WorkerPool::new(1), ScanOptions::keys_only(), |entry, _| {
                    match entry {
                        Ok(entry) => println!("{}", entry.key),
                        Err(e) => warn!("Skipping key: {}", e),
                    }
                })
                .await?;
        }
        "get" => {
            let key = required_key(argument)?;
            match store.load(&key).await? {
                Some(entry) => match entry.value {
                    Some(Value::Bytes(bytes)) => println!("{}", String::from_utf8_lossy(&bytes)),
                    Some(Value::Object(object)) => println!("{object}"),
                    None => println!(),
                },
                None => bail!("key {key} not found"),
            }
        }
        "delete" => {
            let key = required_key(argument)?;
            if !store.delete(&key).await? {
                bail!("key {key} was not deleted");
            }
        }
        "clear" => store.clear().await?,
        "migrate" => {
            let cache = Arc::new(LocalCache::new(store.cache_name(), LOCAL_CACHE_CAPACITY));
            cache.add_store(store.clone());
            let migrator = Migrator::new();
            let migrated = migrator
                .synchronize_until(Arc::clone(&cache), interrupt_signal())
                .await?;
            migrator.disconnect_source(cache.as_ref());
            let stats = cache.stats().await;
            info!(
                "Migration dry run: loads={}, evictions={}, resident={}",
                stats.store_loads, stats.evictions, stats.total_entries
            );
            println!("{migrated}");
        }
        other => bail!("unknown command {other:?}, expected size, keys, get, delete, clear or migrate"),
    }
    Ok(())
}

fn required_key(argument: Option<String>) -> anyhow::Result<Key> {
    argument
        .map(Key::Text)
        .context("this command needs a key argument")
}

/// Resolves on Ctrl+C. Never resolves when the handler cannot be installed.
async fn interrupt_signal() {
    if signal::ctrl_c().await.is_err() {
        warn!("Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, aborting migration...");
}
