//! REST Store Module
//!
//! The persistence client: writes, loads and deletes single entries on the remote
//! REST server, and scans its full keyset.
//!
//! # Wire Contract
//! - `PUT {path}{key}` - Store an entry, TTL headers in seconds
//! - `GET {path}{key}` - Load an entry, `404` when absent
//! - `DELETE {path}{key}` - Remove an entry
//! - `DELETE {path}` - Remove every entry
//! - `GET {path}?global` - Newline-delimited listing of every key

mod scan;
mod transport;

use std::sync::{Arc, RwLock};

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use tracing::{debug, info, info_span, instrument, Span};

use crate::codec::{
    encode_segment, seconds_from_header, seconds_from_millis, EmbeddedMetadataCodec,
    JsonMarshaller, KeyCodec, Marshaller, MetadataCodec, PrimitiveKeyCodec,
};
use crate::config::RestStoreConfig;
use crate::error::{ConfigError, Result, StoreError};
use crate::models::{Entry, Key, Value};

pub use scan::{KeyFilter, ScanOptions, TaskContext, WorkerPool, DEFAULT_BATCH_SIZE};
use transport::Transport;

// == Header Names ==
/// Lifespan header, whole seconds
pub const TIME_TO_LIVE_SECONDS: &str = "timetoliveseconds";
/// Max idle header, whole seconds
pub const MAX_IDLE_TIME_SECONDS: &str = "maxidletimeseconds";

// == Store Context ==
/// What the embedding application hands to a store: the cache it serves and the
/// strategies it encodes with.
#[derive(Clone)]
pub struct StoreContext {
    pub cache_name: String,
    pub key_codec: Arc<dyn KeyCodec>,
    pub metadata_codec: Arc<dyn MetadataCodec>,
    pub marshaller: Arc<dyn Marshaller>,
}

impl StoreContext {
    /// Context with the default codecs.
    pub fn new(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            key_codec: Arc::new(PrimitiveKeyCodec),
            metadata_codec: Arc::new(EmbeddedMetadataCodec),
            marshaller: Arc::new(JsonMarshaller),
        }
    }

    pub fn with_key_codec(mut self, codec: impl KeyCodec + 'static) -> Self {
        self.key_codec = Arc::new(codec);
        self
    }

    pub fn with_metadata_codec(mut self, codec: impl MetadataCodec + 'static) -> Self {
        self.metadata_codec = Arc::new(codec);
        self
    }

    pub fn with_marshaller(mut self, marshaller: impl Marshaller + 'static) -> Self {
        self.marshaller = Arc::new(marshaller);
        self
    }
}

// == Rest Store ==
/// Client for one remote REST cache resource.
///
/// Cloning is cheap and clones share the transport. The transport exists between
/// [`start`](RestStore::start) and [`stop`](RestStore::stop); operations outside that
/// window fail with [`StoreError::NotStarted`].
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<Inner>,
}

struct Inner {
    config: RestStoreConfig,
    /// Base path with the optional cache name segment, always ending in `/`
    path: String,
    context: StoreContext,
    transport: RwLock<Option<Arc<Transport>>>,
    span: Span,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("cache", &self.inner.context.cache_name)
            .field("url", &self.inner.config.base_url())
            .field("path", &self.inner.path)
            .finish()
    }
}

impl RestStore {
    // == Constructor ==
    /// Validates the configuration and prepares a stopped store.
    pub fn new(config: RestStoreConfig, context: StoreContext) -> std::result::Result<Self, ConfigError> {
        let config = config.validate()?;
        let mut path = config.path.clone();
        if config.append_cache_name_to_path {
            path.push_str(&encode_segment(&context.cache_name));
            path.push('/');
        }
        let span = info_span!(
            "rest_store",
            cache = %context.cache_name,
            url = %config.base_url(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                path,
                context,
                transport: RwLock::new(None),
                span,
            }),
        })
    }

    // == Lifecycle ==
    /// Creates the pooled transport. Starting a started store is a no-op.
    pub fn start(&self) -> Result<()> {
        let _enter = self.inner.span.enter();
        let mut guard = self.inner.transport.write().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(Arc::new(Transport::new(&self.inner.config)?));
            info!("REST store started on path {}", self.inner.path);
        }
        Ok(())
    }

    /// Releases the transport. Requests already holding a connection finish; queued
    /// ones fail with [`StoreError::NotStarted`].
    pub fn stop(&self) {
        let _enter = self.inner.span.enter();
        let transport = self
            .inner
            .transport
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(transport) = transport {
            transport.shutdown();
            info!("REST store stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner
            .transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn cache_name(&self) -> &str {
        &self.inner.context.cache_name
    }

    /// Base path of the resource, ending in `/`.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub(crate) fn span(&self) -> &Span {
        &self.inner.span
    }

    fn transport(&self) -> Result<Arc<Transport>> {
        self.inner
            .transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(StoreError::NotStarted)
    }

    // == Key To Uri ==
    /// Path of the resource holding `key`.
    pub fn key_to_uri(&self, key: &Key) -> Result<String> {
        let mapped = self.inner.context.key_codec.string_of(key)?;
        Ok(format!("{}{}", self.inner.path, encode_segment(&mapped)))
    }

    fn marshall(&self, content_type: &str, entry: &Entry) -> Result<Vec<u8>> {
        let value = entry
            .value
            .as_ref()
            .ok_or_else(|| StoreError::Encoding(format!("entry {} has no value", entry.key)))?;
        if is_text(content_type) {
            return match value {
                Value::Bytes(bytes) => Ok(bytes.clone()),
                Value::Object(_) => Err(StoreError::Encoding(format!(
                    "{content_type} entry {} must hold raw bytes",
                    entry.key
                ))),
            };
        }
        self.inner.context.marshaller.object_to_bytes(value)
    }

    fn unmarshall(&self, content_type: &str, bytes: Vec<u8>) -> Result<Value> {
        if is_text(content_type) {
            Ok(Value::Bytes(bytes))
        } else {
            self.inner.context.marshaller.object_from_bytes(&bytes)
        }
    }

    // == Write ==
    /// Stores `entry` remotely, replacing any previous value.
    ///
    /// Expirable entries carry lifespan and max idle in whole seconds.
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %entry.key))]
    pub async fn write(&self, entry: &Entry) -> Result<()> {
        let transport = self.transport()?;
        let uri = self.key_to_uri(&entry.key)?;
        let content_type = self.inner.context.metadata_codec.content_type_of(entry);
        let body = self.marshall(&content_type, entry)?;

        let mut request = transport
            .request(Method::PUT, &uri)
            .header(CONTENT_TYPE, content_type.as_str())
            .body(body);
        if let Some(metadata) = entry.metadata.as_ref().filter(|m| m.is_expirable()) {
            request = request
                .header(
                    TIME_TO_LIVE_SECONDS,
                    seconds_from_millis(metadata.lifespan_ms).to_string(),
                )
                .header(
                    MAX_IDLE_TIME_SECONDS,
                    seconds_from_millis(metadata.max_idle_ms).to_string(),
                );
        }

        let response = transport.execute(request).await?;
        let status = response.discard().await?;
        if !status.is_success() {
            return Err(StoreError::status(status));
        }
        debug!("Stored entry as {}", content_type);
        Ok(())
    }

    // == Load ==
    /// Loads the entry for `key`, or `None` when the server has no such key.
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %key))]
    pub async fn load(&self, key: &Key) -> Result<Option<Entry>> {
        let transport = self.transport()?;
        let uri = self.key_to_uri(key)?;
        let response = transport.execute(transport.request(Method::GET, &uri)).await?;

        match response.status() {
            StatusCode::OK => {
                let content_type = response
                    .header_str("content-type")?
                    .ok_or(StoreError::MissingHeader("content-type"))?
                    .to_string();
                let lifespan = seconds_from_header(
                    TIME_TO_LIVE_SECONDS,
                    response.header_str(TIME_TO_LIVE_SECONDS)?,
                )?;
                let max_idle = seconds_from_header(
                    MAX_IDLE_TIME_SECONDS,
                    response.header_str(MAX_IDLE_TIME_SECONDS)?,
                )?;
                let metadata = self
                    .inner
                    .context
                    .metadata_codec
                    .build_metadata(&content_type, lifespan, max_idle)
                    .touched_at(Utc::now());
                let value = self.unmarshall(&content_type, response.bytes().await?)?;
                Ok(Some(Entry::with_metadata(key.clone(), value, metadata)))
            }
            StatusCode::NOT_FOUND => {
                response.discard().await?;
                Ok(None)
            }
            status => Err(StoreError::status(status)),
        }
    }

    // == Delete ==
    /// Removes `key`; true when the server reported success.
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %key))]
    pub async fn delete(&self, key: &Key) -> Result<bool> {
        let transport = self.transport()?;
        let uri = self.key_to_uri(key)?;
        let response = transport
            .execute(transport.request(Method::DELETE, &uri))
            .await?;
        Ok(response.discard().await?.is_success())
    }

    // == Clear ==
    /// Asks the server to drop every entry of the resource.
    ///
    /// The status is not checked: the server owns bulk purges.
    #[instrument(parent = &self.inner.span, skip_all)]
    pub async fn clear(&self) -> Result<()> {
        let transport = self.transport()?;
        let response = transport
            .execute(transport.request(Method::DELETE, &self.inner.path))
            .await?;
        let status = response.discard().await?;
        debug!("Clear answered {}", status);
        Ok(())
    }

    // == Contains ==
    pub async fn contains(&self, key: &Key) -> Result<bool> {
        Ok(self.load(key).await?.is_some())
    }
}

fn is_text(content_type: &str) -> bool {
    content_type.starts_with("text/")
}
