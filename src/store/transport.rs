//! Pooled HTTP Transport
//!
//! Wraps a `reqwest` client configured from [`ConnectionPoolConfig`] and bounds the
//! number of requests in flight. Callers beyond the bound wait for a permit instead
//! of failing. A permit lives as long as its [`PooledResponse`], so it is returned on
//! every exit path, including errors in the middle of reading a body.
//!
//! Key listings draw from a budget of their own. A listing stays open while the
//! loads it feeds run, so sharing one budget would let concurrent scans starve each
//! other's loads forever.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::{ConnectionPoolConfig, RestStoreConfig};
use crate::error::{Result, StoreError};

// == Transport ==
#[derive(Debug)]
pub(crate) struct Transport {
    client: Client,
    base_url: String,
    permits: Arc<Semaphore>,
    listings: Arc<Semaphore>,
}

impl Transport {
    /// Builds the client for a validated configuration.
    pub(crate) fn new(config: &RestStoreConfig) -> Result<Self> {
        let pool = &config.connection_pool;
        let client = build_client(pool)?;
        debug!(
            "HTTP transport ready for {} with {} concurrent connections",
            config.base_url(),
            pool.max_in_flight()
        );

        Ok(Self {
            client,
            base_url: config.base_url(),
            permits: Arc::new(Semaphore::new(pool.max_in_flight())),
            listings: Arc::new(Semaphore::new(pool.max_in_flight())),
        })
    }

    /// Starts a request for an absolute path (path and query, no host).
    pub(crate) fn request(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path_and_query))
    }

    // == Execute ==
    /// Waits for a connection permit and sends the request.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<PooledResponse> {
        send(&self.permits, request).await
    }

    /// Opens a `text/plain` listing on the listing budget.
    pub(crate) async fn listing(&self, path_and_query: &str) -> Result<PooledResponse> {
        let request = self
            .request(Method::GET, path_and_query)
            .header(ACCEPT, "text/plain");
        send(&self.listings, request).await
    }

    /// Wakes every queued caller with [`StoreError::NotStarted`] and refuses new work.
    pub(crate) fn shutdown(&self) {
        self.permits.close();
        self.listings.close();
    }
}

async fn send(permits: &Arc<Semaphore>, request: RequestBuilder) -> Result<PooledResponse> {
    let permit = Arc::clone(permits)
        .acquire_owned()
        .await
        .map_err(|_| StoreError::NotStarted)?;
    let response = request.send().await?;
    Ok(PooledResponse {
        response,
        _permit: permit,
    })
}

fn build_client(pool: &ConnectionPoolConfig) -> Result<Client> {
    if pool.receive_buffer_size > 0 || pool.send_buffer_size > 0 {
        debug!(
            "Socket buffer sizes (recv={}, send={}) are left to the operating system",
            pool.receive_buffer_size, pool.send_buffer_size
        );
    }

    let client = Client::builder()
        .connect_timeout(pool.connection_timeout())
        .read_timeout(pool.socket_timeout())
        .pool_max_idle_per_host(pool.max_connections_per_host)
        .tcp_nodelay(pool.tcp_no_delay)
        .build()?;
    Ok(client)
}

// == Pooled Response ==
/// A response that holds its connection permit until dropped.
#[derive(Debug)]
pub(crate) struct PooledResponse {
    response: Response,
    _permit: OwnedSemaphorePermit,
}

impl PooledResponse {
    pub(crate) fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub(crate) fn headers(&self) -> &HeaderMap<HeaderValue> {
        self.response.headers()
    }

    /// Returns a header as text; non-visible-ASCII values count as malformed.
    pub(crate) fn header_str(&self, name: &'static str) -> Result<Option<&str>> {
        match self.headers().get(HeaderName::from_static(name)) {
            None => Ok(None),
            Some(value) => value
                .to_str()
                .map(Some)
                .map_err(|_| StoreError::MalformedHeader {
                    name,
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                }),
        }
    }

    /// Reads the whole body.
    pub(crate) async fn bytes(self) -> Result<Vec<u8>> {
        Ok(self.response.bytes().await?.to_vec())
    }

    /// Reads the next body chunk, `None` at the end.
    pub(crate) async fn chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.response.chunk().await?.map(|b| b.to_vec()))
    }

    /// Drains the body so the connection can go back to the idle pool.
    pub(crate) async fn discard(mut self) -> Result<StatusCode> {
        let status = self.status();
        while self.response.chunk().await?.is_some() {}
        Ok(status)
    }
}
