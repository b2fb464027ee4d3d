//! In-process REST cache server for integration tests
//!
//! Implements the remote side of the store's wire contract on an ephemeral port:
//! `PUT|GET|DELETE /:key`, `DELETE /` and the `GET /` listings. Keys added to
//! `failing` answer `500` to every per-key request, `ghosts` are listed without
//! being stored, and [`ListingMode`] shapes how the listing body is sent.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use tower_http::trace::TraceLayer;

use rest_store::{ConnectionPoolConfig, RestStore, RestStoreConfig, StoreContext};

const TTL: HeaderName = HeaderName::from_static("timetoliveseconds");
const IDLE: HeaderName = HeaderName::from_static("maxidletimeseconds");

// == Stored Value ==
/// One entry as the server keeps it: the raw body plus the headers it came with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredValue {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub ttl: Option<String>,
    pub idle: Option<String>,
}

impl StoredValue {
    pub fn text(body: &str) -> Self {
        Self {
            body: body.as_bytes().to_vec(),
            content_type: Some("text/plain".to_string()),
            ..Self::default()
        }
    }
}

// == Listing Mode ==
/// How the listing body goes out.
#[derive(Debug, Clone, Copy, Default)]
pub enum ListingMode {
    /// One newline-separated body
    #[default]
    Normal,
    /// CRLF line ends with blank lines in between
    Padded,
    /// The listing is refused with this status
    Status(StatusCode),
    /// The connection breaks after this many lines
    Truncated(usize),
    /// One line per chunk, each after this delay
    Slow(Duration),
}

// == Server State ==
#[derive(Clone, Default)]
pub struct ServerState {
    pub entries: Arc<Mutex<BTreeMap<String, StoredValue>>>,
    pub failing: Arc<Mutex<HashSet<String>>>,
    pub ghosts: Arc<Mutex<Vec<String>>>,
    pub listing_mode: Arc<Mutex<ListingMode>>,
    /// Raw query of every listing request, in arrival order
    pub listings: Arc<Mutex<Vec<Option<String>>>>,
}

impl ServerState {
    pub fn insert(&self, key: &str, value: StoredValue) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn ghost(&self, key: &str) {
        self.ghosts.lock().unwrap().push(key.to_string());
    }

    pub fn set_listing_mode(&self, mode: ListingMode) {
        *self.listing_mode.lock().unwrap() = mode;
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn is_failing(&self, key: &str) -> bool {
        self.failing.lock().unwrap().contains(key)
    }
}

// == Test Server ==
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: ServerState,
}

impl TestServer {
    /// Binds an ephemeral port and serves until the test runtime shuts down.
    pub async fn spawn() -> Self {
        let state = ServerState::default();
        let app = create_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn config(&self) -> RestStoreConfig {
        let mut config = RestStoreConfig::new(self.addr.ip().to_string());
        config.port = self.addr.port();
        config
    }

    /// A started store allowing `max_in_flight` concurrent requests.
    pub fn store_with_connections(&self, cache_name: &str, max_in_flight: usize) -> RestStore {
        let mut config = self.config();
        config.connection_pool = ConnectionPoolConfig {
            max_connections_per_host: max_in_flight,
            max_total_connections: max_in_flight,
            ..ConnectionPoolConfig::default()
        };
        let store = RestStore::new(config, StoreContext::new(cache_name)).unwrap();
        store.start().unwrap();
        store
    }

    pub fn store(&self, cache_name: &str) -> RestStore {
        self.store_with_connections(cache_name, 4)
    }
}

fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(list_handler).delete(clear_handler))
        .route(
            "/:key",
            get(get_handler).put(put_handler).delete(delete_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// == Handlers ==

async fn put_handler(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if state.is_failing(&key) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let header = |name: &HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let value = StoredValue {
        body: body.to_vec(),
        content_type: header(&header::CONTENT_TYPE),
        ttl: header(&TTL),
        idle: header(&IDLE),
    };
    state.insert(&key, value);
    StatusCode::NO_CONTENT
}

async fn get_handler(State(state): State<ServerState>, Path(key): Path<String>) -> Response {
    if state.is_failing(&key) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let Some(value) = state.get(&key) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut headers = HeaderMap::new();
    let mut set = |name: HeaderName, v: Option<String>| {
        if let Some(v) = v {
            headers.insert(name, HeaderValue::from_str(&v).unwrap());
        }
    };
    set(header::CONTENT_TYPE, value.content_type);
    set(TTL, value.ttl);
    set(IDLE, value.idle);
    (StatusCode::OK, headers, value.body).into_response()
}

async fn delete_handler(State(state): State<ServerState>, Path(key): Path<String>) -> StatusCode {
    if state.is_failing(&key) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    match state.entries.lock().unwrap().remove(&key) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn clear_handler(State(state): State<ServerState>) -> StatusCode {
    state.entries.lock().unwrap().clear();
    StatusCode::NO_CONTENT
}

async fn list_handler(State(state): State<ServerState>, RawQuery(query): RawQuery) -> Response {
    state.listings.lock().unwrap().push(query);
    let mut lines: Vec<String> = state.entries.lock().unwrap().keys().cloned().collect();
    lines.extend(state.ghosts.lock().unwrap().iter().cloned());
    let mode = *state.listing_mode.lock().unwrap();

    let body = match mode {
        ListingMode::Normal => Body::from(lines.join("\n")),
        ListingMode::Padded => Body::from(format!("\n{}\r\n\n", lines.join("\r\n\n"))),
        ListingMode::Status(status) => return status.into_response(),
        ListingMode::Truncated(after) => {
            let mut chunks: Vec<io::Result<String>> = lines
                .into_iter()
                .take(after)
                .map(|line| Ok(format!("{line}\n")))
                .collect();
            chunks.push(Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "listing cut short",
            )));
            Body::from_stream(futures::stream::iter(chunks))
        }
        ListingMode::Slow(delay) => {
            Body::from_stream(futures::stream::iter(lines).then(move |line| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, io::Error>(format!("{line}\n"))
            }))
        }
    };
    ([(header::CONTENT_TYPE, "text/plain")], body).into_response()
}
