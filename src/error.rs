//! Error types for the REST store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for every remote store operation.
///
/// Transport failures and protocol violations are both reported through this type.
/// A missing entry is never an error: `load` returns `Ok(None)` for a 404.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection or I/O failure while talking to the remote server
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a status the operation does not accept
    #[error("HTTP error: {status} {text}")]
    Status { status: u16, text: String },

    /// A required response header was not sent
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// A header was present but could not be parsed
    #[error("Malformed header {name}: {value:?}")]
    MalformedHeader { name: &'static str, value: String },

    /// The key or value cannot be represented on the wire
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The byte codec failed to marshal or unmarshal a value
    #[error("Marshalling error: {0}")]
    Marshal(#[from] serde_json::Error),

    /// The key listing body was not valid newline-delimited text
    #[error("Error loading remote entries: {0}")]
    Listing(String),

    /// A scan task terminated abnormally
    #[error("Scan task failed: {0}")]
    Task(String),

    /// The store has not been started, or has been stopped
    #[error("Store is not started")]
    NotStarted,
}

impl StoreError {
    /// Builds a status error from a response status code.
    pub fn status(status: reqwest::StatusCode) -> Self {
        StoreError::Status {
            status: status.as_u16(),
            text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

// == Config Error Enum ==
/// Configuration validation failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No remote host was configured
    #[error("Host not specified")]
    HostNotSpecified,

    /// A numeric option is out of range
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

// == Cache Error Enum ==
/// Errors raised by the local read-through cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cache is full and eviction failed
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// A store in the persistence chain failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// == Migration Error Enum ==
/// Errors that abort a whole migration run.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The keyset of a source store could not be listed
    #[error("Unable to list keys of the source store: {0}")]
    Listing(#[source] StoreError),

    /// The wait for migration tasks was interrupted
    #[error("Migration aborted while waiting for {pending} pending keys")]
    Aborted { pending: usize },
}

// == Result Type Alias ==
/// Convenience Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
