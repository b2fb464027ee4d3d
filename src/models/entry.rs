//! Entry Model
//!
//! Keys, values, and the entries the store writes and loads.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Metadata;

// == Key ==
/// A cache key.
///
/// Keys read back from a remote listing are always [`Key::Text`]: the listing carries
/// the encoded strings, and they are used as keys without any inverse mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Text(String),
    Int(i64),
    Bytes(Vec<u8>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => f.write_str(s),
            Key::Int(n) => write!(f, "{n}"),
            Key::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<Vec<u8>> for Key {
    fn from(b: Vec<u8>) -> Self {
        Key::Bytes(b)
    }
}

// == Value ==
/// A cached value: either raw bytes or a structured object for the marshaller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bytes(Vec<u8>),
    Object(serde_json::Value),
}

impl Value {
    /// Builds a raw value from UTF-8 text.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Bytes(s.into().into_bytes())
    }

    /// Returns the raw bytes, if this is a byte value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Object(_) => None,
        }
    }

    /// Approximate in-memory size, used for local cache limits.
    pub fn size_hint(&self) -> usize {
        match self {
            Value::Bytes(b) => b.len(),
            Value::Object(o) => o.to_string().len(),
        }
    }
}

// == Entry ==
/// A key with its value and metadata.
///
/// Key-only scans produce placeholder entries where both `value` and `metadata` are
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Key,
    pub value: Option<Value>,
    pub metadata: Option<Metadata>,
}

impl Entry {
    /// Creates an entry that never expires.
    pub fn new(key: impl Into<Key>, value: Value) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            metadata: None,
        }
    }

    /// Creates an entry carrying the given metadata.
    pub fn with_metadata(key: impl Into<Key>, value: Value, metadata: Metadata) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            metadata: Some(metadata),
        }
    }

    /// Creates a key-only placeholder.
    pub fn key_only(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            value: None,
            metadata: None,
        }
    }

    /// True when either lifespan or max idle is bounded.
    pub fn is_expirable(&self) -> bool {
        self.metadata.as_ref().is_some_and(Metadata::is_expirable)
    }
}
