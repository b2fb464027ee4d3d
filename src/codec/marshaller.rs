//! Marshaller Module
//!
//! Byte codec for values that are not sent as raw text.

use crate::error::Result;
use crate::models::Value;

// == Marshaller Trait ==
/// Converts values to and from the bytes stored remotely.
pub trait Marshaller: Send + Sync {
    fn object_to_bytes(&self, value: &Value) -> Result<Vec<u8>>;
    fn object_from_bytes(&self, bytes: &[u8]) -> Result<Value>;
}

// == Json Marshaller ==
/// Encodes values as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl Marshaller for JsonMarshaller {
    fn object_to_bytes(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn object_from_bytes(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
