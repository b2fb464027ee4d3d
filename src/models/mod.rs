//! Data model shared by the store, the scanner and the local cache.

pub mod entry;
pub mod metadata;

// Re-export commonly used types
pub use entry::{Entry, Key, Value};
pub use metadata::Metadata;
