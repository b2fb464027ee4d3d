//! Metadata Codec Module
//!
//! Derives the content type of an entry and converts expiration bounds to and from
//! the whole-second values carried in HTTP headers.

use crate::error::{Result, StoreError};
use crate::models::{Entry, Metadata};

/// Content type used when nothing more specific is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/binary";

// == Metadata Codec Trait ==
/// Strategy for content types and metadata reconstruction.
pub trait MetadataCodec: Send + Sync {
    /// Content type to send when writing `entry`.
    fn content_type_of(&self, entry: &Entry) -> String;

    /// Builds metadata from the values read back from the server.
    ///
    /// Bounds are in seconds, `-1` meaning unbounded.
    fn build_metadata(
        &self,
        content_type: &str,
        lifespan_secs: i64,
        max_idle_secs: i64,
    ) -> Metadata;
}

// == Embedded Metadata Codec ==
/// Sends every entry as `application/binary` and keeps only expiration bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedMetadataCodec;

impl MetadataCodec for EmbeddedMetadataCodec {
    fn content_type_of(&self, _entry: &Entry) -> String {
        DEFAULT_CONTENT_TYPE.to_string()
    }

    fn build_metadata(&self, _content_type: &str, lifespan_secs: i64, max_idle_secs: i64) -> Metadata {
        Metadata {
            lifespan_ms: millis_from_seconds(lifespan_secs),
            max_idle_ms: millis_from_seconds(max_idle_secs),
            ..Metadata::immortal()
        }
    }
}

// == Mime Metadata Codec ==
/// Uses the MIME type recorded in the entry metadata and keeps it on load.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeMetadataCodec;

impl MetadataCodec for MimeMetadataCodec {
    fn content_type_of(&self, entry: &Entry) -> String {
        entry
            .metadata
            .as_ref()
            .and_then(|m| m.content_type.clone())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
    }

    fn build_metadata(&self, content_type: &str, lifespan_secs: i64, max_idle_secs: i64) -> Metadata {
        Metadata {
            content_type: Some(content_type.to_string()),
            lifespan_ms: millis_from_seconds(lifespan_secs),
            max_idle_ms: millis_from_seconds(max_idle_secs),
            ..Metadata::immortal()
        }
    }
}

// == Conversions ==
/// Converts a bound in milliseconds to whole seconds for the wire.
///
/// Negative means unbounded. Anything below one second rounds up to 1, since 0 would
/// tell the server the entry is already expired.
pub fn seconds_from_millis(ms: i64) -> i64 {
    match ms {
        ms if ms < 0 => -1,
        ms if ms < 1000 => 1,
        ms => ms / 1000,
    }
}

/// Reads a seconds header value; absent means unbounded.
pub fn seconds_from_header(name: &'static str, value: Option<&str>) -> Result<i64> {
    match value {
        None => Ok(-1),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| StoreError::MalformedHeader {
                name,
                value: raw.to_string(),
            }),
    }
}

fn millis_from_seconds(secs: i64) -> i64 {
    if secs < 0 {
        -1
    } else {
        secs.saturating_mul(1000)
    }
}
