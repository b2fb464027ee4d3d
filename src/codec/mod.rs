//! Codec Module
//!
//! Strategies that turn keys, values and metadata into what travels over HTTP.

mod key;
mod marshaller;
mod metadata;


use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

// Re-export public types
pub use key::{KeyCodec, PrimitiveKeyCodec, NON_TEXT_MARKER};
pub use marshaller::{JsonMarshaller, Marshaller};
pub use metadata::{
    seconds_from_header, seconds_from_millis, EmbeddedMetadataCodec, MetadataCodec,
    MimeMetadataCodec, DEFAULT_CONTENT_TYPE,
};

// == Public Constants ==
/// Characters escaped in a path segment: everything except RFC 3986 unreserved.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes `s` so it fits in a single URI path segment.
pub fn encode_segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}
