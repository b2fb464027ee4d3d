//! Key Codec Module
//!
//! Maps cache keys to the strings used as the last URI segment.

use crate::error::{Result, StoreError};
use crate::models::Key;

/// Prefix for keys that are not plain text. A byte-order mark never starts a
/// meaningful text key, so it keeps the text and non-text ranges apart.
///
/// Text keys are never rejected for carrying it: a listing hands back the mapped form
/// of an integer or byte key as text, and that text must reload from the same URI.
pub const NON_TEXT_MARKER: char = '\u{FEFF}';

// == Key Codec Trait ==
/// One-way mapping from a key to a string.
///
/// Implementations must be injective over the keys actually stored and must be
/// stateless, as one instance is shared by every concurrent operation. The result is
/// percent-encoded by the caller.
pub trait KeyCodec: Send + Sync {
    fn string_of(&self, key: &Key) -> Result<String>;
}

// == Primitive Key Codec ==
/// Default codec: text keys pass through, integer and byte keys get a marker prefix.
///
/// Injective as long as no application text key starts with [`NON_TEXT_MARKER`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveKeyCodec;

impl KeyCodec for PrimitiveKeyCodec {
    fn string_of(&self, key: &Key) -> Result<String> {
        match key {
            Key::Text(s) if s.is_empty() => {
                Err(StoreError::Encoding("empty text key".to_string()))
            }
            Key::Text(s) => Ok(s.clone()),
            Key::Int(n) => Ok(format!("{NON_TEXT_MARKER}i{n}")),
            Key::Bytes(b) => Ok(format!("{NON_TEXT_MARKER}b{}", hex::encode(b))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_keys_pass_through() {
        let codec = PrimitiveKeyCodec;
        assert_eq!(codec.string_of(&Key::from("user:42")).unwrap(), "user:42");
        assert_eq!(codec.string_of(&Key::from("a b/c")).unwrap(), "a b/c");
    }

    #[test]
    fn test_non_text_keys_are_prefixed() {
        let codec = PrimitiveKeyCodec;
        assert_eq!(codec.string_of(&Key::Int(42)).unwrap(), "\u{FEFF}i42");
        assert_eq!(codec.string_of(&Key::Bytes(vec![1, 255])).unwrap(), "\u{FEFF}b01ff");
        assert_ne!(
            codec.string_of(&Key::Int(1)).unwrap(),
            codec.string_of(&Key::from("1")).unwrap()
        );
    }

    #[test]
    fn test_empty_text_key_is_rejected() {
        let codec = PrimitiveKeyCodec;
        assert!(matches!(
            codec.string_of(&Key::from("")),
            Err(StoreError::Encoding(_))
        ));
    }

    #[test]
    fn test_listed_form_maps_to_same_segment() {
        let codec = PrimitiveKeyCodec;
        for key in [Key::Int(7), Key::Bytes(vec![0xca, 0xfe])] {
            let mapped = codec.string_of(&key).unwrap();
            let listed = Key::Text(mapped.clone());
            assert_eq!(codec.string_of(&listed).unwrap(), mapped);
        }
    }
}
