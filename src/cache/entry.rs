//! Cache Entry Module
//!
//! An in-memory value with its expiration metadata.

use chrono::{DateTime, Utc};

use crate::models::{Metadata, Value};

// == Cache Entry ==
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub metadata: Metadata,
}

impl CacheEntry {
    /// Creates an entry, stamping expirable metadata with `now` unless it already
    /// carries a creation time (as loaded entries do).
    pub fn new(value: Value, metadata: Metadata, now: DateTime<Utc>) -> Self {
        let metadata = if metadata.created.is_some() {
            metadata
        } else {
            metadata.touched_at(now)
        };
        Self { value, metadata }
    }

    /// Expired when `now` is at or past the earliest bound.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.metadata.is_expired(now)
    }

    /// Records a read, which pushes back max-idle expiration.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if self.metadata.last_used.is_some() {
            self.metadata.last_used = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_without_bounds() {
        let now = Utc::now();
        let entry = CacheEntry::new(Value::text("v"), Metadata::immortal(), now);
        assert!(!entry.is_expired(now + Duration::days(1)));
    }

    #[test]
    fn test_entry_lifespan() {
        let now = Utc::now();
        let entry = CacheEntry::new(Value::text("v"), Metadata::with_lifespan_ms(10_000), now);
        assert!(!entry.is_expired(now + Duration::milliseconds(9_999)));
        assert!(entry.is_expired(now + Duration::milliseconds(10_000)));
        assert!(entry.is_expired(now + Duration::seconds(20)));
    }

    #[test]
    fn test_touch_extends_idle_bound() {
        let now = Utc::now();
        let mut entry = CacheEntry::new(Value::text("v"), Metadata::with_max_idle_ms(1_000), now);
        let later = now + Duration::milliseconds(800);
        entry.touch(later);
        assert!(!entry.is_expired(now + Duration::milliseconds(1_500)));
        assert!(entry.is_expired(later + Duration::milliseconds(1_000)));
    }

    #[test]
    fn test_loaded_stamp_is_kept() {
        let loaded_at = Utc::now() - Duration::seconds(5);
        let metadata = Metadata::with_lifespan_ms(1_000).touched_at(loaded_at);
        let entry = CacheEntry::new(Value::text("v"), metadata, Utc::now());
        assert!(entry.is_expired(Utc::now()));
    }
}
