//! Entry Metadata Module
//!
//! Lifespan, max idle time and content type attached to an entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// == Metadata ==
/// Expiration and content metadata of an entry.
///
/// Bounds are kept in milliseconds; `-1` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// MIME type recorded for the entry, if any
    pub content_type: Option<String>,
    /// Lifespan in milliseconds, -1 = never expires
    pub lifespan_ms: i64,
    /// Max idle time in milliseconds, -1 = never idles out
    pub max_idle_ms: i64,
    /// When the entry was created, set for expirable entries
    pub created: Option<DateTime<Utc>>,
    /// When the entry was last read, set for expirable entries
    pub last_used: Option<DateTime<Utc>>,
}

impl Metadata {
    // == Constructors ==
    /// Metadata with no bounds.
    pub fn immortal() -> Self {
        Self {
            content_type: None,
            lifespan_ms: -1,
            max_idle_ms: -1,
            created: None,
            last_used: None,
        }
    }

    pub fn with_lifespan_ms(lifespan_ms: i64) -> Self {
        Self {
            lifespan_ms,
            ..Self::immortal()
        }
    }

    pub fn with_max_idle_ms(max_idle_ms: i64) -> Self {
        Self {
            max_idle_ms,
            ..Self::immortal()
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Stamps creation and last-use time when the metadata is expirable.
    pub fn touched_at(mut self, now: DateTime<Utc>) -> Self {
        if self.is_expirable() {
            self.created = Some(now);
            self.last_used = Some(now);
        }
        self
    }

    // == Expiration ==
    /// True when either bound is set.
    pub fn is_expirable(&self) -> bool {
        self.lifespan_ms >= 0 || self.max_idle_ms >= 0
    }

    /// The instant the entry expires, taking both bounds into account.
    ///
    /// Returns `None` for entries that never expire or have not been stamped.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let by_lifespan = match (self.lifespan_ms, self.created) {
            (ms, Some(created)) if ms >= 0 => created.checked_add_signed(Duration::milliseconds(ms)),
            _ => None,
        };
        let by_idle = match (self.max_idle_ms, self.last_used) {
            (ms, Some(last_used)) if ms >= 0 => {
                last_used.checked_add_signed(Duration::milliseconds(ms))
            }
            _ => None,
        };
        match (by_lifespan, by_idle) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Expired once `now` reaches the expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::immortal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immortal_never_expires() {
        let metadata = Metadata::immortal().touched_at(Utc::now());
        assert!(!metadata.is_expirable());
        assert!(metadata.created.is_none());
        assert!(metadata.expires_at().is_none());
        assert!(!metadata.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_lifespan_expiration() {
        let now = Utc::now();
        let metadata = Metadata::with_lifespan_ms(1000).touched_at(now);
        assert!(!metadata.is_expired(now));
        assert!(!metadata.is_expired(now + Duration::milliseconds(999)));
        assert!(metadata.is_expired(now + Duration::milliseconds(1000)));
    }

    #[test]
    fn test_earliest_bound_wins() {
        let now = Utc::now();
        let metadata = Metadata {
            lifespan_ms: 10_000,
            max_idle_ms: 2_000,
            ..Metadata::immortal()
        }
        .touched_at(now);
        assert_eq!(metadata.expires_at(), Some(now + Duration::milliseconds(2_000)));
    }

    #[test]
    fn test_unstamped_metadata_does_not_expire() {
        let metadata = Metadata::with_max_idle_ms(0);
        assert!(metadata.is_expirable());
        assert!(!metadata.is_expired(Utc::now()));
    }
}
