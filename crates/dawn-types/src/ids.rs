//! Type-safe identifier wrappers for core entities.
//!
//! Event and rebloom identifiers wrap [`Uuid`] v7 (time-ordered) so that
//! log files sort chronologically. Memory identifiers are different: a
//! [`MemoryId`] is a pure function of the chunk's content and timestamp,
//! so the same memory always produces the same identifier -- the stable
//! `chunk_<unix_ts>_<hash8>` form that the persistence format records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an entry in the event log.
    EventId
}

define_id! {
    /// Unique identifier for a rebloom event raised by the post-tick triggers.
    RebloomId
}

/// Stable identifier of a memory chunk.
///
/// Derived deterministically from the chunk's content and creation
/// timestamp: equal inputs always produce equal identifiers, which is what
/// makes the save/load round trip exact. The rendered form is
/// `chunk_<unix_ts>_<hash8>` where `hash8` is the leading 8 hex digits of a
/// UUID v5 digest over `content:timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Derive the identifier from chunk content and creation time.
    pub fn derive(content: &str, timestamp: DateTime<Utc>) -> Self {
        let seed = format!("{content}:{}", timestamp.to_rfc3339());
        let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
            .simple()
            .to_string();
        let short = digest.get(..8).unwrap_or(digest.as_str());
        Self(format!("chunk_{}_{short}", timestamp.timestamp()))
    }

    /// Wrap an identifier string loaded from persistence as-is.
    pub const fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    /// View the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn event_ids_are_distinct() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn memory_id_is_deterministic() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single();
        assert!(ts.is_some());
        let ts = ts.unwrap_or_default();
        let a = MemoryId::derive("entropy spike observed", ts);
        let b = MemoryId::derive("entropy spike observed", ts);
        assert_eq!(a, b);
    }

    #[test]
    fn memory_id_differs_by_content() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap_or_default();
        let a = MemoryId::derive("first memory", ts);
        let b = MemoryId::derive("second memory", ts);
        assert_ne!(a, b);
    }

    #[test]
    fn memory_id_has_chunk_prefix() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap_or_default();
        let id = MemoryId::derive("prefixed", ts);
        assert!(id.as_str().starts_with("chunk_"));
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = RebloomId::new();
        let json = serde_json::to_string(&original).ok();
        assert!(json.is_some());
        let restored: Result<RebloomId, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert!(restored.is_ok());
    }
}
