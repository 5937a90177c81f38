//! Typed event records (JSON Lines event format v1).
//!
//! On the wire every event is one line with `type`, `tick`, `timestamp`,
//! and a type-specific `payload` object. Consumers are expected to be
//! schema-tolerant, so adding payload fields is a compatible change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dawn_types::{EventId, MemoryId, Mood, RebloomId, RebloomMethod, Zone};

/// One event in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier (time-ordered).
    pub event_id: EventId,
    /// Tick during which the event was produced.
    pub tick: u64,
    /// Wall-clock emission time.
    pub timestamp: DateTime<Utc>,
    /// The typed payload.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventRecord {
    /// Build a record stamped now.
    pub fn new(tick: u64, payload: EventPayload) -> Self {
        Self {
            event_id: EventId::new(),
            tick,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Snapshot fields carried by a STATE event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    /// Global entropy.
    pub entropy: f64,
    /// Coherence scalar.
    pub scup: f64,
    /// Heat in degrees.
    pub heat: f64,
    /// Mood at emission time.
    pub mood: Mood,
    /// Zone at emission time.
    pub zone: Zone,
    /// Free-form note (e.g. the shutdown reason on the final event).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// What a SIGIL event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigilAction {
    /// The sigil entered the active set.
    Activated,
    /// The sigil's TTL expired (or it was pruned).
    Decayed,
    /// A registration attempt was suppressed.
    Suppressed,
}

/// The tagged union of event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    /// Periodic system-state snapshot.
    State(StatePayload),
    /// A post-tick reflection string.
    Reflection {
        /// The reflection text.
        text: String,
    },
    /// A rebloom raised by the post-tick evaluator.
    Rebloom {
        /// Unique rebloom identifier.
        id: RebloomId,
        /// Which rule produced it.
        method: RebloomMethod,
        /// The memory chunk it grew from, when one existed.
        source_id: Option<MemoryId>,
        /// Rebloom intensity in `[0, 1]`.
        intensity: f64,
        /// Human-readable rule explanation.
        reason: String,
    },
    /// A memory chunk was stored.
    Memory {
        /// Identifier of the stored chunk.
        memory_id: MemoryId,
        /// Short content preview.
        preview: String,
    },
    /// Sigil lifecycle change.
    Sigil {
        /// The sigil name.
        name: String,
        /// What happened to it.
        action: SigilAction,
        /// What drove the change (rule tag, `"cascade"`, `"decay"`, ...).
        source: String,
    },
}

impl EventPayload {
    /// The wire tag of this payload (`"STATE"`, `"SIGIL"`, ...).
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::State(_) => "STATE",
            Self::Reflection { .. } => "REFLECTION",
            Self::Rebloom { .. } => "REBLOOM",
            Self::Memory { .. } => "MEMORY",
            Self::Sigil { .. } => "SIGIL",
        }
    }
}
