//! Shared type definitions for the DAWN cognitive core.
//!
//! This crate holds the vocabulary every other core crate speaks: typed
//! identifiers, the mood/zone/speaker enums, the [`PulseSnapshot`] numeric
//! tuple, and the immutable [`MemoryChunk`] record. It has no behavior of
//! its own beyond construction, derivation, and classification -- subsystem
//! logic lives in the crates that own it.

pub mod chunk;
pub mod enums;
pub mod ids;
pub mod pulse;

pub use chunk::{MemoryChunk, MemoryStats, collection_stats};
pub use enums::{ConfidenceBand, Mood, PressureLevel, RebloomMethod, Speaker, TrendDirection, Zone};
pub use ids::{EventId, MemoryId, RebloomId};
pub use pulse::PulseSnapshot;
