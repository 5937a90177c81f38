//! The memory chunk: DAWN's immutable unit of memory.
//!
//! A chunk is fixed at construction: content and timestamp never change,
//! and the identifier is a pure function of both. The embedded pulse
//! snapshot is a copy of the system state at creation time, never a shared
//! reference. The only fields that move after construction are the two
//! integration flags (`traced`, `anchor_linked`), which the router flips
//! when it links the chunk into other systems.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::Speaker;
use crate::ids::MemoryId;
use crate::pulse::PulseSnapshot;

/// A single memory fragment with its metadata and captured system state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryChunk {
    /// Stable identifier derived from content and timestamp.
    pub memory_id: MemoryId,
    /// Wall-clock creation time (ISO 8601 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Who produced the memory.
    pub speaker: Speaker,
    /// Optional topic tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Raw text body.
    pub content: String,
    /// Copy of the pulse state at creation time.
    pub pulse_state: PulseSnapshot,
    /// Ordered set of sigil tags linked to this memory.
    pub sigils: Vec<String>,
    /// Derived: byte length of `content`.
    #[serde(default)]
    pub content_length: usize,
    /// Derived: whitespace-separated word count of `content`.
    #[serde(default)]
    pub word_count: usize,
    /// Whether the chunk has been linked into a trace record.
    #[serde(default)]
    pub traced: bool,
    /// Whether a memory anchor points at this chunk.
    #[serde(default)]
    pub anchor_linked: bool,
}

impl MemoryChunk {
    /// Build a chunk at an explicit timestamp.
    ///
    /// The identifier and the derived length/word counts are computed here;
    /// duplicate sigil tags are dropped while preserving first-seen order.
    pub fn new(
        timestamp: DateTime<Utc>,
        speaker: Speaker,
        content: impl Into<String>,
        topic: Option<String>,
        pulse_state: PulseSnapshot,
        sigils: Vec<String>,
    ) -> Self {
        let content = content.into();
        let memory_id = MemoryId::derive(&content, timestamp);
        let content_length = content.len();
        let word_count = content.split_whitespace().count();

        let mut seen = BTreeSet::new();
        let sigils = sigils
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .collect();

        Self {
            memory_id,
            timestamp,
            speaker,
            topic,
            content,
            pulse_state,
            sigils,
            content_length,
            word_count,
            traced: false,
            anchor_linked: false,
        }
    }

    /// Build a chunk stamped with the current wall-clock time.
    pub fn now(
        speaker: Speaker,
        content: impl Into<String>,
        topic: Option<String>,
        pulse_state: PulseSnapshot,
        sigils: Vec<String>,
    ) -> Self {
        Self::new(Utc::now(), speaker, content, topic, pulse_state, sigils)
    }

    /// Entropy captured at creation time.
    pub const fn entropy(&self) -> f64 {
        self.pulse_state.entropy
    }

    /// Heat captured at creation time.
    pub const fn heat(&self) -> f64 {
        self.pulse_state.heat
    }

    /// SCUP captured at creation time.
    pub const fn scup(&self) -> f64 {
        self.pulse_state.scup
    }

    /// Whether a given sigil tag is linked to this memory.
    pub fn has_sigil(&self, name: &str) -> bool {
        self.sigils.iter().any(|s| s == name)
    }

    /// Content preview truncated to `max_chars` with an ellipsis.
    pub fn preview(&self, max_chars: usize) -> String {
        if self.content.len() <= max_chars {
            return self.content.clone();
        }
        let cut = max_chars.saturating_sub(3);
        let mut end = cut.min(self.content.len());
        // Back off to the previous char boundary so the slice is valid.
        while end > 0 && !self.content.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        let head = self.content.get(..end).unwrap_or("");
        format!("{head}...")
    }

    /// One-line summary: timestamp, topic tag, size, speaker.
    pub fn summary(&self) -> String {
        let topic = self
            .topic
            .as_deref()
            .map_or_else(|| String::from("[no topic]"), |t| format!("[{t}]"));
        format!(
            "{} {topic} ({} chars) - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.content_length,
            self.speaker.as_str()
        )
    }

    /// Recompute the derived length and word-count fields from `content`.
    ///
    /// Used by loaders when a persisted record omitted the optional derived
    /// fields.
    pub fn recompute_derived(&mut self) {
        self.content_length = self.content.len();
        self.word_count = self.content.split_whitespace().count();
    }
}

/// Aggregate statistics over a collection of memory chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    /// Number of chunks in the collection.
    pub total_memories: usize,
    /// Number of distinct speakers.
    pub unique_speakers: usize,
    /// Number of distinct (present) topics.
    pub unique_topics: usize,
    /// Number of distinct sigil tags across all chunks.
    pub unique_sigils: usize,
    /// Sum of content lengths.
    pub total_characters: usize,
    /// Sum of word counts.
    pub total_words: usize,
    /// Mean entropy across chunks (0 when empty).
    pub average_entropy: f64,
    /// Mean heat across chunks (0 when empty).
    pub average_heat: f64,
}

/// Compute aggregate statistics for a chunk collection.
pub fn collection_stats(chunks: &[MemoryChunk]) -> MemoryStats {
    if chunks.is_empty() {
        return MemoryStats::default();
    }

    let speakers: BTreeSet<&str> = chunks.iter().map(|c| c.speaker.as_str()).collect();
    let topics: BTreeSet<&str> = chunks.iter().filter_map(|c| c.topic.as_deref()).collect();
    let sigils: BTreeSet<&str> = chunks
        .iter()
        .flat_map(|c| c.sigils.iter().map(String::as_str))
        .collect();

    let total_characters = chunks.iter().map(|c| c.content_length).sum();
    let total_words = chunks.iter().map(|c| c.word_count).sum();

    let count = chunks.len();
    let divisor = u32::try_from(count).map(f64::from).unwrap_or(f64::MAX);
    let average_entropy = chunks.iter().map(MemoryChunk::entropy).sum::<f64>() / divisor;
    let average_heat = chunks.iter().map(MemoryChunk::heat).sum::<f64>() / divisor;

    MemoryStats {
        total_memories: count,
        unique_speakers: speakers.len(),
        unique_topics: topics.len(),
        unique_sigils: sigils.len(),
        total_characters,
        total_words,
        average_entropy,
        average_heat,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0)
            .single()
            .unwrap_or_default()
    }

    fn make_chunk(content: &str) -> MemoryChunk {
        MemoryChunk::new(
            fixed_time(),
            Speaker::Core,
            content,
            Some(String::from("introspection")),
            PulseSnapshot::baseline(),
            vec![String::from("STABILIZE_PROTOCOL")],
        )
    }

    #[test]
    fn derived_fields_match_content() {
        let chunk = make_chunk("The system achieved a stable state.");
        assert_eq!(chunk.content_length, 35);
        assert_eq!(chunk.word_count, 6);
    }

    #[test]
    fn identifier_is_pure_function_of_inputs() {
        let a = make_chunk("identical content");
        let b = make_chunk("identical content");
        assert_eq!(a.memory_id, b.memory_id);
    }

    #[test]
    fn sigils_deduplicate_preserving_order() {
        let chunk = MemoryChunk::new(
            fixed_time(),
            Speaker::Owl,
            "sigil dedup",
            None,
            PulseSnapshot::baseline(),
            vec![
                String::from("B_SIGIL"),
                String::from("A_SIGIL"),
                String::from("B_SIGIL"),
            ],
        );
        assert_eq!(chunk.sigils, vec!["B_SIGIL", "A_SIGIL"]);
    }

    #[test]
    fn has_sigil_matches_linked_tags() {
        let chunk = make_chunk("linked");
        assert!(chunk.has_sigil("STABILIZE_PROTOCOL"));
        assert!(!chunk.has_sigil("EXPLORATION_MODE"));
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        let chunk = make_chunk("a fairly long piece of memory content");
        assert_eq!(chunk.preview(10), "a fairl...");
        assert_eq!(chunk.preview(500), chunk.content);
    }

    #[test]
    fn pulse_state_is_a_copy() {
        let mut pulse = PulseSnapshot::baseline();
        let chunk = MemoryChunk::new(
            fixed_time(),
            Speaker::User,
            "copy semantics",
            None,
            pulse,
            Vec::new(),
        );
        pulse.set_entropy(0.99);
        assert!((chunk.entropy() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn chunk_roundtrips_through_json() {
        let chunk = make_chunk("round trip body");
        let json = serde_json::to_string(&chunk).unwrap_or_default();
        let restored: Result<MemoryChunk, _> = serde_json::from_str(&json);
        assert_eq!(restored.ok(), Some(chunk));
    }

    #[test]
    fn stats_aggregate_over_collection() {
        let chunks = vec![make_chunk("first memory"), make_chunk("the second memory")];
        let stats = collection_stats(&chunks);
        assert_eq!(stats.total_memories, 2);
        assert_eq!(stats.unique_speakers, 1);
        assert_eq!(stats.unique_topics, 1);
        assert_eq!(stats.unique_sigils, 1);
        assert_eq!(stats.total_words, 5);
        assert!((stats.average_entropy - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_on_empty_collection_are_zero() {
        let stats = collection_stats(&[]);
        assert_eq!(stats.total_memories, 0);
        assert!(stats.average_entropy.abs() < f64::EPSILON);
    }
}
