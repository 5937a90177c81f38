//! The memory router: importance scoring, tier placement, retrieval.
//!
//! Tier rules:
//!
//! - **working** (capacity 50) -- chunks whose importance clears 0.7, or
//!   that were created within the recent-interaction horizon;
//! - **recent** (capacity 200) -- every routed chunk, oldest evicted first;
//! - **significant** (capacity `max_memories / 10`) -- chunks above the
//!   importance threshold, lowest-importance evicted first.
//!
//! Importance is a pure function of the chunk (property: equal inputs give
//! equal scores, and it is monotone in content length under an identical
//! pulse snapshot). Retrieval scores candidates from all three tiers
//! (deduplicated by identifier) against the query and optional context,
//! breaking ties by recency and then identifier.

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::debug;

use dawn_types::{MemoryChunk, Mood};

/// Importance above which a chunk enters the working tier outright.
const WORKING_IMPORTANCE: f64 = 0.7;

/// Age within which a chunk counts as a recent interaction.
const RECENT_INTERACTION_MINUTES: i64 = 30;

/// Minimum relevance score for a retrieval hit.
const RELEVANCE_FLOOR: f64 = 0.1;

/// Hours over which the recency bonus decays to zero (one week).
const RECENCY_DECAY_HOURS: f64 = 168.0;

/// Errors from the memory router.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// A tier exceeded its capacity without eviction -- an invariant
    /// violation the driver treats as fatal.
    #[error("tier {tier} over capacity: {len} > {capacity}")]
    TierOverCapacity {
        /// Which tier broke the bound.
        tier: &'static str,
        /// Observed length.
        len: usize,
        /// Configured capacity.
        capacity: usize,
    },
}

/// Router capacities and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouterConfig {
    /// Working tier capacity.
    pub working_capacity: usize,
    /// Recent tier capacity.
    pub recent_capacity: usize,
    /// Overall memory budget; the significant tier holds a tenth of it.
    pub max_memories: usize,
    /// Importance at or above which a chunk is significant.
    pub importance_threshold: f64,
}

impl RouterConfig {
    /// Capacity of the significant tier.
    pub const fn significant_capacity(&self) -> usize {
        self.max_memories / 10
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            working_capacity: 50,
            recent_capacity: 200,
            max_memories: 2000,
            importance_threshold: 0.3,
        }
    }
}

/// Where a routed chunk landed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RoutingOutcome {
    /// Entered the working tier.
    pub working: bool,
    /// Entered the recent tier (always true).
    pub recent: bool,
    /// Entered the significant tier.
    pub significant: bool,
    /// The computed importance score.
    pub importance: f64,
}

/// Optional retrieval context for relevance bonuses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetrievalContext {
    /// Bonus when the chunk's mood matches.
    pub mood: Option<Mood>,
    /// Bonus when the chunk's entropy falls inside the band.
    pub entropy_band: Option<(f64, f64)>,
}

/// Counters exposed through the snapshot API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RouterStats {
    /// Chunks routed since construction.
    pub routing_decisions: u64,
    /// Retrievals that returned at least one chunk.
    pub memory_hits: u64,
    /// Retrievals that returned nothing.
    pub memory_misses: u64,
    /// Current working tier size.
    pub working_len: usize,
    /// Current recent tier size.
    pub recent_len: usize,
    /// Current significant tier size.
    pub significant_len: usize,
    /// Chunks routed but not yet persisted.
    pub unsaved_len: usize,
}

/// Deterministic importance score in `[0, 1]`.
///
/// Weighted sum of content length, entropy, heat, SCUP displacement from
/// neutral, sigil presence, and a small topic term; the sum is then scaled
/// by the speaker weight and the topic multiplier and clamped.
pub fn importance(chunk: &MemoryChunk) -> f64 {
    let len = u32::try_from(chunk.content_length)
        .map(f64::from)
        .unwrap_or(f64::MAX);
    let sigil_count = u32::try_from(chunk.sigils.len())
        .map(f64::from)
        .unwrap_or(f64::MAX);
    let topic_boost = topic_multiplier(chunk.topic.as_deref());

    let base = 0.20 * (len / 500.0).min(1.0)
        + 0.30 * chunk.entropy()
        + 0.20 * (chunk.heat() / 100.0)
        + 0.15 * ((chunk.scup() - 0.5).abs() * 2.0)
        + 0.10 * (sigil_count / 3.0).min(1.0)
        + 0.05 * topic_boost;

    (base * chunk.speaker.importance_weight() * topic_boost).clamp(0.0, 1.0)
}

/// Topic multiplier: alert-class topics boost, reflective topics nudge.
fn topic_multiplier(topic: Option<&str>) -> f64 {
    match topic {
        Some("system_event" | "critical_state" | "breakthrough" | "error") => 1.3,
        Some("reflection" | "introspection") => 1.1,
        _ => 1.0,
    }
}

/// Tiered memory store with single-writer semantics.
#[derive(Debug, Default)]
pub struct MemoryRouter {
    config: RouterConfig,
    working: VecDeque<Arc<MemoryChunk>>,
    recent: VecDeque<Arc<MemoryChunk>>,
    significant: Vec<Arc<MemoryChunk>>,
    unsaved: Vec<Arc<MemoryChunk>>,
    routing_decisions: u64,
    memory_hits: u64,
    memory_misses: u64,
}

impl MemoryRouter {
    /// Create a router with default capacities.
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a router with explicit capacities.
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route a chunk into the tiers. Returns where it landed.
    pub fn route(&mut self, chunk: MemoryChunk) -> RoutingOutcome {
        let chunk = Arc::new(chunk);
        self.routing_decisions = self.routing_decisions.saturating_add(1);

        let score = importance(&chunk);
        let recent_interaction = Utc::now()
            .signed_duration_since(chunk.timestamp)
            < Duration::minutes(RECENT_INTERACTION_MINUTES);

        let mut outcome = RoutingOutcome {
            recent: true,
            importance: score,
            ..RoutingOutcome::default()
        };

        if score > WORKING_IMPORTANCE || recent_interaction {
            if self.working.len() >= self.config.working_capacity {
                self.working.pop_front();
            }
            self.working.push_back(Arc::clone(&chunk));
            outcome.working = true;
        }

        if self.recent.len() >= self.config.recent_capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(Arc::clone(&chunk));

        if score > self.config.importance_threshold {
            self.significant.push(Arc::clone(&chunk));
            self.prune_significant();
            outcome.significant = true;
        }

        self.unsaved.push(chunk);
        debug!(importance = score, working = outcome.working, significant = outcome.significant, "Memory routed");
        outcome
    }

    /// Retrieve up to `max_results` chunks relevant to `query`.
    ///
    /// `max_results == 0` returns an empty list without touching the
    /// hit/miss statistics.
    pub fn retrieve(
        &mut self,
        query: &str,
        context: Option<&RetrievalContext>,
        max_results: usize,
    ) -> Vec<Arc<MemoryChunk>> {
        if max_results == 0 {
            return Vec::new();
        }

        let mut seen = BTreeSet::new();
        let mut scored: Vec<(f64, Arc<MemoryChunk>)> = Vec::new();
        let candidates = self
            .working
            .iter()
            .chain(self.significant.iter())
            .chain(self.recent.iter());

        for chunk in candidates {
            if !seen.insert(chunk.memory_id.clone()) {
                continue;
            }
            let score = relevance(chunk, query, context);
            if score > RELEVANCE_FLOOR {
                scored.push((score, Arc::clone(chunk)));
            }
        }

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
                .then_with(|| a.1.memory_id.cmp(&b.1.memory_id))
        });

        let results: Vec<Arc<MemoryChunk>> =
            scored.into_iter().take(max_results).map(|(_, c)| c).collect();
        if results.is_empty() {
            self.memory_misses = self.memory_misses.saturating_add(1);
        } else {
            self.memory_hits = self.memory_hits.saturating_add(1);
        }
        results
    }

    /// The most recently routed chunk, if any.
    pub fn latest(&self) -> Option<Arc<MemoryChunk>> {
        self.recent.back().cloned()
    }

    /// Re-score the significant tier and re-apply its eviction rule.
    ///
    /// This is the memory-consolidation request raised by the
    /// `MEMORY_CONSOLIDATION` sigil. Returns the number of chunks that
    /// left the tier.
    pub fn consolidate(&mut self) -> usize {
        let before = self.significant.len();
        let threshold = self.config.importance_threshold;
        self.significant.retain(|c| importance(c) > threshold);
        self.prune_significant();
        before.saturating_sub(self.significant.len())
    }

    /// Chunks routed since the last [`take_unsaved`](Self::take_unsaved).
    pub const fn unsaved_len(&self) -> usize {
        self.unsaved.len()
    }

    /// Drain the unsaved buffer for persistence.
    pub fn take_unsaved(&mut self) -> Vec<Arc<MemoryChunk>> {
        core::mem::take(&mut self.unsaved)
    }

    /// Return chunks to the unsaved buffer after a failed persistence
    /// attempt so nothing is silently dropped.
    pub fn requeue_unsaved(&mut self, chunks: Vec<Arc<MemoryChunk>>) {
        let mut returned = chunks;
        returned.extend(core::mem::take(&mut self.unsaved));
        self.unsaved = returned;
    }

    /// Current counters and tier sizes.
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            routing_decisions: self.routing_decisions,
            memory_hits: self.memory_hits,
            memory_misses: self.memory_misses,
            working_len: self.working.len(),
            recent_len: self.recent.len(),
            significant_len: self.significant.len(),
            unsaved_len: self.unsaved.len(),
        }
    }

    /// Verify the tier-capacity invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::TierOverCapacity`] naming the first tier
    /// found over its bound. The driver treats this as fatal.
    pub fn check_invariants(&self) -> Result<(), RouterError> {
        if self.working.len() > self.config.working_capacity {
            return Err(RouterError::TierOverCapacity {
                tier: "working",
                len: self.working.len(),
                capacity: self.config.working_capacity,
            });
        }
        if self.recent.len() > self.config.recent_capacity {
            return Err(RouterError::TierOverCapacity {
                tier: "recent",
                len: self.recent.len(),
                capacity: self.config.recent_capacity,
            });
        }
        if self.significant.len() > self.config.significant_capacity() {
            return Err(RouterError::TierOverCapacity {
                tier: "significant",
                len: self.significant.len(),
                capacity: self.config.significant_capacity(),
            });
        }
        Ok(())
    }

    /// Iterate the recent tier, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Arc<MemoryChunk>> {
        self.recent.iter()
    }

    fn prune_significant(&mut self) {
        let capacity = self.config.significant_capacity();
        if self.significant.len() > capacity {
            self.significant
                .sort_by(|a, b| importance(b).total_cmp(&importance(a)));
            self.significant.truncate(capacity);
        }
    }
}

/// Relevance score of a chunk against a query and optional context.
fn relevance(chunk: &MemoryChunk, query: &str, context: Option<&RetrievalContext>) -> f64 {
    let query_lower = query.to_lowercase();
    let content_lower = chunk.content.to_lowercase();
    let mut score = 0.0;

    if !query_lower.is_empty() && content_lower.contains(&query_lower) {
        score += 0.5;
    }

    let query_words: BTreeSet<&str> = query_lower.split_whitespace().collect();
    if !query_words.is_empty() {
        let content_words: BTreeSet<&str> = content_lower.split_whitespace().collect();
        let overlap = query_words.intersection(&content_words).count();
        let overlap_f = u32::try_from(overlap).map(f64::from).unwrap_or(f64::MAX);
        let total_f = u32::try_from(query_words.len())
            .map(f64::from)
            .unwrap_or(f64::MAX);
        score += (overlap_f / total_f) * 0.3;
    }

    if let Some(topic) = chunk.topic.as_deref() {
        if query_lower.contains(&topic.to_lowercase()) {
            score += 0.2;
        }
    }

    if query_lower.contains(chunk.speaker.as_str()) {
        score += 0.1;
    }

    if let Some(ctx) = context {
        if ctx.mood.is_some_and(|m| m == chunk.pulse_state.mood) {
            score += 0.1;
        }
        if let Some((low, high)) = ctx.entropy_band {
            if (low..=high).contains(&chunk.entropy()) {
                score += 0.1;
            }
        }
    }

    let age_seconds = Utc::now()
        .signed_duration_since(chunk.timestamp)
        .num_seconds()
        .max(0);
    let age_hours = u32::try_from(age_seconds)
        .map(f64::from)
        .unwrap_or(f64::MAX)
        / 3600.0;
    score += (1.0 - age_hours / RECENCY_DECAY_HOURS).max(0.0) * 0.1;

    score += importance(chunk) * 0.1;
    score.min(1.0)
}
