//! Passion and acquaintance: the forecast's two input models.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Number of trailing acquaintance events that count toward the delta.
const RECENT_SPAN: usize = 4;

/// A directional drive with intensity, fluidity, and centrality.
///
/// Centrality defaults to a function of the other two when not set
/// explicitly: intense, low-fluidity passions are the most central.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passion {
    /// What the passion is directed at (e.g. `"system_stability"`).
    pub direction: String,
    /// Strength of the drive in `[0, 1]`.
    pub intensity: f64,
    /// How readily the drive shifts targets, in `[0, 1]`.
    pub fluidity: f64,
    /// Explicit centrality override; derived when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centrality: Option<f64>,
}

impl Passion {
    /// Build a passion with clamped intensity and fluidity.
    pub fn new(direction: impl Into<String>, intensity: f64, fluidity: f64) -> Self {
        Self {
            direction: direction.into(),
            intensity: intensity.clamp(0.0, 1.0),
            fluidity: fluidity.clamp(0.0, 1.0),
            centrality: None,
        }
    }

    /// Set an explicit centrality coefficient.
    #[must_use]
    pub const fn with_centrality(mut self, centrality: f64) -> Self {
        self.centrality = Some(centrality);
        self
    }

    /// Centrality coefficient: the explicit value when set, otherwise
    /// `intensity * (1 - fluidity/2)`.
    pub fn centrality(&self) -> f64 {
        self.centrality
            .unwrap_or_else(|| self.intensity * self.fluidity.mul_add(-0.5, 1.0))
    }
}

/// One weighted familiarity event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquaintanceEvent {
    /// Short label for what was experienced.
    pub label: String,
    /// Familiarity weight contributed by the event.
    pub weight: f64,
}

/// Accumulated familiarity with the current territory.
///
/// `total()` is the lifetime weight sum; `delta()` is the weight of the
/// most recent few events, which is what the probability estimate divides
/// by.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acquaintance {
    events: VecDeque<AcquaintanceEvent>,
    total_weight: f64,
}

impl Acquaintance {
    /// Create an empty acquaintance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore an acquaintance from explicit delta/total sums.
    ///
    /// Used when the caller has the aggregates but not the event history,
    /// e.g. replaying a persisted forecast input or setting up a test
    /// vector. The delta is represented as a single synthetic event.
    pub fn from_parts(delta: f64, total: f64) -> Self {
        let mut events = VecDeque::new();
        events.push_back(AcquaintanceEvent {
            label: String::from("restored"),
            weight: delta,
        });
        Self {
            events,
            total_weight: total,
        }
    }

    /// Record a familiarity event.
    pub fn add_event(&mut self, label: impl Into<String>, weight: f64) {
        self.events.push_back(AcquaintanceEvent {
            label: label.into(),
            weight,
        });
        self.total_weight += weight;
        // The event list only needs to cover the delta span.
        while self.events.len() > RECENT_SPAN {
            self.events.pop_front();
        }
    }

    /// Weight of the most recent events.
    pub fn delta(&self) -> f64 {
        self.events.iter().map(|e| e.weight).sum()
    }

    /// Lifetime weight sum.
    pub const fn total(&self) -> f64 {
        self.total_weight
    }

    /// Number of retained recent events.
    pub fn recent_len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passion_clamps_inputs() {
        let passion = Passion::new("overdrive", 1.7, -0.3);
        assert!((passion.intensity - 1.0).abs() < f64::EPSILON);
        assert!(passion.fluidity.abs() < f64::EPSILON);
    }

    #[test]
    fn derived_centrality_penalizes_fluidity() {
        let steady = Passion::new("steady", 0.8, 0.0);
        let fluid = Passion::new("fluid", 0.8, 1.0);
        assert!((steady.centrality() - 0.8).abs() < f64::EPSILON);
        assert!((fluid.centrality() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn explicit_centrality_wins() {
        let passion = Passion::new("explicit", 0.5, 0.5).with_centrality(0.9);
        assert!((passion.centrality() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn acquaintance_accumulates_totals() {
        let mut acq = Acquaintance::new();
        for i in 0..6_u32 {
            acq.add_event(format!("event-{i}"), 1.0);
        }
        assert!((acq.total() - 6.0).abs() < f64::EPSILON);
        // Delta only covers the recent span.
        assert!((acq.delta() - 4.0).abs() < f64::EPSILON);
        assert_eq!(acq.recent_len(), 4);
    }

    #[test]
    fn from_parts_reproduces_aggregates() {
        let acq = Acquaintance::from_parts(0.3, 2.0);
        assert!((acq.delta() - 0.3).abs() < f64::EPSILON);
        assert!((acq.total() - 2.0).abs() < f64::EPSILON);
    }
}
