//! The pulse snapshot: the numeric tuple every phase reads.
//!
//! A [`PulseSnapshot`] is a value, never a shared reference. The pulse
//! controller hands out copies; memory chunks embed their own copy taken at
//! creation time. Heat is soft-bounded to `[0, 100]`, the unit-interval
//! fields to `[0, 1]`; the setters clamp rather than reject.

use serde::{Deserialize, Serialize};

use crate::enums::{Mood, Zone};

/// Upper bound of the heat scale, in degrees.
pub const HEAT_CEILING: f64 = 100.0;

/// Point-in-time thermal and coherence state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseSnapshot {
    /// Thermal scalar in degrees, soft-bounded to `[0, 100]`.
    pub heat: f64,
    /// Global entropy in `[0, 1]`.
    pub entropy: f64,
    /// Coherence / unified attention in `[0, 1]`.
    pub scup: f64,
    /// Attention focus in `[0, 1]`.
    #[serde(default = "default_focus")]
    pub focus: f64,
    /// Chaos reserve in `[0, 1]`.
    #[serde(default = "default_chaos")]
    pub chaos: f64,
    /// Affective coloring.
    #[serde(default)]
    pub mood: Mood,
    /// Zone derived from heat and entropy.
    #[serde(default)]
    pub zone: Zone,
}

const fn default_focus() -> f64 {
    0.7
}

const fn default_chaos() -> f64 {
    0.3
}

impl PulseSnapshot {
    /// The baseline state restored by an emergency reset.
    pub const fn baseline() -> Self {
        Self {
            heat: 25.0,
            entropy: 0.5,
            scup: 0.5,
            focus: 0.7,
            chaos: 0.3,
            mood: Mood::Neutral,
            zone: Zone::Calm,
        }
    }

    /// Heat normalized to `[0, 1]`.
    pub fn heat_normalized(&self) -> f64 {
        (self.heat / HEAT_CEILING).clamp(0.0, 1.0)
    }

    /// Set entropy, clamped to `[0, 1]`, and refresh the derived zone.
    pub fn set_entropy(&mut self, entropy: f64) {
        self.entropy = entropy.clamp(0.0, 1.0);
        self.refresh_zone();
    }

    /// Set heat, clamped to `[0, 100]`, and refresh the derived zone.
    ///
    /// Returns `true` when the requested value exceeded the ceiling and was
    /// clamped -- callers use this to detect thermal-peak episodes.
    pub fn set_heat(&mut self, heat: f64) -> bool {
        let clamped = heat > HEAT_CEILING;
        self.heat = heat.clamp(0.0, HEAT_CEILING);
        self.refresh_zone();
        clamped
    }

    /// Set focus, clamped to `[0, 1]`.
    pub fn set_focus(&mut self, focus: f64) {
        self.focus = focus.clamp(0.0, 1.0);
    }

    /// Set chaos, clamped to `[0, 1]`.
    pub fn set_chaos(&mut self, chaos: f64) {
        self.chaos = chaos.clamp(0.0, 1.0);
    }

    /// Set SCUP, clamped to `[0, 1]`.
    pub fn set_scup(&mut self, scup: f64) {
        self.scup = scup.clamp(0.0, 1.0);
    }

    /// Recompute the zone from the current heat and entropy.
    pub fn refresh_zone(&mut self) {
        self.zone = Zone::classify(self.heat, self.entropy);
    }
}

impl Default for PulseSnapshot {
    fn default() -> Self {
        Self::baseline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_calm() {
        let snapshot = PulseSnapshot::baseline();
        assert_eq!(snapshot.zone, Zone::Calm);
        assert_eq!(snapshot.mood, Mood::Neutral);
        assert!((snapshot.heat - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn set_heat_clamps_and_reports() {
        let mut snapshot = PulseSnapshot::baseline();
        assert!(!snapshot.set_heat(90.0));
        assert!((snapshot.heat - 90.0).abs() < f64::EPSILON);

        assert!(snapshot.set_heat(140.0));
        assert!((snapshot.heat - HEAT_CEILING).abs() < f64::EPSILON);
    }

    #[test]
    fn set_entropy_refreshes_zone() {
        let mut snapshot = PulseSnapshot::baseline();
        snapshot.set_entropy(0.95);
        snapshot.set_heat(75.0);
        assert_eq!(snapshot.zone, Zone::Critical);
    }

    #[test]
    fn unit_fields_clamp() {
        let mut snapshot = PulseSnapshot::baseline();
        snapshot.set_focus(1.8);
        snapshot.set_chaos(-0.2);
        snapshot.set_scup(2.0);
        assert!((snapshot.focus - 1.0).abs() < f64::EPSILON);
        assert!(snapshot.chaos.abs() < f64::EPSILON);
        assert!((snapshot.scup - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let snapshot = PulseSnapshot {
            heat: 47.3,
            entropy: 0.81,
            scup: 0.44,
            focus: 0.6,
            chaos: 0.35,
            mood: Mood::Analytical,
            zone: Zone::Surge,
        };
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        let restored: Result<PulseSnapshot, _> = serde_json::from_str(&json);
        assert_eq!(restored.ok(), Some(snapshot));
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{"heat":30.0,"entropy":0.5,"scup":0.5}"#;
        let restored: Result<PulseSnapshot, _> = serde_json::from_str(json);
        let snapshot = restored.ok();
        assert!(snapshot.is_some());
        if let Some(s) = snapshot {
            assert!((s.focus - 0.7).abs() < f64::EPSILON);
            assert!((s.chaos - 0.3).abs() < f64::EPSILON);
        }
    }
}
