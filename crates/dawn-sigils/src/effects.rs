//! Built-in sigil effects.
//!
//! Each effect is a small, idempotent-within-a-tick adjustment to the
//! pulse snapshot (the active-set check in the engine guarantees a name
//! runs at most once per tick). Effects that need the driver to do
//! something outside the snapshot return a [`SigilDirective`].

use serde::{Deserialize, Serialize};

use dawn_types::PulseSnapshot;

/// The built-in regulatory effects, one per well-known sigil name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigilEffect {
    /// Damp entropy and heat toward stability.
    StabilizeProtocol,
    /// Raise entropy and loosen focus to explore.
    ExplorationMode,
    /// Sharpen focus and drain chaos.
    DeepReflection,
    /// Restore the baseline pulse and clear the active set.
    EmergencyReset,
    /// Pull entropy toward its 0.5 set point.
    EntropyRegulation,
    /// Ask the memory router to re-score importance.
    MemoryConsolidation,
}

impl SigilEffect {
    /// Resolve a sigil name to its built-in effect.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "STABILIZE_PROTOCOL" => Some(Self::StabilizeProtocol),
            "EXPLORATION_MODE" => Some(Self::ExplorationMode),
            "DEEP_REFLECTION" => Some(Self::DeepReflection),
            "EMERGENCY_RESET" => Some(Self::EmergencyReset),
            "ENTROPY_REGULATION" => Some(Self::EntropyRegulation),
            "MEMORY_CONSOLIDATION" => Some(Self::MemoryConsolidation),
            _ => None,
        }
    }

    /// The canonical sigil name for this effect.
    pub const fn name(self) -> &'static str {
        match self {
            Self::StabilizeProtocol => "STABILIZE_PROTOCOL",
            Self::ExplorationMode => "EXPLORATION_MODE",
            Self::DeepReflection => "DEEP_REFLECTION",
            Self::EmergencyReset => "EMERGENCY_RESET",
            Self::EntropyRegulation => "ENTROPY_REGULATION",
            Self::MemoryConsolidation => "MEMORY_CONSOLIDATION",
        }
    }

    /// Names this effect cascades into when it activates.
    pub const fn cascade_links(self) -> &'static [&'static str] {
        match self {
            Self::StabilizeProtocol => &["ENTROPY_REGULATION"],
            Self::DeepReflection => &["MEMORY_CONSOLIDATION"],
            Self::ExplorationMode
            | Self::EmergencyReset
            | Self::EntropyRegulation
            | Self::MemoryConsolidation => &[],
        }
    }
}

/// Side requests an effect hands back to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SigilDirective {
    /// Re-score importance across the memory router's tiers.
    ConsolidateMemories,
    /// The active sigil set was cleared by an emergency reset.
    ActiveSetCleared,
}

/// Run an effect against a pulse snapshot.
///
/// Returns the directive the driver must act on, if any. The snapshot's
/// zone is refreshed after every mutation so it stays a pure function of
/// `(heat, entropy)`.
pub fn apply_effect(effect: SigilEffect, pulse: &mut PulseSnapshot) -> Option<SigilDirective> {
    match effect {
        SigilEffect::StabilizeProtocol => {
            pulse.set_entropy(pulse.entropy * 0.8);
            let _ = pulse.set_heat(pulse.heat * 0.9);
            None
        }
        SigilEffect::ExplorationMode => {
            pulse.set_entropy((pulse.entropy * 1.2).min(1.0));
            pulse.set_focus(pulse.focus * 0.8);
            None
        }
        SigilEffect::DeepReflection => {
            pulse.set_focus((pulse.focus * 1.3).min(1.0));
            pulse.set_chaos(pulse.chaos * 0.6);
            None
        }
        SigilEffect::EmergencyReset => {
            *pulse = PulseSnapshot::baseline();
            Some(SigilDirective::ActiveSetCleared)
        }
        SigilEffect::EntropyRegulation => {
            let adjusted = pulse.entropy + 0.3 * (0.5 - pulse.entropy);
            pulse.set_entropy(adjusted);
            None
        }
        SigilEffect::MemoryConsolidation => Some(SigilDirective::ConsolidateMemories),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stabilize_damps_entropy_and_heat() {
        let mut pulse = PulseSnapshot::baseline();
        pulse.set_entropy(0.9);
        let _ = pulse.set_heat(50.0);
        let directive = apply_effect(SigilEffect::StabilizeProtocol, &mut pulse);
        assert!(directive.is_none());
        assert!((pulse.entropy - 0.72).abs() < 1e-12);
        assert!((pulse.heat - 45.0).abs() < 1e-12);
    }

    #[test]
    fn exploration_saturates_entropy_at_one() {
        let mut pulse = PulseSnapshot::baseline();
        pulse.set_entropy(0.95);
        let _ = apply_effect(SigilEffect::ExplorationMode, &mut pulse);
        assert!((pulse.entropy - 1.0).abs() < f64::EPSILON);
        assert!((pulse.focus - 0.56).abs() < 1e-12);
    }

    #[test]
    fn deep_reflection_sharpens_focus() {
        let mut pulse = PulseSnapshot::baseline();
        let _ = apply_effect(SigilEffect::DeepReflection, &mut pulse);
        assert!((pulse.focus - 0.91).abs() < 1e-12);
        assert!((pulse.chaos - 0.18).abs() < 1e-12);
    }

    #[test]
    fn emergency_reset_restores_baseline() {
        let mut pulse = PulseSnapshot::baseline();
        pulse.set_entropy(0.99);
        let _ = pulse.set_heat(95.0);
        let directive = apply_effect(SigilEffect::EmergencyReset, &mut pulse);
        assert_eq!(directive, Some(SigilDirective::ActiveSetCleared));
        assert_eq!(pulse, PulseSnapshot::baseline());
    }

    #[test]
    fn entropy_regulation_pulls_toward_set_point() {
        let mut high = PulseSnapshot::baseline();
        high.set_entropy(0.92);
        let _ = apply_effect(SigilEffect::EntropyRegulation, &mut high);
        assert!((high.entropy - 0.794).abs() < 1e-12);

        let mut low = PulseSnapshot::baseline();
        low.set_entropy(0.1);
        let _ = apply_effect(SigilEffect::EntropyRegulation, &mut low);
        assert!((low.entropy - 0.22).abs() < 1e-12);
    }

    #[test]
    fn consolidation_is_a_pure_directive() {
        let mut pulse = PulseSnapshot::baseline();
        let before = pulse;
        let directive = apply_effect(SigilEffect::MemoryConsolidation, &mut pulse);
        assert_eq!(directive, Some(SigilDirective::ConsolidateMemories));
        assert_eq!(pulse, before);
    }

    #[test]
    fn names_round_trip() {
        for effect in [
            SigilEffect::StabilizeProtocol,
            SigilEffect::ExplorationMode,
            SigilEffect::DeepReflection,
            SigilEffect::EmergencyReset,
            SigilEffect::EntropyRegulation,
            SigilEffect::MemoryConsolidation,
        ] {
            assert_eq!(SigilEffect::from_name(effect.name()), Some(effect));
        }
        assert_eq!(SigilEffect::from_name("UNKNOWN_SIGIL"), None);
    }
}
