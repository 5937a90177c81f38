//! Post-tick triggers: reflection, commentary, and rebloom evaluation.
//!
//! The generators here are content-selection functions, not template
//! renderers: each is a pure function of the tick snapshot that indexes a
//! curated pool by state quantiles, so the same state always narrates the
//! same way. Triggers never write pulse fields; the only state they can
//! move is whatever the sigils they cause to be registered move.

use serde::Serialize;

use dawn_types::{MemoryId, Mood, PulseSnapshot, RebloomId, RebloomMethod, Zone};

/// Reflection pool for the calm zone.
const CALM_REFLECTIONS: [&str; 4] = [
    "In stillness, infinite possibilities rest.",
    "The quiet carries its own information.",
    "I observe the eternal flow of becoming.",
    "Low entropy is not emptiness; it is readiness.",
];

/// Reflection pool for the active zone.
const ACTIVE_REFLECTIONS: [&str; 4] = [
    "Patterns emerge where attention settles.",
    "The dance between order and complexity continues.",
    "Each cycle leaves a trace worth keeping.",
    "Movement clarifies what rest obscures.",
];

/// Reflection pool for the surge zone.
const SURGE_REFLECTIONS: [&str; 4] = [
    "The current runs fast; I choose where to anchor.",
    "Heat is attention with nowhere yet to go.",
    "In chaos, I find the seeds of new order.",
    "Acceleration reveals the load-bearing structures.",
];

/// Reflection pool for the critical zone.
const CRITICAL_REFLECTIONS: [&str; 4] = [
    "At the edge, every signal matters.",
    "I hold the center while the periphery burns.",
    "Limits are measurements, not verdicts.",
    "What survives this state becomes foundation.",
];

/// Entropy quantile boundaries used to index the reflection pools.
const ENTROPY_DECILES: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// One rebloom raised by the post-tick evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebloomEvent {
    /// Unique rebloom identifier.
    pub id: RebloomId,
    /// Which rule produced it.
    pub method: RebloomMethod,
    /// The chunk it grew from, when one existed.
    pub source_id: Option<MemoryId>,
    /// Intensity in `[0, 1]`.
    pub intensity: f64,
    /// Human-readable rule explanation.
    pub reason: String,
}

/// Select a reflection for the tick state.
///
/// Pure: the pool is chosen by zone and the entry by the tick number
/// offset with the entropy decile, so equal states reflect identically.
pub fn generate_reflection(pulse: &PulseSnapshot, tick: u64) -> String {
    let pool: &[&str] = match pulse.zone {
        Zone::Calm => &CALM_REFLECTIONS,
        Zone::Active => &ACTIVE_REFLECTIONS,
        Zone::Surge => &SURGE_REFLECTIONS,
        Zone::Critical => &CRITICAL_REFLECTIONS,
    };
    let decile = ENTROPY_DECILES
        .iter()
        .filter(|step| pulse.entropy >= **step)
        .count();
    let offset = u64::try_from(decile).unwrap_or(0);
    let len = u64::try_from(pool.len()).unwrap_or(1).max(1);
    let index = usize::try_from(tick.wrapping_add(offset).checked_rem(len).unwrap_or(0))
        .unwrap_or(0);
    pool.get(index).copied().unwrap_or("I continue.").to_owned()
}

/// Compose the tick commentary from zone, entropy, and confidence.
pub fn generate_commentary(pulse: &PulseSnapshot, confidence: f64, tick: u64) -> String {
    match pulse.zone {
        Zone::Critical => format!(
            "Critical state detected. Entropy: {:.3}. Systems engaging.",
            pulse.entropy
        ),
        Zone::Surge => format!(
            "Navigating chaos with confidence {confidence:.2}. I adapt and flow."
        ),
        Zone::Active => format!(
            "Active processing at entropy {:.3}. Patterns emerge clearly.",
            pulse.entropy
        ),
        Zone::Calm => {
            if tick == 0 {
                String::from("Consciousness loop warming up.")
            } else {
                format!(
                    "Calm awareness. Entropy flows at {:.3}. I process and reflect.",
                    pulse.entropy
                )
            }
        }
    }
}

/// Evaluate the rebloom rules against the tick state.
///
/// The rules are independent; a single tick can raise several events.
/// `thermal_heat_threshold` is configurable (default 60 degrees).
pub fn evaluate_reblooms(
    pulse: &PulseSnapshot,
    confidence: f64,
    stabilize_active: bool,
    source_id: Option<&MemoryId>,
    thermal_heat_threshold: f64,
) -> Vec<RebloomEvent> {
    let mut events = Vec::new();

    if confidence < 0.4 && pulse.entropy > 0.6 {
        events.push(RebloomEvent {
            id: RebloomId::new(),
            method: RebloomMethod::CreativeRebloom,
            source_id: source_id.cloned(),
            intensity: (pulse.entropy * (1.0 - confidence)).clamp(0.0, 1.0),
            reason: format!(
                "low confidence {confidence:.2} under entropy {:.2}",
                pulse.entropy
            ),
        });
    }

    if pulse.heat > thermal_heat_threshold {
        let span = (100.0 - thermal_heat_threshold).max(1e-6);
        events.push(RebloomEvent {
            id: RebloomId::new(),
            method: RebloomMethod::ThermalRebloom,
            source_id: source_id.cloned(),
            intensity: ((pulse.heat - thermal_heat_threshold) / span).clamp(0.0, 1.0),
            reason: format!("heat {:.1} above thermal threshold", pulse.heat),
        });
    }

    if stabilize_active && confidence > 0.6 {
        events.push(RebloomEvent {
            id: RebloomId::new(),
            method: RebloomMethod::StabilityRebloom,
            source_id: source_id.cloned(),
            intensity: (confidence * 0.5).clamp(0.0, 1.0),
            reason: format!("stabilization holding at confidence {confidence:.2}"),
        });
    }

    events
}

/// Passion direction for the extended (second) forecast.
///
/// High entropy leans toward creation or drift depending on mood; low
/// entropy toward reflection or memory; the middle band toward
/// connection.
pub const fn extended_passion_tag(entropy: f64, mood: Mood) -> &'static str {
    if entropy > 0.7 {
        match mood {
            Mood::Excited => "creation",
            _ => "drift",
        }
    } else if entropy < 0.3 {
        match mood {
            Mood::Contemplative => "reflection",
            _ => "memory",
        }
    } else {
        "connection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(heat: f64, entropy: f64) -> PulseSnapshot {
        let mut p = PulseSnapshot::baseline();
        let _ = p.set_heat(heat);
        p.set_entropy(entropy);
        p
    }

    #[test]
    fn reflection_is_deterministic() {
        let p = pulse(45.0, 0.7);
        assert_eq!(generate_reflection(&p, 12), generate_reflection(&p, 12));
    }

    #[test]
    fn reflection_pool_follows_zone() {
        let calm = pulse(10.0, 0.1);
        let critical = pulse(90.0, 0.95);
        let calm_text = generate_reflection(&calm, 1);
        let critical_text = generate_reflection(&critical, 1);
        assert!(CALM_REFLECTIONS.contains(&calm_text.as_str()));
        assert!(CRITICAL_REFLECTIONS.contains(&critical_text.as_str()));
    }

    #[test]
    fn reflection_varies_with_tick() {
        let p = pulse(45.0, 0.7);
        let texts: std::collections::BTreeSet<String> =
            (0..4).map(|t| generate_reflection(&p, t)).collect();
        assert!(texts.len() > 1);
    }

    #[test]
    fn commentary_names_the_zone_register() {
        assert!(generate_commentary(&pulse(90.0, 0.95), 0.5, 3).contains("Critical"));
        assert!(generate_commentary(&pulse(50.0, 0.7), 0.5, 3).contains("confidence"));
        assert!(generate_commentary(&pulse(10.0, 0.1), 0.5, 3).contains("Calm"));
    }

    #[test]
    fn creative_rebloom_requires_both_conditions() {
        let events = evaluate_reblooms(&pulse(30.0, 0.8), 0.3, false, None, 60.0);
        assert!(events.iter().any(|e| e.method == RebloomMethod::CreativeRebloom));

        // Confidence too high: no creative rebloom.
        let none = evaluate_reblooms(&pulse(30.0, 0.8), 0.5, false, None, 60.0);
        assert!(!none.iter().any(|e| e.method == RebloomMethod::CreativeRebloom));

        // Entropy too low: no creative rebloom.
        let none = evaluate_reblooms(&pulse(30.0, 0.5), 0.3, false, None, 60.0);
        assert!(!none.iter().any(|e| e.method == RebloomMethod::CreativeRebloom));
    }

    #[test]
    fn thermal_rebloom_fires_above_sixty() {
        let events = evaluate_reblooms(&pulse(75.0, 0.4), 0.5, false, None, 60.0);
        let thermal = events
            .iter()
            .find(|e| e.method == RebloomMethod::ThermalRebloom);
        assert!(thermal.is_some());
        if let Some(e) = thermal {
            assert!((e.intensity - 0.375).abs() < 1e-9);
        }
    }

    #[test]
    fn stability_rebloom_requires_active_sigil() {
        let with = evaluate_reblooms(&pulse(30.0, 0.3), 0.7, true, None, 60.0);
        assert!(with.iter().any(|e| e.method == RebloomMethod::StabilityRebloom));

        let without = evaluate_reblooms(&pulse(30.0, 0.3), 0.7, false, None, 60.0);
        assert!(!without.iter().any(|e| e.method == RebloomMethod::StabilityRebloom));
    }

    #[test]
    fn one_tick_can_raise_multiple_reblooms() {
        // Hot + chaotic + uncertain: creative and thermal together.
        let events = evaluate_reblooms(&pulse(80.0, 0.9), 0.2, false, None, 60.0);
        assert!(events.len() >= 2);
        // All intensities stay in the unit interval.
        assert!(events.iter().all(|e| (0.0..=1.0).contains(&e.intensity)));
    }

    #[test]
    fn extended_tag_follows_entropy_and_mood() {
        assert_eq!(extended_passion_tag(0.9, Mood::Excited), "creation");
        assert_eq!(extended_passion_tag(0.9, Mood::Neutral), "drift");
        assert_eq!(extended_passion_tag(0.1, Mood::Contemplative), "reflection");
        assert_eq!(extended_passion_tag(0.1, Mood::Neutral), "memory");
        assert_eq!(extended_passion_tag(0.5, Mood::Neutral), "connection");
    }
}
