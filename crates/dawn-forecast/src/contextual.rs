//! Context derivation: passion and acquaintance from memory and pulse.
//!
//! The driver's forecast phase does not receive hand-built inputs; it
//! derives them from the most recent memory chunk and the live pulse
//! snapshot. Topic keywords select a passion archetype, entropy and heat
//! modulate it, and the acquaintance is seeded with the tick's synthetic
//! experience events so familiarity reflects what the system just lived
//! through.

use dawn_types::{MemoryChunk, PulseSnapshot};

use crate::models::{Acquaintance, Passion};

/// Derive a passion from the latest memory chunk and the current pulse.
///
/// Topic keywords pick the archetype (direction, base intensity, base
/// fluidity); entropy then raises intensity and heat raises fluidity, both
/// saturating at 1. Without a chunk or topic the passion falls back to
/// plain existence maintenance.
pub fn derive_passion(latest: Option<&MemoryChunk>, pulse: &PulseSnapshot) -> Passion {
    let topic = latest.and_then(|c| c.topic.as_deref());
    let (direction, intensity, fluidity) = topic.map_or(
        ("existence_maintenance", 0.4, 0.5),
        |t| {
            let lower = t.to_lowercase();
            if lower.contains("critical") || lower.contains("alert") {
                ("system_stability", 0.8, 0.2)
            } else if lower.contains("chaotic") || lower.contains("navigation") {
                ("adaptive_navigation", 0.7, 0.6)
            } else if lower.contains("active") || lower.contains("processing") {
                ("cognitive_processing", 0.6, 0.4)
            } else if lower.contains("contemplation") || lower.contains("reflection") {
                ("deep_introspection", 0.5, 0.3)
            } else {
                ("general_cognition", 0.5, 0.5)
            }
        },
    );

    let intensity = pulse.entropy.mul_add(0.3, intensity).min(1.0);
    let fluidity = (fluidity + (pulse.heat - 25.0) / 100.0).clamp(0.0, 1.0);
    Passion::new(direction, intensity, fluidity)
}

/// Build an acquaintance from the tick's synthetic experience events.
///
/// Each reading the system just took (entropy, heat, zone, the tick
/// itself) contributes unit familiarity weight.
pub fn derive_acquaintance(pulse: &PulseSnapshot, tick: u64) -> Acquaintance {
    let mut acquaintance = Acquaintance::new();
    acquaintance.add_event(format!("entropy_reading_{:.2}", pulse.entropy), 1.0);
    acquaintance.add_event(format!("heat_level_{:.1}", pulse.heat), 1.0);
    acquaintance.add_event(format!("zone_transition_{}", pulse.zone.as_str()), 1.0);
    acquaintance.add_event(format!("tick_processing_{tick}"), 1.0);
    acquaintance
}
