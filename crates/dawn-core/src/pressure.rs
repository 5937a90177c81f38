//! Cognitive pressure: weighted load on the cognitive system.
//!
//! Pressure combines four contributors each tick:
//!
//! ```text
//! P = w_b * bloom_mass
//!   + w_s * sigil_velocity
//!   + w_h * max(0, heat - target_heat)
//!   + w_e * entropy * 100
//! ```
//!
//! Bloom mass is a decaying sum of recent rebloom intensities (half-life
//! ten ticks); sigil velocity is activations-per-tick averaged over the
//! last eight ticks. The scalar classifies into the discrete
//! [`PressureLevel`] bands, and alerts fire when the level rises or a
//! contributor individually crosses its own threshold.
//!
//! [`PressureLevel`]: dawn_types::PressureLevel

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use dawn_types::{PressureLevel, PulseSnapshot};

use crate::config::PressureConfig;

/// Window over which sigil velocity is averaged, in ticks.
const VELOCITY_WINDOW: usize = 8;

/// Bloom-mass half-life, in ticks.
const BLOOM_HALF_LIFE_TICKS: f64 = 10.0;

/// Bloom-mass contribution that raises a surge alert.
const BLOOM_SURGE_THRESHOLD: f64 = 50.0;

/// Sigil velocity that raises a storm alert.
const SIGIL_STORM_THRESHOLD: f64 = 3.0;

/// Heat contribution that raises a thermal alert.
const THERMAL_LOAD_THRESHOLD: f64 = 40.0;

/// Entropy contribution that raises a flood alert.
const ENTROPY_FLOOD_THRESHOLD: f64 = 40.0;

/// Alerts raised by the pressure engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureAlert {
    /// The discrete level is higher than last tick's.
    LevelRisen,
    /// Bloom mass alone crossed its threshold.
    BloomSurge,
    /// Sigil velocity alone crossed its threshold.
    SigilStorm,
    /// The heat contribution alone crossed its threshold.
    ThermalLoad,
    /// The entropy contribution alone crossed its threshold.
    EntropyFlood,
}

/// One tick's pressure assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PressureSnapshot {
    /// The pressure scalar.
    pub pressure: f64,
    /// Discrete classification of `pressure`.
    pub level: PressureLevel,
    /// Current decayed bloom mass.
    pub bloom_mass: f64,
    /// Sigil activations per tick over the velocity window.
    pub sigil_velocity: f64,
    /// Schema health index: `1 - P/200`, clamped to `[0, 1]`.
    pub shi: f64,
    /// Alerts raised this tick.
    pub alerts: Vec<PressureAlert>,
}

impl Default for PressureSnapshot {
    fn default() -> Self {
        Self {
            pressure: 0.0,
            level: PressureLevel::Calm,
            bloom_mass: 0.0,
            sigil_velocity: 0.0,
            shi: 1.0,
            alerts: Vec::new(),
        }
    }
}

/// Derives cognitive pressure from bloom, sigil, thermal, and entropy load.
#[derive(Debug, Clone)]
pub struct PressureEngine {
    config: PressureConfig,
    bloom_mass: f64,
    activations: VecDeque<u64>,
    last_level: PressureLevel,
}

impl PressureEngine {
    /// Create an engine with the given weights.
    pub const fn new(config: PressureConfig) -> Self {
        Self {
            config,
            bloom_mass: 0.0,
            activations: VecDeque::new(),
            last_level: PressureLevel::Calm,
        }
    }

    /// Advance one tick: decay bloom mass and record the previous tick's
    /// sigil activation count.
    pub fn begin_tick(&mut self, sigil_activations: u64) {
        // Exponential decay with a ten-tick half-life.
        self.bloom_mass *= 0.5_f64.powf(1.0 / BLOOM_HALF_LIFE_TICKS);
        if self.activations.len() >= VELOCITY_WINDOW {
            self.activations.pop_front();
        }
        self.activations.push_back(sigil_activations);
    }

    /// Add a rebloom's intensity to the bloom mass.
    pub fn note_rebloom(&mut self, intensity: f64) {
        self.bloom_mass += intensity.clamp(0.0, 1.0) * 10.0;
    }

    /// Assess pressure for the current tick.
    pub fn assess(&mut self, pulse: &PulseSnapshot) -> PressureSnapshot {
        let velocity = self.sigil_velocity();
        let bloom_term = self.config.bloom_weight * self.bloom_mass;
        let sigil_term = self.config.sigil_weight * velocity;
        let heat_term = self.config.heat_weight * (pulse.heat - self.config.target_heat).max(0.0);
        let entropy_term = self.config.entropy_weight * pulse.entropy * 100.0;

        let pressure = bloom_term + sigil_term + heat_term + entropy_term;
        let level = PressureLevel::classify(pressure);
        let shi = (1.0 - pressure / 200.0).clamp(0.0, 1.0);

        let mut alerts = Vec::new();
        if level > self.last_level {
            alerts.push(PressureAlert::LevelRisen);
        }
        if bloom_term > BLOOM_SURGE_THRESHOLD {
            alerts.push(PressureAlert::BloomSurge);
        }
        if velocity > SIGIL_STORM_THRESHOLD {
            alerts.push(PressureAlert::SigilStorm);
        }
        if heat_term > THERMAL_LOAD_THRESHOLD {
            alerts.push(PressureAlert::ThermalLoad);
        }
        if entropy_term > ENTROPY_FLOOD_THRESHOLD {
            alerts.push(PressureAlert::EntropyFlood);
        }

        debug!(pressure, ?level, bloom = self.bloom_mass, velocity, "Pressure assessed");
        self.last_level = level;

        PressureSnapshot {
            pressure,
            level,
            bloom_mass: self.bloom_mass,
            sigil_velocity: velocity,
            shi,
            alerts,
        }
    }

    /// Activations-per-tick over the velocity window.
    pub fn sigil_velocity(&self) -> f64 {
        if self.activations.is_empty() {
            return 0.0;
        }
        let total: u64 = self.activations.iter().sum();
        let total_f = u32::try_from(total.min(u64::from(u32::MAX)))
            .map(f64::from)
            .unwrap_or(f64::MAX);
        let count = u32::try_from(self.activations.len())
            .map(f64::from)
            .unwrap_or(f64::MAX);
        total_f / count
    }

    /// Current decayed bloom mass.
    pub const fn bloom_mass(&self) -> f64 {
        self.bloom_mass
    }
}

impl Default for PressureEngine {
    fn default() -> Self {
        Self::new(PressureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse_with(heat: f64, entropy: f64) -> PulseSnapshot {
        let mut pulse = PulseSnapshot::baseline();
        let _ = pulse.set_heat(heat);
        pulse.set_entropy(entropy);
        pulse
    }

    #[test]
    fn baseline_pulse_is_calm() {
        let mut engine = PressureEngine::default();
        engine.begin_tick(0);
        let snapshot = engine.assess(&pulse_with(25.0, 0.0));
        assert_eq!(snapshot.level, PressureLevel::Calm);
        assert!(snapshot.pressure.abs() < f64::EPSILON);
        assert!((snapshot.shi - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_and_heat_contribute_linearly() {
        let mut engine = PressureEngine::default();
        engine.begin_tick(0);
        // heat 53 -> excess 20; entropy 0.6 -> 30. P = 20 + 30 = 50.
        let snapshot = engine.assess(&pulse_with(53.0, 0.6));
        assert!((snapshot.pressure - 50.0).abs() < 1e-9);
        assert_eq!(snapshot.level, PressureLevel::Normal);
    }

    #[test]
    fn heat_below_target_does_not_contribute() {
        let mut engine = PressureEngine::default();
        engine.begin_tick(0);
        let snapshot = engine.assess(&pulse_with(20.0, 0.0));
        assert!(snapshot.pressure.abs() < f64::EPSILON);
    }

    #[test]
    fn bloom_mass_decays_with_half_life() {
        let mut engine = PressureEngine::default();
        engine.note_rebloom(1.0);
        let initial = engine.bloom_mass();
        for _ in 0..10 {
            engine.begin_tick(0);
        }
        // Ten ticks is one half-life.
        assert!((engine.bloom_mass() - initial / 2.0).abs() < 1e-9);
    }

    #[test]
    fn sigil_velocity_averages_the_window() {
        let mut engine = PressureEngine::default();
        for _ in 0..4 {
            engine.begin_tick(2);
        }
        assert!((engine.sigil_velocity() - 2.0).abs() < f64::EPSILON);
        // Window slides: zeros dilute the average.
        for _ in 0..8 {
            engine.begin_tick(0);
        }
        assert!(engine.sigil_velocity().abs() < f64::EPSILON);
    }

    #[test]
    fn level_rise_raises_alert_once() {
        let mut engine = PressureEngine::default();
        engine.begin_tick(0);
        let first = engine.assess(&pulse_with(90.0, 0.9));
        assert!(first.alerts.contains(&PressureAlert::LevelRisen));

        engine.begin_tick(0);
        let second = engine.assess(&pulse_with(90.0, 0.9));
        assert!(!second.alerts.contains(&PressureAlert::LevelRisen));
    }

    #[test]
    fn contributor_alerts_fire_independently() {
        let mut engine = PressureEngine::default();
        engine.begin_tick(0);
        // Entropy contribution: 0.5 * 0.9 * 100 = 45 > 40.
        let snapshot = engine.assess(&pulse_with(25.0, 0.9));
        assert!(snapshot.alerts.contains(&PressureAlert::EntropyFlood));
        assert!(!snapshot.alerts.contains(&PressureAlert::ThermalLoad));
    }

    #[test]
    fn critical_band_at_200() {
        let mut engine = PressureEngine::default();
        for _ in 0..30 {
            engine.note_rebloom(1.0);
        }
        engine.begin_tick(0);
        let snapshot = engine.assess(&pulse_with(100.0, 1.0));
        assert_eq!(snapshot.level, PressureLevel::Critical);
        assert!(snapshot.shi.abs() < f64::EPSILON);
    }
}
