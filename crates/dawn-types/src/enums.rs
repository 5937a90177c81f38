//! Core enumerations: moods, zones, speakers, and classifications.
//!
//! Every enum here carries serde derives matching the on-disk JSON Lines
//! formats: moods serialize lowercase, zones in screaming-snake form
//! (`"CALM"`, `"SURGE"`), speakers lowercase. Loaders are schema-tolerant:
//! unknown moods and speakers collapse to their `#[serde(other)]` variant
//! rather than failing the line.

use serde::{Deserialize, Serialize};

/// Affective coloring of a pulse snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    /// Baseline mood with no dominant coloring. Unknown mood strings
    /// loaded from persistence also land here.
    #[default]
    Neutral,
    /// Inward-turned, reflective processing.
    Contemplative,
    /// Actively working a problem.
    Engaged,
    /// Alarmed; the system is near its limits.
    Critical,
    /// Exploratory, novelty-seeking.
    Curious,
    /// Detached, evaluative processing.
    Analytical,
    /// High-arousal positive state.
    Excited,
}

// Schema tolerance: unknown mood strings collapse to neutral instead of
// failing the record.
impl<'de> Deserialize<'de> for Mood {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_lowercase().as_str() {
            "contemplative" => Self::Contemplative,
            "engaged" => Self::Engaged,
            "critical" => Self::Critical,
            "curious" => Self::Curious,
            "analytical" => Self::Analytical,
            "excited" => Self::Excited,
            _ => Self::Neutral,
        })
    }
}

impl Mood {
    /// Render the lowercase wire form of the mood.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Contemplative => "contemplative",
            Self::Engaged => "engaged",
            Self::Critical => "critical",
            Self::Curious => "curious",
            Self::Analytical => "analytical",
            Self::Excited => "excited",
        }
    }
}

/// Thermal/entropy zone of the system.
///
/// The zone is a deterministic function of `(heat, entropy)`; recomputing
/// it from the same inputs always yields the same value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Zone {
    /// Low heat and low entropy.
    #[default]
    Calm,
    /// Moderate activity.
    Active,
    /// Elevated activity approaching the critical band.
    Surge,
    /// Heat or entropy beyond the surge thresholds.
    Critical,
}

impl Zone {
    /// Classify the zone from heat (degrees) and entropy (0..=1).
    ///
    /// The bands are checked lowest-first, so the first matching band wins:
    /// heat < 30 and entropy < 0.4 is calm; heat < 40 or entropy < 0.6 is
    /// active; heat < 60 or entropy < 0.8 is surge; everything else is
    /// critical.
    pub fn classify(heat: f64, entropy: f64) -> Self {
        if heat < 30.0 && entropy < 0.4 {
            Self::Calm
        } else if heat < 40.0 || entropy < 0.6 {
            Self::Active
        } else if heat < 60.0 || entropy < 0.8 {
            Self::Surge
        } else {
            Self::Critical
        }
    }

    /// Render the wire form of the zone.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calm => "CALM",
            Self::Active => "ACTIVE",
            Self::Surge => "SURGE",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Origin of a memory chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The cognitive core itself (tick engine, triggers).
    Core,
    /// A human interlocutor.
    User,
    /// The owl observer/reflection subsystem.
    Owl,
    /// The named operator channel.
    Orloff,
    /// Any other source. Unknown speaker strings loaded from persistence
    /// land here.
    #[default]
    External,
}

// Schema tolerance: speaker tags from other deployments load as external
// rather than failing the record.
impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_lowercase().as_str() {
            "core" => Self::Core,
            "user" => Self::User,
            "owl" => Self::Owl,
            "orloff" => Self::Orloff,
            _ => Self::External,
        })
    }
}

impl Speaker {
    /// Importance multiplier applied when routing memories from this speaker.
    pub const fn importance_weight(self) -> f64 {
        match self {
            Self::Core => 1.2,
            Self::Owl => 1.15,
            Self::Orloff => 1.1,
            Self::User => 0.9,
            Self::External => 1.0,
        }
    }

    /// Render the lowercase wire form of the speaker.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::User => "user",
            Self::Owl => "owl",
            Self::Orloff => "orloff",
            Self::External => "external",
        }
    }
}

/// Direction of the recent heat history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Slope within the stability deadband.
    #[default]
    Stable,
    /// Positive regression slope.
    Rising,
    /// Negative regression slope.
    Falling,
    /// Sample variance above the volatility threshold, regardless of slope.
    Volatile,
}

/// Discrete classification of cognitive pressure.
///
/// Variant order is the severity order, so `PartialOrd`/`Ord` compare
/// levels directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    /// Pressure below 30.
    #[default]
    Calm,
    /// Pressure in 30..80.
    Normal,
    /// Pressure in 80..140.
    Elevated,
    /// Pressure in 140..200.
    High,
    /// Pressure at or above 200.
    Critical,
}

impl PressureLevel {
    /// Classify a pressure scalar into its discrete level.
    pub fn classify(pressure: f64) -> Self {
        if pressure < 30.0 {
            Self::Calm
        } else if pressure < 80.0 {
            Self::Normal
        } else if pressure < 140.0 {
            Self::Elevated
        } else if pressure < 200.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// Qualitative strength of a forecast value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// Forecast above 0.7.
    Strong,
    /// Forecast in (0.4, 0.7].
    Moderate,
    /// Forecast in (0.2, 0.4].
    Weak,
    /// Forecast at or below 0.2.
    Barely,
}

impl ConfidenceBand {
    /// Band a forecast scalar.
    pub fn from_forecast(forecast: f64) -> Self {
        if forecast > 0.7 {
            Self::Strong
        } else if forecast > 0.4 {
            Self::Moderate
        } else if forecast > 0.2 {
            Self::Weak
        } else {
            Self::Barely
        }
    }

    /// Adverb used when composing a predicted-behavior tag.
    pub const fn adverb(self) -> &'static str {
        match self {
            Self::Strong => "strongly",
            Self::Moderate => "moderately",
            Self::Weak => "weakly",
            Self::Barely => "barely",
        }
    }
}

/// How a rebloom event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebloomMethod {
    /// Low forecast confidence under high entropy.
    CreativeRebloom,
    /// Heat above the thermal rebloom threshold.
    ThermalRebloom,
    /// Stabilization active while confidence is high.
    StabilityRebloom,
}

impl RebloomMethod {
    /// Render the wire form of the method.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreativeRebloom => "CREATIVE_REBLOOM",
            Self::ThermalRebloom => "THERMAL_REBLOOM",
            Self::StabilityRebloom => "STABILITY_REBLOOM",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_bands_follow_thresholds() {
        assert_eq!(Zone::classify(20.0, 0.2), Zone::Calm);
        assert_eq!(Zone::classify(35.0, 0.5), Zone::Active);
        // Calm requires both conditions; entropy alone can promote.
        assert_eq!(Zone::classify(20.0, 0.5), Zone::Active);
        assert_eq!(Zone::classify(55.0, 0.7), Zone::Surge);
        assert_eq!(Zone::classify(75.0, 0.9), Zone::Critical);
    }

    #[test]
    fn zone_is_deterministic() {
        let first = Zone::classify(42.5, 0.63);
        let second = Zone::classify(42.5, 0.63);
        assert_eq!(first, second);
    }

    #[test]
    fn pressure_levels_cover_boundaries() {
        assert_eq!(PressureLevel::classify(0.0), PressureLevel::Calm);
        assert_eq!(PressureLevel::classify(30.0), PressureLevel::Normal);
        assert_eq!(PressureLevel::classify(80.0), PressureLevel::Elevated);
        assert_eq!(PressureLevel::classify(140.0), PressureLevel::High);
        assert_eq!(PressureLevel::classify(200.0), PressureLevel::Critical);
        assert_eq!(PressureLevel::classify(500.0), PressureLevel::Critical);
    }

    #[test]
    fn pressure_levels_order_by_severity() {
        assert!(PressureLevel::Calm < PressureLevel::Normal);
        assert!(PressureLevel::High < PressureLevel::Critical);
    }

    #[test]
    fn confidence_bands_cover_boundaries() {
        assert_eq!(ConfidenceBand::from_forecast(0.9), ConfidenceBand::Strong);
        assert_eq!(ConfidenceBand::from_forecast(0.7), ConfidenceBand::Moderate);
        assert_eq!(ConfidenceBand::from_forecast(0.4), ConfidenceBand::Weak);
        assert_eq!(ConfidenceBand::from_forecast(0.2), ConfidenceBand::Barely);
        assert_eq!(ConfidenceBand::from_forecast(0.0), ConfidenceBand::Barely);
    }

    #[test]
    fn mood_serde_is_lowercase() {
        let json = serde_json::to_string(&Mood::Contemplative).unwrap_or_default();
        assert_eq!(json, "\"contemplative\"");
    }

    #[test]
    fn unknown_mood_collapses_to_neutral() {
        let mood: Result<Mood, _> = serde_json::from_str("\"transcendent\"");
        assert_eq!(mood.ok(), Some(Mood::Neutral));
    }

    #[test]
    fn zone_serde_is_screaming() {
        let json = serde_json::to_string(&Zone::Surge).unwrap_or_default();
        assert_eq!(json, "\"SURGE\"");
    }

    #[test]
    fn unknown_speaker_collapses_to_external() {
        let speaker: Result<Speaker, _> = serde_json::from_str("\"ghost.process\"");
        assert_eq!(speaker.ok(), Some(Speaker::External));
    }

    #[test]
    fn speaker_weights_match_routing_table() {
        assert!((Speaker::Core.importance_weight() - 1.2).abs() < f64::EPSILON);
        assert!((Speaker::User.importance_weight() - 0.9).abs() < f64::EPSILON);
        assert!((Speaker::External.importance_weight() - 1.0).abs() < f64::EPSILON);
    }
}
