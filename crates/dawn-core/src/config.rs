//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `dawn-config.yaml` next to the
//! binary's working directory. This module defines strongly-typed structs
//! mirroring the YAML, a loader that reads and validates the file, and the
//! `DAWN_PROFILE` environment override that selects a run profile
//! (`minimum`, `default`, `aggressive`) controlling default weights and
//! intervals.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value failed semantic validation.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Run profile selected through the `DAWN_PROFILE` environment variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunProfile {
    /// Conservative cadence and the original high stabilization bar.
    Minimum,
    /// Balanced defaults.
    #[default]
    Default,
    /// Short base interval and a twitchier adaptive response.
    Aggressive,
}

impl RunProfile {
    /// Read the profile from `DAWN_PROFILE`, defaulting on absence or an
    /// unrecognized value.
    pub fn from_env() -> Self {
        match std::env::var("DAWN_PROFILE").ok().as_deref() {
            Some("minimum") => Self::Minimum,
            Some("aggressive") => Self::Aggressive,
            _ => Self::Default,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DawnConfig {
    /// Tick cadence settings.
    #[serde(default)]
    pub tick: TickConfig,

    /// Regulation rule thresholds.
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Cognitive pressure weights.
    #[serde(default)]
    pub pressure: PressureConfig,

    /// Memory router and persistence settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Event log persistence settings.
    #[serde(default)]
    pub events: EventConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DawnConfig {
    /// Load configuration from a YAML file and apply the env profile.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] on parse failure, or [`ConfigError::Invalid`]
    /// when a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_profile(RunProfile::from_env());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string (profile not applied).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on parse failure or
    /// [`ConfigError::Invalid`] when a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with the env profile applied.
    pub fn from_env_profile() -> Self {
        let mut config = Self::default();
        config.apply_profile(RunProfile::from_env());
        config
    }

    /// Overlay profile-specific defaults onto the current values.
    pub fn apply_profile(&mut self, profile: RunProfile) {
        match profile {
            RunProfile::Minimum => {
                self.tick.base_interval_secs = 4.0;
                self.tick.adaptation_sensitivity = 0.3;
                self.thresholds.forecast_threshold = 0.8;
            }
            RunProfile::Default => {}
            RunProfile::Aggressive => {
                self.tick.base_interval_secs = 1.0;
                self.tick.adaptation_sensitivity = 0.8;
                self.thresholds.entropy_spike_threshold = 0.85;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.min_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: String::from("min_interval_secs must be positive"),
            });
        }
        if self.tick.max_interval_secs < self.tick.min_interval_secs {
            return Err(ConfigError::Invalid {
                reason: String::from("max_interval_secs below min_interval_secs"),
            });
        }
        if !(self.tick.min_interval_secs..=self.tick.max_interval_secs)
            .contains(&self.tick.base_interval_secs)
        {
            return Err(ConfigError::Invalid {
                reason: String::from("base_interval_secs outside [min, max]"),
            });
        }
        Ok(())
    }
}

/// Tick cadence configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickConfig {
    /// Base interval between ticks, in seconds.
    #[serde(default = "default_base_interval")]
    pub base_interval_secs: f64,

    /// Hard floor for the adaptive interval.
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f64,

    /// Hard ceiling for the adaptive interval.
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: f64,

    /// Soft wall-clock budget per phase, in milliseconds.
    #[serde(default = "default_phase_budget_ms")]
    pub phase_budget_ms: u64,

    /// Gain of the adaptive response in `[0, 1]`.
    #[serde(default = "default_sensitivity")]
    pub adaptation_sensitivity: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: default_base_interval(),
            min_interval_secs: default_min_interval(),
            max_interval_secs: default_max_interval(),
            phase_budget_ms: default_phase_budget_ms(),
            adaptation_sensitivity: default_sensitivity(),
        }
    }
}

/// Regulation rule thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThresholdConfig {
    /// Forecast confidence above which stabilization may fire.
    #[serde(default = "default_forecast_threshold")]
    pub forecast_threshold: f64,

    /// Entropy above which stabilization may fire.
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,

    /// Forecast confidence below which a rebloom is marked.
    #[serde(default = "default_rebloom_threshold")]
    pub rebloom_threshold: f64,

    /// Entropy above which emergency regulation fires.
    #[serde(default = "default_entropy_spike")]
    pub entropy_spike_threshold: f64,

    /// Heat above which the thermal rebloom rule fires.
    #[serde(default = "default_thermal_rebloom")]
    pub thermal_rebloom_heat: f64,

    /// Heat above which (in the critical zone) an emergency cooldown runs.
    #[serde(default = "default_cooldown_heat")]
    pub emergency_cooldown_heat: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            forecast_threshold: default_forecast_threshold(),
            entropy_threshold: default_entropy_threshold(),
            rebloom_threshold: default_rebloom_threshold(),
            entropy_spike_threshold: default_entropy_spike(),
            thermal_rebloom_heat: default_thermal_rebloom(),
            emergency_cooldown_heat: default_cooldown_heat(),
        }
    }
}

/// Cognitive pressure weights and thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PressureConfig {
    /// Weight of bloom mass.
    #[serde(default = "default_w_bloom")]
    pub bloom_weight: f64,

    /// Weight of sigil velocity.
    #[serde(default = "default_w_sigil")]
    pub sigil_weight: f64,

    /// Weight of excess heat.
    #[serde(default = "default_w_heat")]
    pub heat_weight: f64,

    /// Weight of scaled entropy.
    #[serde(default = "default_w_entropy")]
    pub entropy_weight: f64,

    /// Heat set point; only the excess above it contributes.
    #[serde(default = "default_target_heat")]
    pub target_heat: f64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            bloom_weight: default_w_bloom(),
            sigil_weight: default_w_sigil(),
            heat_weight: default_w_heat(),
            entropy_weight: default_w_entropy(),
            target_heat: default_target_heat(),
        }
    }
}

/// Memory router and persistence settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryConfig {
    /// Overall memory budget (significant tier holds a tenth).
    #[serde(default = "default_max_memories")]
    pub max_memories: usize,

    /// Importance threshold for the significant tier.
    #[serde(default = "default_importance_threshold")]
    pub importance_threshold: f64,

    /// Persist unsaved chunks every N ticks.
    #[serde(default = "default_auto_save_ticks")]
    pub auto_save_interval_ticks: u64,

    /// Memory JSONL file path.
    #[serde(default = "default_memories_path")]
    pub path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memories: default_max_memories(),
            importance_threshold: default_importance_threshold(),
            auto_save_interval_ticks: default_auto_save_ticks(),
            path: default_memories_path(),
        }
    }
}

/// Event log persistence settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventConfig {
    /// Whether events are persisted at all.
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Event JSONL file path.
    #[serde(default = "default_events_path")]
    pub path: String,

    /// Bound on the shutdown drain, in seconds.
    #[serde(default = "default_drain_secs")]
    pub drain_deadline_secs: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            persist: true,
            path: default_events_path(),
            drain_deadline_secs: default_drain_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_base_interval() -> f64 {
    2.0
}

const fn default_min_interval() -> f64 {
    0.1
}

const fn default_max_interval() -> f64 {
    10.0
}

const fn default_phase_budget_ms() -> u64 {
    50
}

const fn default_sensitivity() -> f64 {
    0.5
}

const fn default_forecast_threshold() -> f64 {
    0.4
}

const fn default_entropy_threshold() -> f64 {
    0.6
}

const fn default_rebloom_threshold() -> f64 {
    0.4
}

const fn default_entropy_spike() -> f64 {
    0.9
}

const fn default_thermal_rebloom() -> f64 {
    60.0
}

const fn default_cooldown_heat() -> f64 {
    90.0
}

const fn default_w_bloom() -> f64 {
    1.0
}

const fn default_w_sigil() -> f64 {
    0.5
}

const fn default_w_heat() -> f64 {
    1.0
}

const fn default_w_entropy() -> f64 {
    0.5
}

const fn default_target_heat() -> f64 {
    33.0
}

const fn default_max_memories() -> usize {
    2000
}

const fn default_importance_threshold() -> f64 {
    0.3
}

const fn default_auto_save_ticks() -> u64 {
    16
}

fn default_memories_path() -> String {
    String::from("runtime/memories.jsonl")
}

fn default_events_path() -> String {
    String::from("runtime/events.jsonl")
}

const fn default_drain_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DawnConfig::default();
        assert!((config.tick.base_interval_secs - 2.0).abs() < f64::EPSILON);
        assert!((config.tick.min_interval_secs - 0.1).abs() < f64::EPSILON);
        assert!((config.tick.max_interval_secs - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.tick.phase_budget_ms, 50);
        assert!((config.pressure.target_heat - 33.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
tick:
  base_interval_secs: 1.5
  min_interval_secs: 0.2
  max_interval_secs: 8.0
  phase_budget_ms: 40
  adaptation_sensitivity: 0.6

thresholds:
  forecast_threshold: 0.5
  entropy_threshold: 0.65
  rebloom_threshold: 0.35
  entropy_spike_threshold: 0.88

pressure:
  bloom_weight: 1.2
  sigil_weight: 0.4
  heat_weight: 0.9
  entropy_weight: 0.6
  target_heat: 30.0

memory:
  max_memories: 1000
  importance_threshold: 0.25
  auto_save_interval_ticks: 8
  path: "custom/memories.jsonl"

events:
  persist: false
  path: "custom/events.jsonl"
  drain_deadline_secs: 3

logging:
  level: "debug"
"#;
        let config = DawnConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();
        assert!((config.tick.base_interval_secs - 1.5).abs() < f64::EPSILON);
        assert!((config.thresholds.forecast_threshold - 0.5).abs() < f64::EPSILON);
        assert!(!config.events.persist);
        assert_eq!(config.memory.auto_save_interval_ticks, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml_takes_defaults() {
        let yaml = "thresholds:\n  entropy_threshold: 0.7\n";
        let config = DawnConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();
        assert!((config.thresholds.entropy_threshold - 0.7).abs() < f64::EPSILON);
        assert!((config.tick.base_interval_secs - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(DawnConfig::parse("").is_ok());
    }

    #[test]
    fn invalid_interval_order_is_rejected() {
        let yaml = "tick:\n  min_interval_secs: 5.0\n  max_interval_secs: 1.0\n";
        assert!(matches!(
            DawnConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn minimum_profile_raises_stabilization_bar() {
        let mut config = DawnConfig::default();
        config.apply_profile(RunProfile::Minimum);
        assert!((config.thresholds.forecast_threshold - 0.8).abs() < f64::EPSILON);
        assert!((config.tick.base_interval_secs - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn aggressive_profile_shortens_cadence() {
        let mut config = DawnConfig::default();
        config.apply_profile(RunProfile::Aggressive);
        assert!((config.tick.base_interval_secs - 1.0).abs() < f64::EPSILON);
        assert!((config.tick.adaptation_sensitivity - 0.8).abs() < f64::EPSILON);
    }
}
