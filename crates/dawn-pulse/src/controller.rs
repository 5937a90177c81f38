//! Pulse controller: heat, zone, and trend.
//!
//! Heat is continuous and soft-bounded to `[0, 100]`; attempts to push it
//! past the ceiling clamp the value and raise a thermal-peak signal exactly
//! once per contiguous clamp episode. The zone is always recomputed from
//! `(heat, entropy)` after a mutation, so reading it twice without a write
//! in between yields the same value.
//!
//! Trend is derived from the sign of the least-squares slope over the most
//! recent history samples, with a variance check that reports `volatile`
//! before the slope is consulted.

use std::collections::VecDeque;

use tracing::{debug, warn};

use dawn_types::{Mood, PulseSnapshot, TrendDirection};

/// Capacity of the heat history ring buffer.
const HISTORY_CAPACITY: usize = 64;

/// Number of trailing samples used for trend regression.
const TREND_WINDOW: usize = 16;

/// Slope magnitude below which the trend reads as stable (degrees/sample).
const TREND_DEADBAND: f64 = 0.05;

/// Residual variance (around the fitted trend line) above which the trend
/// reads as volatile.
const VOLATILITY_VARIANCE: f64 = 100.0;

/// Errors from pulse mutators.
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    /// A mutation supplied a NaN or infinite value.
    #[error("non-finite value for {field}: {value}")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// An emergency cooldown target outside the heat scale.
    #[error("cooldown target {target} outside [0, 100]")]
    CooldownOutOfRange {
        /// The rejected target.
        target: f64,
    },
}

/// Partial update applied through [`PulseController::update_state`].
///
/// Absent fields keep their current value. Zone is never set directly --
/// it is derived from heat and entropy after the update lands.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PulseUpdate {
    /// New heat value in degrees, clamped to `[0, 100]`.
    pub heat: Option<f64>,
    /// New entropy in `[0, 1]`.
    pub entropy: Option<f64>,
    /// New SCUP in `[0, 1]`.
    pub scup: Option<f64>,
    /// New focus in `[0, 1]`.
    pub focus: Option<f64>,
    /// New chaos in `[0, 1]`.
    pub chaos: Option<f64>,
    /// New mood.
    pub mood: Option<Mood>,
}

/// What a mutation did beyond storing values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Set when this mutation started a thermal-peak episode (heat clamped
    /// at the ceiling after previously being below it).
    pub thermal_peak: bool,
}

/// Thermal state owner: heat scalar, derived zone, heat history.
#[derive(Debug, Clone)]
pub struct PulseController {
    state: PulseSnapshot,
    history: VecDeque<f64>,
    in_clamp_episode: bool,
    thermal_peaks: u64,
}

impl PulseController {
    /// Create a controller at the baseline pulse state.
    pub fn new() -> Self {
        Self::with_state(PulseSnapshot::baseline())
    }

    /// Create a controller from an explicit starting state.
    pub fn with_state(state: PulseSnapshot) -> Self {
        let mut history = VecDeque::with_capacity(HISTORY_CAPACITY);
        history.push_back(state.heat);
        Self {
            state,
            history,
            in_clamp_episode: false,
            thermal_peaks: 0,
        }
    }

    /// Read the current state as a copy.
    pub const fn current_state(&self) -> PulseSnapshot {
        self.state
    }

    /// Count of thermal-peak episodes since construction.
    pub const fn thermal_peaks(&self) -> u64 {
        self.thermal_peaks
    }

    /// Apply a partial update through the typed mutator.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::NonFinite`] if any supplied value is NaN or
    /// infinite; the state is untouched in that case.
    pub fn update_state(&mut self, update: PulseUpdate) -> Result<UpdateOutcome, PulseError> {
        validate_finite("heat", update.heat)?;
        validate_finite("entropy", update.entropy)?;
        validate_finite("scup", update.scup)?;
        validate_finite("focus", update.focus)?;
        validate_finite("chaos", update.chaos)?;

        let mut clamped = false;
        if let Some(heat) = update.heat {
            clamped = self.state.set_heat(heat);
        }
        if let Some(entropy) = update.entropy {
            self.state.set_entropy(entropy);
        }
        if let Some(scup) = update.scup {
            self.state.set_scup(scup);
        }
        if let Some(focus) = update.focus {
            self.state.set_focus(focus);
        }
        if let Some(chaos) = update.chaos {
            self.state.set_chaos(chaos);
        }
        if let Some(mood) = update.mood {
            self.state.mood = mood;
        }

        if update.heat.is_some() {
            self.record_heat_sample();
        }
        Ok(self.note_clamp(clamped))
    }

    /// Overwrite the full state, e.g. after sigil effects mutated a copy.
    ///
    /// The zone is re-derived and heat is re-clamped, so a snapshot edited
    /// out-of-band cannot smuggle an inconsistent zone back in.
    pub fn apply_snapshot(&mut self, snapshot: PulseSnapshot) -> UpdateOutcome {
        self.state = snapshot;
        let clamped = self.state.set_heat(snapshot.heat);
        self.state.set_entropy(snapshot.entropy);
        self.state.set_scup(snapshot.scup);
        self.state.set_focus(snapshot.focus);
        self.state.set_chaos(snapshot.chaos);
        self.record_heat_sample();
        self.note_clamp(clamped)
    }

    /// Add `delta` degrees of heat (negative deltas cool).
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::NonFinite`] for NaN or infinite deltas.
    pub fn inject_heat(&mut self, delta: f64) -> Result<UpdateOutcome, PulseError> {
        if !delta.is_finite() {
            return Err(PulseError::NonFinite {
                field: "heat_delta",
                value: delta,
            });
        }
        let clamped = self.state.set_heat(self.state.heat + delta);
        self.record_heat_sample();
        Ok(self.note_clamp(clamped))
    }

    /// Drop heat directly to `target`, ending any clamp episode.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::CooldownOutOfRange`] if `target` is not a
    /// finite value in `[0, 100]`.
    pub fn emergency_cooldown(&mut self, target: f64) -> Result<(), PulseError> {
        if !target.is_finite() || !(0.0..=100.0).contains(&target) {
            return Err(PulseError::CooldownOutOfRange { target });
        }
        warn!(from = self.state.heat, to = target, "Emergency cooldown");
        self.state.set_heat(target);
        self.record_heat_sample();
        self.in_clamp_episode = false;
        Ok(())
    }

    /// Record the current heat into the history without mutating state.
    ///
    /// The driver calls this once per tick during the sense phase so the
    /// trend window advances even on quiet ticks.
    pub fn sample(&mut self) {
        self.record_heat_sample();
    }

    /// Trend over the most recent history samples.
    ///
    /// The least-squares slope is compared against a deadband, except that
    /// residual variance around the fitted line above the volatility
    /// threshold wins over slope direction: a sawtooth reads as volatile
    /// even when its net slope is flat, while a steep clean ramp still
    /// reads as rising.
    pub fn trend(&self) -> TrendDirection {
        let len = self.history.len();
        if len < 2 {
            return TrendDirection::Stable;
        }
        let start = len.saturating_sub(TREND_WINDOW);
        let window: Vec<f64> = self.history.iter().skip(start).copied().collect();

        let slope = regression_slope(&window);
        if residual_variance(&window, slope) > VOLATILITY_VARIANCE {
            return TrendDirection::Volatile;
        }

        if slope > TREND_DEADBAND {
            TrendDirection::Rising
        } else if slope < -TREND_DEADBAND {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        }
    }

    /// View of the heat history, oldest first.
    pub fn heat_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    fn record_heat_sample(&mut self) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(self.state.heat);
    }

    fn note_clamp(&mut self, clamped: bool) -> UpdateOutcome {
        if clamped {
            if self.in_clamp_episode {
                return UpdateOutcome { thermal_peak: false };
            }
            self.in_clamp_episode = true;
            self.thermal_peaks = self.thermal_peaks.saturating_add(1);
            debug!(heat = self.state.heat, "Thermal peak: heat clamped at ceiling");
            return UpdateOutcome { thermal_peak: true };
        }
        if self.state.heat < dawn_types::pulse::HEAT_CEILING {
            self.in_clamp_episode = false;
        }
        UpdateOutcome::default()
    }
}

impl Default for PulseController {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_finite(field: &'static str, value: Option<f64>) -> Result<(), PulseError> {
    match value {
        Some(v) if !v.is_finite() => Err(PulseError::NonFinite { field, value: v }),
        _ => Ok(()),
    }
}

/// Mean squared residual of `window` around its fitted trend line.
fn residual_variance(window: &[f64], slope: f64) -> f64 {
    let n = window.len();
    if n < 2 {
        return 0.0;
    }
    let count = u32::try_from(n).map(f64::from).unwrap_or(f64::MAX);
    let mean_x = (count - 1.0) / 2.0;
    let mean_y = window.iter().sum::<f64>() / count;

    let mut sum_sq = 0.0;
    for (i, value) in window.iter().enumerate() {
        let x = u32::try_from(i).map(f64::from).unwrap_or(f64::MAX);
        let fitted = slope.mul_add(x - mean_x, mean_y);
        sum_sq += (value - fitted).powi(2);
    }
    sum_sq / count
}

/// Least-squares slope of `window` against its sample index.
fn regression_slope(window: &[f64]) -> f64 {
    let n = window.len();
    if n < 2 {
        return 0.0;
    }
    let count = u32::try_from(n).map(f64::from).unwrap_or(f64::MAX);
    let mean_x = (count - 1.0) / 2.0;
    let mean_y = window.iter().sum::<f64>() / count;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, value) in window.iter().enumerate() {
        let x = u32::try_from(i).map(f64::from).unwrap_or(f64::MAX);
        numerator += (x - mean_x) * (value - mean_y);
        denominator += (x - mean_x).powi(2);
    }
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use dawn_types::Zone;

    use super::*;

    #[test]
    fn update_sets_fields_and_rederives_zone() {
        let mut pulse = PulseController::new();
        let outcome = pulse.update_state(PulseUpdate {
            heat: Some(72.0),
            entropy: Some(0.85),
            ..PulseUpdate::default()
        });
        assert!(outcome.is_ok());
        let state = pulse.current_state();
        assert_eq!(state.zone, Zone::Critical);
        assert!((state.heat - 72.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nan_update_is_rejected_and_state_untouched() {
        let mut pulse = PulseController::new();
        let result = pulse.update_state(PulseUpdate {
            entropy: Some(f64::NAN),
            ..PulseUpdate::default()
        });
        assert!(result.is_err());
        assert!((pulse.current_state().entropy - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn thermal_peak_fires_once_per_episode() {
        let mut pulse = PulseController::new();

        let first = pulse.inject_heat(200.0).unwrap_or_default();
        assert!(first.thermal_peak);

        // Still pinned at the ceiling: same episode, no second event.
        let second = pulse.inject_heat(50.0).unwrap_or_default();
        assert!(!second.thermal_peak);

        // Drop below the ceiling, then clamp again: new episode.
        let _ = pulse.update_state(PulseUpdate {
            heat: Some(60.0),
            ..PulseUpdate::default()
        });
        let third = pulse.inject_heat(80.0).unwrap_or_default();
        assert!(third.thermal_peak);
        assert_eq!(pulse.thermal_peaks(), 2);
    }

    #[test]
    fn heat_never_exceeds_ceiling() {
        let mut pulse = PulseController::new();
        let _ = pulse.inject_heat(500.0);
        assert!((pulse.current_state().heat - 100.0).abs() < f64::EPSILON);
        let _ = pulse.inject_heat(-300.0);
        assert!(pulse.current_state().heat.abs() < f64::EPSILON);
    }

    #[test]
    fn emergency_cooldown_validates_target() {
        let mut pulse = PulseController::new();
        assert!(pulse.emergency_cooldown(150.0).is_err());
        assert!(pulse.emergency_cooldown(20.0).is_ok());
        assert!((pulse.current_state().heat - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rising_heat_reads_as_rising() {
        let mut pulse = PulseController::new();
        for step in 0..20_u32 {
            let heat = 25.0 + f64::from(step) * 1.5;
            let _ = pulse.update_state(PulseUpdate {
                heat: Some(heat),
                ..PulseUpdate::default()
            });
        }
        assert_eq!(pulse.trend(), TrendDirection::Rising);
    }

    #[test]
    fn falling_heat_reads_as_falling() {
        let mut pulse = PulseController::new();
        for step in 0..20_u32 {
            let heat = 80.0 - f64::from(step) * 1.5;
            let _ = pulse.update_state(PulseUpdate {
                heat: Some(heat),
                ..PulseUpdate::default()
            });
        }
        assert_eq!(pulse.trend(), TrendDirection::Falling);
    }

    #[test]
    fn flat_heat_reads_as_stable() {
        let mut pulse = PulseController::new();
        for _ in 0..20 {
            pulse.sample();
        }
        assert_eq!(pulse.trend(), TrendDirection::Stable);
    }

    #[test]
    fn oscillating_heat_reads_as_volatile() {
        let mut pulse = PulseController::new();
        for step in 0..20_u32 {
            let heat = if step % 2 == 0 { 15.0 } else { 85.0 };
            let _ = pulse.update_state(PulseUpdate {
                heat: Some(heat),
                ..PulseUpdate::default()
            });
        }
        assert_eq!(pulse.trend(), TrendDirection::Volatile);
    }

    #[test]
    fn history_is_bounded() {
        let mut pulse = PulseController::new();
        for _ in 0..200 {
            pulse.sample();
        }
        assert!(pulse.heat_history().count() <= 64);
    }

    #[test]
    fn apply_snapshot_rederives_zone() {
        let mut pulse = PulseController::new();
        let mut snapshot = pulse.current_state();
        snapshot.heat = 65.0;
        snapshot.entropy = 0.82;
        // Deliberately leave a stale zone in the edited copy.
        snapshot.zone = Zone::Calm;
        let _ = pulse.apply_snapshot(snapshot);
        assert_eq!(pulse.current_state().zone, Zone::Critical);
    }
}
