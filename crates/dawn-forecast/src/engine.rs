//! The forecast computation and its sensitivity analysis.
//!
//! Symbolic model, with `c` the passion centrality, `OP` the opportunity
//! level, `ΔA`/`A` the acquaintance delta and total, and `ΔT` the time
//! delta:
//!
//! ```text
//! p  = (c · OP) / ΔA        probability estimate
//! RL = |-1 / ΔT|            reliability via time scaling
//! P  = OP · p · RL          opportunity-adjusted passion
//! F  = P / A                forecast
//! LH = c · OP               limit horizon
//! ```
//!
//! Denominators of zero are replaced by an epsilon, so every output is
//! finite for valid inputs. `F` is strictly increasing in `OP` with all
//! other inputs held fixed.

use serde::Serialize;
use tracing::debug;

use dawn_types::{ConfidenceBand, PulseSnapshot};

use crate::models::{Acquaintance, Passion};

/// Epsilon substituted for zero denominators.
const EPSILON: f64 = 1e-6;

/// Opportunity sweep points for sensitivity analysis.
const OPPORTUNITY_SWEEP: [f64; 5] = [0.1, 0.3, 0.5, 0.7, 0.9];

/// Time-delta sweep points for sensitivity analysis.
const TIME_SWEEP: [f64; 5] = [0.1, 0.5, 1.0, 2.0, 5.0];

/// Errors from forecast computation.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// Opportunity outside `[0, 1]` or non-finite.
    #[error("opportunity {value} outside [0, 1]")]
    OpportunityOutOfRange {
        /// The rejected value.
        value: f64,
    },

    /// Time delta not strictly positive or non-finite.
    #[error("delta time {value} must be positive and finite")]
    NonPositiveDeltaTime {
        /// The rejected value.
        value: f64,
    },
}

/// The five forecast scalars plus their qualitative reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    /// The forecast `F`.
    pub forecast: f64,
    /// Opportunity-adjusted passion `P`.
    pub passion: f64,
    /// Probability estimate `p`.
    pub probability: f64,
    /// Reliability `RL`.
    pub reliability: f64,
    /// Limit horizon `LH`.
    pub limit_horizon: f64,
    /// Qualitative band of `F`.
    pub confidence_band: ConfidenceBand,
    /// Behavior tag derived from passion direction and confidence.
    pub predicted_behavior: String,
}

impl core::fmt::Display for ForecastResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "F={:.3} P={:.3} p={:.3} RL={:.3} LH={:.3}",
            self.forecast, self.passion, self.probability, self.reliability, self.limit_horizon
        )
    }
}

/// One point of a sensitivity sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensitivityPoint {
    /// The swept input value (OP or ΔT).
    pub value: f64,
    /// The forecast at that input.
    pub forecast: f64,
    /// Percent change versus the base forecast.
    pub change_pct: f64,
}

/// Result of sweeping opportunity and time delta around a base point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityAnalysis {
    /// The forecast at the base inputs.
    pub base: ForecastResult,
    /// Forecasts across the opportunity sweep.
    pub opportunity: Vec<SensitivityPoint>,
    /// Forecasts across the time-delta sweep.
    pub time: Vec<SensitivityPoint>,
}

/// Derive the opportunity level from pulse state.
///
/// Higher heat and lower entropy both open opportunity:
/// `OP = (heat/100 + (1 - entropy)) / 2`, a pure function of the snapshot
/// with no reliability cross-terms.
pub fn opportunity_from_pulse(pulse: &PulseSnapshot) -> f64 {
    ((pulse.heat_normalized() + (1.0 - pulse.entropy)) / 2.0).clamp(0.0, 1.0)
}

/// Stateless forecast engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastEngine;

impl ForecastEngine {
    /// Create the engine.
    pub const fn new() -> Self {
        Self
    }

    /// Compute a forecast from the symbolic inputs.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::OpportunityOutOfRange`] or
    /// [`ForecastError::NonPositiveDeltaTime`] for invalid inputs; the
    /// computation itself cannot fail after validation.
    pub fn compute(
        &self,
        passion: &Passion,
        acquaintance: &Acquaintance,
        opportunity: f64,
        delta_time: f64,
    ) -> Result<ForecastResult, ForecastError> {
        if !opportunity.is_finite() || !(0.0..=1.0).contains(&opportunity) {
            return Err(ForecastError::OpportunityOutOfRange { value: opportunity });
        }
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return Err(ForecastError::NonPositiveDeltaTime { value: delta_time });
        }

        let c = passion.centrality();
        let delta_a = guard_denominator(acquaintance.delta());
        let total_a = guard_denominator(acquaintance.total());

        let probability = (c * opportunity) / delta_a;
        let reliability = (-1.0 / delta_time).abs();
        let adjusted_passion = opportunity * probability * reliability;
        let forecast = adjusted_passion / total_a;
        let limit_horizon = c * opportunity;

        let confidence_band = ConfidenceBand::from_forecast(forecast);
        let predicted_behavior =
            behavior_tag(&passion.direction, confidence_band, probability, reliability);

        debug!(
            forecast,
            probability, reliability, limit_horizon, "Forecast computed"
        );

        Ok(ForecastResult {
            forecast,
            passion: adjusted_passion,
            probability,
            reliability,
            limit_horizon,
            confidence_band,
            predicted_behavior,
        })
    }

    /// Sweep opportunity and time delta around a base point and report the
    /// percent change in `F` at each sweep value.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from the base computation.
    pub fn analyze_sensitivity(
        &self,
        passion: &Passion,
        acquaintance: &Acquaintance,
        base_opportunity: f64,
        base_delta_time: f64,
    ) -> Result<SensitivityAnalysis, ForecastError> {
        let base = self.compute(passion, acquaintance, base_opportunity, base_delta_time)?;

        let opportunity = OPPORTUNITY_SWEEP
            .iter()
            .filter_map(|&op| {
                self.compute(passion, acquaintance, op, base_delta_time)
                    .ok()
                    .map(|r| sensitivity_point(op, r.forecast, base.forecast))
            })
            .collect();

        let time = TIME_SWEEP
            .iter()
            .filter_map(|&dt| {
                self.compute(passion, acquaintance, base_opportunity, dt)
                    .ok()
                    .map(|r| sensitivity_point(dt, r.forecast, base.forecast))
            })
            .collect();

        Ok(SensitivityAnalysis {
            base,
            opportunity,
            time,
        })
    }
}

/// Replace a zero denominator with epsilon, leaving other values alone.
fn guard_denominator(value: f64) -> f64 {
    if value.abs() < EPSILON { EPSILON } else { value }
}

fn sensitivity_point(value: f64, forecast: f64, base_forecast: f64) -> SensitivityPoint {
    let change_pct = if base_forecast.abs() < EPSILON {
        0.0
    } else {
        ((forecast - base_forecast) / base_forecast) * 100.0
    };
    SensitivityPoint {
        value,
        forecast,
        change_pct,
    }
}

/// Compose the predicted-behavior tag from direction and confidence.
fn behavior_tag(
    direction: &str,
    band: ConfidenceBand,
    probability: f64,
    reliability: f64,
) -> String {
    let base = format!("{}_pursue_{direction}", band.adverb());
    if probability > 0.6 && reliability > 0.5 {
        format!("confidently_{base}")
    } else if probability < 0.3 || reliability < 0.3 {
        format!("uncertainly_{base}")
    } else {
        base
    }
}
