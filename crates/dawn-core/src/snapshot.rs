//! The read-only snapshot handed to external collaborators.
//!
//! GUIs, TUIs, and other peripherals consume the core exclusively through
//! this value: a copy of the current pulse, the entropy window summary,
//! the active sigils, the last forecast, and the most recent narration.
//! Consumers never mutate; the driver produces a fresh snapshot after
//! each tick.

use serde::Serialize;

use dawn_forecast::ForecastResult;
use dawn_memory::RouterStats;
use dawn_pulse::EntropySummary;
use dawn_types::{PulseSnapshot, TrendDirection};

use crate::pressure::PressureSnapshot;

/// Read-only view of the core after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CoreSnapshot {
    /// The last completed tick number.
    pub tick: u64,
    /// Current pulse state.
    pub pulse: PulseSnapshot,
    /// Heat trend over the recent history.
    pub heat_trend: TrendDirection,
    /// Entropy window summary.
    pub entropy: EntropySummary,
    /// Names of the currently active sigils.
    pub active_sigils: Vec<String>,
    /// The most recent forecast, if one completed.
    pub last_forecast: Option<ForecastResult>,
    /// The most recent pressure assessment.
    pub pressure: PressureSnapshot,
    /// Router counters and tier sizes.
    pub memory: RouterStats,
    /// The most recent commentary line.
    pub commentary: String,
    /// The most recent reflection, if any.
    pub reflection: Option<String>,
}
