//! Adaptive tick cadence.
//!
//! The controller maps four normalized inputs to the next tick interval:
//! entropy, normalized heat, and system pressure shorten the interval
//! (urgency); cognitive load lengthens it (drag). The response is a
//! smoothed proportional factor applied to the base interval, clamped to
//! the configured floor and ceiling -- and it is monotone in each input
//! with the others held fixed.

use serde::Serialize;
use tracing::debug;

/// Weight of entropy in the urgency term.
const URGENCY_ENTROPY: f64 = 0.45;

/// Weight of system pressure in the urgency term.
const URGENCY_PRESSURE: f64 = 0.25;

/// Weight of normalized heat in the urgency term.
const URGENCY_HEAT: f64 = 0.30;

/// Bounds on the speed factor so one wild input cannot pin the cadence.
const FACTOR_FLOOR: f64 = 0.25;
const FACTOR_CEILING: f64 = 4.0;

/// Per-tick cadence metrics reported in the tick response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveMetrics {
    /// The computed next interval, in seconds.
    pub interval_secs: f64,
    /// Base interval divided by the computed interval.
    pub speed_factor: f64,
    /// Cognitive load input (tick duration / interval, clipped).
    pub cognitive_load: f64,
    /// System pressure input (actions + sigils, normalized and clipped).
    pub system_pressure: f64,
    /// Dominant driver of this adaptation.
    pub reason: &'static str,
}

/// Computes the next tick interval from load, pressure, entropy, and heat.
#[derive(Debug, Clone)]
pub struct AdaptiveTickController {
    base_interval: f64,
    min_interval: f64,
    max_interval: f64,
    sensitivity: f64,
}

impl AdaptiveTickController {
    /// Create a controller over the given interval bounds.
    pub const fn new(
        base_interval: f64,
        min_interval: f64,
        max_interval: f64,
        sensitivity: f64,
    ) -> Self {
        Self {
            base_interval,
            min_interval,
            max_interval,
            sensitivity,
        }
    }

    /// The current base interval, in seconds.
    pub const fn base_interval(&self) -> f64 {
        self.base_interval
    }

    /// Replace the base interval (reflex interventions use this), clamped
    /// to the configured bounds.
    pub fn set_base_interval(&mut self, secs: f64) {
        self.base_interval = secs.clamp(self.min_interval, self.max_interval);
    }

    /// The interval floor.
    pub const fn min_interval(&self) -> f64 {
        self.min_interval
    }

    /// The interval ceiling.
    pub const fn max_interval(&self) -> f64 {
        self.max_interval
    }

    /// Compute the next interval.
    ///
    /// All inputs are expected in `[0, 1]`; they are clipped here so a
    /// misbehaving caller cannot push the interval out of bounds. Returns
    /// the interval together with the inputs and the dominant reason.
    pub fn calculate(
        &self,
        entropy: f64,
        heat_normalized: f64,
        cognitive_load: f64,
        system_pressure: f64,
    ) -> AdaptiveMetrics {
        let entropy = entropy.clamp(0.0, 1.0);
        let heat = heat_normalized.clamp(0.0, 1.0);
        let load = cognitive_load.clamp(0.0, 1.0);
        let pressure = system_pressure.clamp(0.0, 1.0);

        let urgency = URGENCY_ENTROPY * entropy + URGENCY_PRESSURE * pressure + URGENCY_HEAT * heat;
        let factor = self
            .sensitivity
            .mul_add(urgency - load, 1.0)
            .clamp(FACTOR_FLOOR, FACTOR_CEILING);
        let interval = (self.base_interval / factor).clamp(self.min_interval, self.max_interval);

        let reason = dominant_reason(entropy, heat, load, pressure);
        debug!(interval, factor, reason, "Adaptive interval computed");

        AdaptiveMetrics {
            interval_secs: interval,
            speed_factor: self.base_interval / interval,
            cognitive_load: load,
            system_pressure: pressure,
            reason,
        }
    }
}

/// Name the input contributing most to the adaptation.
fn dominant_reason(entropy: f64, heat: f64, load: f64, pressure: f64) -> &'static str {
    let entropy_term = URGENCY_ENTROPY * entropy;
    let heat_term = URGENCY_HEAT * heat;
    let pressure_term = URGENCY_PRESSURE * pressure;
    let max_urgency = entropy_term.max(heat_term).max(pressure_term);

    if load > max_urgency && load > 0.2 {
        "load_drag"
    } else if max_urgency < 0.1 {
        "baseline"
    } else if (entropy_term - max_urgency).abs() < f64::EPSILON {
        "entropy_drive"
    } else if (heat_term - max_urgency).abs() < f64::EPSILON {
        "thermal_drive"
    } else {
        "pressure_drive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AdaptiveTickController {
        AdaptiveTickController::new(2.0, 0.1, 10.0, 0.5)
    }

    #[test]
    fn quiet_inputs_hold_the_base_interval() {
        let metrics = controller().calculate(0.0, 0.0, 0.0, 0.0);
        assert!((metrics.interval_secs - 2.0).abs() < f64::EPSILON);
        assert_eq!(metrics.reason, "baseline");
    }

    #[test]
    fn entropy_shortens_the_interval() {
        let calm = controller().calculate(0.1, 0.2, 0.0, 0.0);
        let chaotic = controller().calculate(0.9, 0.2, 0.0, 0.0);
        assert!(chaotic.interval_secs < calm.interval_secs);
    }

    #[test]
    fn load_lengthens_the_interval() {
        let idle = controller().calculate(0.3, 0.2, 0.0, 0.1);
        let loaded = controller().calculate(0.3, 0.2, 1.0, 0.1);
        assert!(loaded.interval_secs > idle.interval_secs);
        assert_eq!(loaded.reason, "load_drag");
    }

    #[test]
    fn monotone_in_each_input() {
        let ctl = controller();
        // Entropy: higher -> shorter (weakly, because of clamping).
        let mut previous = f64::INFINITY;
        for step in 0..=10_u32 {
            let entropy = f64::from(step) / 10.0;
            let interval = ctl.calculate(entropy, 0.3, 0.4, 0.3).interval_secs;
            assert!(interval <= previous + 1e-12);
            previous = interval;
        }
        // Pressure: higher -> shorter.
        let low = ctl.calculate(0.4, 0.3, 0.4, 0.1).interval_secs;
        let high = ctl.calculate(0.4, 0.3, 0.4, 0.9).interval_secs;
        assert!(high <= low);
        // Heat: higher -> shorter.
        let cool = ctl.calculate(0.4, 0.1, 0.4, 0.3).interval_secs;
        let hot = ctl.calculate(0.4, 0.9, 0.4, 0.3).interval_secs;
        assert!(hot <= cool);
        // Load: higher -> longer.
        let light = ctl.calculate(0.4, 0.3, 0.1, 0.3).interval_secs;
        let heavy = ctl.calculate(0.4, 0.3, 0.9, 0.3).interval_secs;
        assert!(heavy >= light);
    }

    #[test]
    fn interval_always_within_bounds() {
        let ctl = controller();
        for entropy in [0.0, 0.5, 1.0] {
            for load in [0.0, 0.5, 1.0] {
                let m = ctl.calculate(entropy, 1.0, load, 1.0);
                assert!(m.interval_secs >= 0.1);
                assert!(m.interval_secs <= 10.0);
            }
        }
        // Out-of-range inputs are clipped, not propagated.
        let wild = ctl.calculate(50.0, -3.0, 99.0, f64::MAX);
        assert!(wild.interval_secs >= 0.1 && wild.interval_secs <= 10.0);
    }

    #[test]
    fn set_base_interval_clamps_to_bounds() {
        let mut ctl = controller();
        ctl.set_base_interval(25.0);
        assert!((ctl.base_interval() - 10.0).abs() < f64::EPSILON);
        ctl.set_base_interval(4.0);
        assert!((ctl.base_interval() - 4.0).abs() < f64::EPSILON);
    }
}
