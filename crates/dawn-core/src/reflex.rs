//! The reflex executor: reversible high-level interventions.
//!
//! Reflexes are the blunt instruments the driver reaches for when
//! pressure classification says the loop itself is the problem: slow the
//! tick, refuse new blooms, drain the sigil ring. Each command reports a
//! structured result; `slow_tick` and `suppress_rebloom` are reversible
//! through [`ReflexExecutor::restore_normal_operation`], which returns the
//! cadence to its pre-intervention base.

use serde::Serialize;
use tracing::{info, warn};

use dawn_pulse::{PulseController, PulseUpdate};
use dawn_sigils::SigilEngine;
use dawn_sigils::engine::DecayedSigil;

use crate::adaptive::AdaptiveTickController;

/// Execution status of one reflex command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflexStatus {
    /// The command ran.
    Success,
    /// The command name was not recognized.
    UnknownCommand,
}

/// Structured result of one reflex command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflexResult {
    /// The command as given.
    pub command: String,
    /// Whether it ran.
    pub status: ReflexStatus,
    /// Machine-readable action tag.
    pub action: &'static str,
    /// Human-readable outcome.
    pub message: String,
    /// Sigils drained by a prune, for the driver's decay events.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pruned: Vec<DecayedSigil>,
}

/// Executes reflex commands and remembers how to undo them.
#[derive(Debug, Clone, Default)]
pub struct ReflexExecutor {
    saved_base_interval: Option<f64>,
    rebloom_suppressed: bool,
}

impl ReflexExecutor {
    /// Create an executor with no interventions active.
    pub const fn new() -> Self {
        Self {
            saved_base_interval: None,
            rebloom_suppressed: false,
        }
    }

    /// Whether the post-tick rebloom trigger must refuse new blooms.
    pub const fn rebloom_suppressed(&self) -> bool {
        self.rebloom_suppressed
    }

    /// Whether any reversible intervention is currently active.
    pub const fn intervention_active(&self) -> bool {
        self.saved_base_interval.is_some() || self.rebloom_suppressed
    }

    /// Execute a batch of commands in order.
    ///
    /// Unknown commands produce an `unknown_command` result and do not
    /// abort the batch.
    pub fn execute(
        &mut self,
        commands: &[String],
        cadence: &mut AdaptiveTickController,
        pulse: &mut PulseController,
        sigils: &mut SigilEngine,
        tick: u64,
    ) -> Vec<ReflexResult> {
        commands
            .iter()
            .map(|cmd| match cmd.as_str() {
                "slow_tick" => self.slow_tick(cadence, pulse),
                "suppress_rebloom" => self.suppress_rebloom(),
                "prune_sigils" | "clear_sigil_ring" => Self::prune_sigils(cmd, sigils, tick),
                other => {
                    warn!(command = other, "Unknown reflex command");
                    ReflexResult {
                        command: String::from(other),
                        status: ReflexStatus::UnknownCommand,
                        action: "none",
                        message: format!("Unknown command: {other}"),
                        pruned: Vec::new(),
                    }
                }
            })
            .collect()
    }

    /// Undo the reversible interventions.
    pub fn restore_normal_operation(
        &mut self,
        cadence: &mut AdaptiveTickController,
    ) -> ReflexResult {
        let mut restored = Vec::new();
        if let Some(saved) = self.saved_base_interval.take() {
            cadence.set_base_interval(saved);
            restored.push("tick_rate");
        }
        if self.rebloom_suppressed {
            self.rebloom_suppressed = false;
            restored.push("rebloom");
        }
        info!(?restored, "Normal operation restored");
        ReflexResult {
            command: String::from("restore_normal_operation"),
            status: ReflexStatus::Success,
            action: "normal_operation_restored",
            message: format!("restored: {}", restored.join(", ")),
            pruned: Vec::new(),
        }
    }

    fn slow_tick(
        &mut self,
        cadence: &mut AdaptiveTickController,
        pulse: &mut PulseController,
    ) -> ReflexResult {
        if self.saved_base_interval.is_none() {
            self.saved_base_interval = Some(cadence.base_interval());
        }
        let doubled = cadence.base_interval() * 2.0;
        cadence.set_base_interval(doubled);

        // Cool heat by 30% alongside the cadence change.
        let cooled = pulse.current_state().heat * 0.7;
        if let Err(err) = pulse.update_state(PulseUpdate {
            heat: Some(cooled),
            ..PulseUpdate::default()
        }) {
            warn!(%err, "Slow-tick cooldown failed");
        }

        info!(base_interval = cadence.base_interval(), "Tick slowed");
        ReflexResult {
            command: String::from("slow_tick"),
            status: ReflexStatus::Success,
            action: "tick_slowed",
            message: String::from("Tick processing rate reduced for system stability"),
            pruned: Vec::new(),
        }
    }

    fn suppress_rebloom(&mut self) -> ReflexResult {
        self.rebloom_suppressed = true;
        info!("Rebloom suppression activated");
        ReflexResult {
            command: String::from("suppress_rebloom"),
            status: ReflexStatus::Success,
            action: "rebloom_blocked",
            message: String::from("Rebloom evaluation suppressed for system protection"),
            pruned: Vec::new(),
        }
    }

    fn prune_sigils(command: &str, sigils: &mut SigilEngine, tick: u64) -> ReflexResult {
        let pruned = sigils.prune_all(tick);
        let count = pruned.len();
        ReflexResult {
            command: String::from(command),
            status: ReflexStatus::Success,
            action: "sigils_cleared",
            message: format!("Sigil ring cleared - removed {count} sigils"),
            pruned,
        }
    }
}

#[cfg(test)]
mod tests {
    use dawn_types::PulseSnapshot;

    use super::*;

    fn cadence() -> AdaptiveTickController {
        AdaptiveTickController::new(2.0, 0.1, 10.0, 0.5)
    }

    fn commands(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| String::from(*s)).collect()
    }

    #[test]
    fn slow_tick_doubles_base_and_cools() {
        let mut executor = ReflexExecutor::new();
        let mut ctl = cadence();
        let mut pulse = PulseController::new();
        let _ = pulse.update_state(PulseUpdate {
            heat: Some(50.0),
            ..PulseUpdate::default()
        });
        let mut sigils = SigilEngine::new();

        let results = executor.execute(&commands(&["slow_tick"]), &mut ctl, &mut pulse, &mut sigils, 1);
        assert_eq!(results.len(), 1);
        assert!(results.first().is_some_and(|r| r.status == ReflexStatus::Success));
        assert!((ctl.base_interval() - 4.0).abs() < f64::EPSILON);
        assert!((pulse.current_state().heat - 35.0).abs() < 1e-9);
    }

    #[test]
    fn restore_returns_to_pre_intervention_interval() {
        let mut executor = ReflexExecutor::new();
        let mut ctl = cadence();
        let mut pulse = PulseController::new();
        let mut sigils = SigilEngine::new();

        let _ = executor.execute(&commands(&["slow_tick"]), &mut ctl, &mut pulse, &mut sigils, 1);
        assert!((ctl.base_interval() - 4.0).abs() < f64::EPSILON);

        let result = executor.restore_normal_operation(&mut ctl);
        assert_eq!(result.action, "normal_operation_restored");
        assert!((ctl.base_interval() - 2.0).abs() < f64::EPSILON);
        assert!(!executor.intervention_active());
    }

    #[test]
    fn repeated_slow_tick_restores_to_original() {
        let mut executor = ReflexExecutor::new();
        let mut ctl = cadence();
        let mut pulse = PulseController::new();
        let mut sigils = SigilEngine::new();

        let _ = executor.execute(&commands(&["slow_tick", "slow_tick"]), &mut ctl, &mut pulse, &mut sigils, 1);
        assert!((ctl.base_interval() - 8.0).abs() < f64::EPSILON);
        let _ = executor.restore_normal_operation(&mut ctl);
        // The first saved value wins, not the doubled one.
        assert!((ctl.base_interval() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn suppress_rebloom_sets_flag_until_restore() {
        let mut executor = ReflexExecutor::new();
        let mut ctl = cadence();
        let mut pulse = PulseController::new();
        let mut sigils = SigilEngine::new();

        assert!(!executor.rebloom_suppressed());
        let _ = executor.execute(&commands(&["suppress_rebloom"]), &mut ctl, &mut pulse, &mut sigils, 1);
        assert!(executor.rebloom_suppressed());

        let _ = executor.restore_normal_operation(&mut ctl);
        assert!(!executor.rebloom_suppressed());
    }

    #[test]
    fn prune_drains_sigils_and_reports_them() {
        let mut executor = ReflexExecutor::new();
        let mut ctl = cadence();
        let mut pulse = PulseController::new();
        let mut sigils = SigilEngine::new();
        let mut snapshot = pulse.current_state();
        let _ = sigils.register("EXPLORATION_MODE", "test", 1, &mut snapshot);
        let _ = sigils.register("ENTROPY_REGULATION", "test", 1, &mut snapshot);

        let results = executor.execute(&commands(&["prune_sigils"]), &mut ctl, &mut pulse, &mut sigils, 2);
        let pruned = results.first().map(|r| r.pruned.len()).unwrap_or_default();
        assert_eq!(pruned, 2);
        assert_eq!(sigils.active_count(), 0);
    }

    #[test]
    fn clear_sigil_ring_is_an_alias() {
        let mut executor = ReflexExecutor::new();
        let mut ctl = cadence();
        let mut pulse = PulseController::new();
        let mut sigils = SigilEngine::new();
        let results = executor.execute(&commands(&["clear_sigil_ring"]), &mut ctl, &mut pulse, &mut sigils, 1);
        assert!(results.first().is_some_and(|r| r.action == "sigils_cleared"));
    }

    #[test]
    fn unknown_command_reports_without_aborting() {
        let mut executor = ReflexExecutor::new();
        let mut ctl = cadence();
        let mut pulse = PulseController::new();
        let mut sigils = SigilEngine::new();

        let results = executor.execute(
            &commands(&["transcend_substrate", "slow_tick"]),
            &mut ctl,
            &mut pulse,
            &mut sigils,
            1,
        );
        assert_eq!(results.len(), 2);
        assert!(results.first().is_some_and(|r| r.status == ReflexStatus::UnknownCommand));
        assert!(results.get(1).is_some_and(|r| r.status == ReflexStatus::Success));
    }
}
