//! The cognitive tick core: driver, cadence, pressure, and triggers.
//!
//! This crate wires the sensor, memory, forecast, sigil, and event crates
//! into the seven-phase tick loop:
//!
//! 1. **Sense** -- poll pulse and entropy, build the tick's read snapshot.
//! 2. **Assess** -- compute cognitive pressure and run reflex interventions.
//! 3. **Forecast** -- derive passion/acquaintance and compute the forecast.
//! 4. **Regulate** -- apply the rule table, registering at most one sigil
//!    per rule.
//! 5. **Narrate** -- commentary, reflection, rebloom evaluation, extended
//!    forecast.
//! 6. **Record** -- store the tick memory, emit events, persist, verify
//!    invariants.
//! 7. **Schedule** -- compute the next adaptive interval.
//!
//! The [`TickDriver`] exclusively owns all mutable subsystem state; phases
//! read a consistent snapshot and write through typed mutators. Phase
//! failures are recovered locally (`actions_taken: ["error_recovery"]`);
//! only invariant violations escalate.
//!
//! [`TickDriver`]: tick::TickDriver

pub mod adaptive;
pub mod config;
pub mod pressure;
pub mod reflex;
pub mod runner;
pub mod snapshot;
pub mod tick;
pub mod triggers;

pub use adaptive::{AdaptiveMetrics, AdaptiveTickController};
pub use config::{ConfigError, DawnConfig, RunProfile};
pub use pressure::{PressureAlert, PressureEngine, PressureSnapshot};
pub use reflex::{ReflexExecutor, ReflexResult, ReflexStatus};
pub use runner::{
    EndReason, NoOpCallback, RunBounds, RunSummary, TickCallback, log_run_end, run_loop,
};
pub use snapshot::CoreSnapshot;
pub use tick::{CoreError, PhaseTimings, TickDriver, TickResponse};
pub use triggers::{RebloomEvent, evaluate_reblooms, generate_commentary, generate_reflection};
