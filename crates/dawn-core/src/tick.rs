//! The seven-phase tick driver.
//!
//! [`TickDriver`] owns every mutable subsystem and runs the fixed phase
//! sequence: sense, assess, forecast, regulate, narrate, record, schedule.
//! Within a tick, every phase sees the writes of the phases before it;
//! across ticks, the previous tick's outputs become the next tick's
//! sensor readings. There is no cycle inside a tick.
//!
//! Failure policy: phase-local errors are recovered in place and show up
//! as `"error_recovery"` in the response's action list. Only invariant
//! violations (tier capacity without eviction, event-log tick regression)
//! escalate as [`CoreError`] -- the driver's caller logs, flushes, and
//! exits with code 4.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use dawn_events::{EventLog, EventLogError, EventPayload, EventSink, SigilAction, StatePayload};
use dawn_forecast::{
    Acquaintance, ForecastEngine, ForecastResult, Passion, derive_acquaintance, derive_passion,
    opportunity_from_pulse,
};
use dawn_memory::{LoaderError, MemoryLoader, MemoryRouter, RouterConfig, RouterError};
use dawn_pulse::{EntropyAnalyzer, EntropyReading, PulseController};
use dawn_sigils::{Registration, SigilDirective, SigilEngine};
use dawn_types::{MemoryChunk, MemoryId, PressureLevel, PulseSnapshot, Speaker, Zone};

use crate::adaptive::{AdaptiveMetrics, AdaptiveTickController};
use crate::config::DawnConfig;
use crate::pressure::{PressureEngine, PressureSnapshot};
use crate::reflex::ReflexExecutor;
use crate::snapshot::CoreSnapshot;
use crate::triggers::{
    RebloomEvent, evaluate_reblooms, extended_passion_tag, generate_commentary,
    generate_reflection,
};

/// Unsaved-memory depth at which backpressure starts lengthening ticks.
const UNSAVED_BACKPRESSURE_FLOOR: usize = 512;

/// Persistence attempts during shutdown.
const SHUTDOWN_PERSIST_ATTEMPTS: u32 = 3;

/// Fatal errors: invariant violations only.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A memory tier exceeded its capacity without eviction.
    #[error("invariant violation: {source}")]
    RouterInvariant {
        /// The underlying router error.
        #[from]
        source: RouterError,
    },

    /// Event-log tick numbers regressed.
    #[error("invariant violation: {source}")]
    EventOrdering {
        /// The underlying event-log error.
        #[from]
        source: EventLogError,
    },
}

/// Wall-clock spent in each phase, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTimings {
    /// Sense phase.
    pub sense_ms: u64,
    /// Assess phase.
    pub assess_ms: u64,
    /// Forecast phase.
    pub forecast_ms: u64,
    /// Regulate phase.
    pub regulate_ms: u64,
    /// Narrate phase.
    pub narrate_ms: u64,
    /// Record phase.
    pub record_ms: u64,
    /// Schedule phase.
    pub schedule_ms: u64,
}

/// Rolling performance counters reported with every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceCounters {
    /// Ticks completed since start.
    pub total_ticks: u64,
    /// Mean tick duration in milliseconds.
    pub average_tick_ms: f64,
    /// Entropy warnings observed.
    pub entropy_spikes: u64,
    /// Sigil activations (including cascades).
    pub sigils_triggered: u64,
    /// Rebloom events raised.
    pub reblooms_triggered: u64,
    /// Reflections generated.
    pub reflections_generated: u64,
    /// Forecasts computed (standard and extended).
    pub forecasts_computed: u64,
    /// Persistence attempts that failed and were requeued.
    pub persistence_failures: u64,
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickResponse {
    /// The tick number (1-based).
    pub tick_number: u64,
    /// Wall-clock start of the tick.
    pub timestamp: DateTime<Utc>,
    /// Total tick duration in milliseconds.
    pub duration_ms: u64,
    /// Per-phase timings.
    pub phase_timings: PhaseTimings,
    /// Pulse state at the end of the tick.
    pub system_state: PulseSnapshot,
    /// The entropy reading taken during sense, when it succeeded.
    pub entropy_reading: Option<EntropyReading>,
    /// The pressure assessment.
    pub pressure: PressureSnapshot,
    /// The forecast, when phase 3 succeeded.
    pub forecast: Option<ForecastResult>,
    /// Action tags accumulated across phases.
    pub actions_taken: Vec<String>,
    /// Active sigil names at the end of the tick.
    pub active_sigils: Vec<String>,
    /// The tick's commentary line.
    pub commentary: String,
    /// The tick's reflection, when one was generated.
    pub reflection: Option<String>,
    /// Rebloom events raised by the post-tick evaluator.
    pub rebloom_events: Vec<RebloomEvent>,
    /// Cadence metrics for the next tick.
    pub adaptive: AdaptiveMetrics,
    /// Phases that overran the soft budget.
    pub degraded_phases: Vec<&'static str>,
    /// Rolling counters.
    pub performance: PerformanceCounters,
}

/// Result of a graceful shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Memories persisted during the final flush.
    pub persisted_memories: usize,
    /// Memories that could not be persisted after retries.
    pub persist_failures: usize,
    /// Total events in the in-memory log.
    pub total_events: usize,
}

/// Explicit forecast inputs for operator-driven ticks.
#[derive(Debug, Clone)]
struct ForecastInputs {
    passion: Passion,
    acquaintance: Acquaintance,
    opportunity: f64,
    delta_time: f64,
}

/// The cognitive tick driver.
///
/// Owns all subsystem state; external collaborators read through
/// [`CoreSnapshot`] only.
#[derive(Debug)]
pub struct TickDriver {
    config: DawnConfig,
    pulse: PulseController,
    entropy: EntropyAnalyzer,
    router: MemoryRouter,
    loader: MemoryLoader,
    forecast_engine: ForecastEngine,
    sigils: SigilEngine,
    pressure: PressureEngine,
    reflex: ReflexExecutor,
    adaptive: AdaptiveTickController,
    log: EventLog,
    tick_count: u64,
    next_interval: f64,
    last_tick_activations: u64,
    total_duration_ms: f64,
    metrics: PerformanceCounters,
    last_forecast: Option<ForecastResult>,
    last_pressure: PressureSnapshot,
    last_commentary: String,
    last_reflection: Option<String>,
}

impl TickDriver {
    /// Build a driver without event persistence.
    pub fn new(config: DawnConfig) -> Self {
        Self::build(config, None)
    }

    /// Build a driver that forwards events to a background writer.
    pub fn with_event_sink(config: DawnConfig, sink: EventSink) -> Self {
        Self::build(config, Some(sink))
    }

    fn build(config: DawnConfig, sink: Option<EventSink>) -> Self {
        let router = MemoryRouter::with_config(RouterConfig {
            max_memories: config.memory.max_memories,
            importance_threshold: config.memory.importance_threshold,
            ..RouterConfig::default()
        });
        let loader = MemoryLoader::new(config.memory.path.clone());
        let adaptive = AdaptiveTickController::new(
            config.tick.base_interval_secs,
            config.tick.min_interval_secs,
            config.tick.max_interval_secs,
            config.tick.adaptation_sensitivity,
        );
        let next_interval = config.tick.base_interval_secs;
        let log = sink.map_or_else(EventLog::new, EventLog::with_sink);

        Self {
            pressure: PressureEngine::new(config.pressure.clone()),
            config,
            pulse: PulseController::new(),
            entropy: EntropyAnalyzer::new(),
            router,
            loader,
            forecast_engine: ForecastEngine::new(),
            sigils: SigilEngine::new(),
            reflex: ReflexExecutor::new(),
            adaptive,
            log,
            tick_count: 0,
            next_interval,
            last_tick_activations: 0,
            total_duration_ms: 0.0,
            metrics: PerformanceCounters::default(),
            last_forecast: None,
            last_pressure: PressureSnapshot::default(),
            last_commentary: String::new(),
            last_reflection: None,
        }
    }

    /// Execute one tick with contextually derived forecast inputs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] only on invariant violations; all other
    /// failures are recovered within the tick.
    pub fn tick(&mut self) -> Result<TickResponse, CoreError> {
        self.tick_inner(None)
    }

    /// Execute one tick with explicit forecast inputs, bypassing the
    /// contextual derivation (operator and test surface).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] only on invariant violations.
    pub fn tick_with_forecast_inputs(
        &mut self,
        passion: Passion,
        acquaintance: Acquaintance,
        opportunity: f64,
        delta_time: f64,
    ) -> Result<TickResponse, CoreError> {
        self.tick_inner(Some(ForecastInputs {
            passion,
            acquaintance,
            opportunity,
            delta_time,
        }))
    }

    #[allow(clippy::too_many_lines)]
    fn tick_inner(&mut self, inputs: Option<ForecastInputs>) -> Result<TickResponse, CoreError> {
        let tick_start = Instant::now();
        let timestamp = Utc::now();
        self.tick_count = self.tick_count.saturating_add(1);
        let tick = self.tick_count;
        self.metrics.total_ticks = tick;

        let budget = Duration::from_millis(self.config.tick.phase_budget_ms);
        let mut timings = PhaseTimings::default();
        let mut degraded: Vec<&'static str> = Vec::new();
        let mut actions: Vec<String> = Vec::new();

        // --- Phase 1: Sense ---
        let phase = Instant::now();
        for decayed in self.sigils.begin_tick(tick) {
            self.log.append(
                tick,
                EventPayload::Sigil {
                    name: decayed.name,
                    action: SigilAction::Decayed,
                    source: String::from("decay"),
                },
            )?;
        }
        self.pulse.sample();
        let sensed = self.pulse.current_state();
        let entropy_reading = match self.entropy.analyze(sensed.entropy) {
            Ok(reading) => {
                if reading.warning_triggered {
                    self.metrics.entropy_spikes = self.metrics.entropy_spikes.saturating_add(1);
                }
                Some(reading)
            }
            Err(err) => {
                warn!(%err, "Entropy analysis failed; recovering");
                push_once(&mut actions, "error_recovery");
                None
            }
        };
        timings.sense_ms = phase_elapsed(phase, budget, "sense", &mut degraded);

        // --- Phase 2: Assess pressure ---
        let phase = Instant::now();
        self.pressure.begin_tick(self.last_tick_activations);
        let pressure = self.pressure.assess(&sensed);
        if pressure.level >= PressureLevel::Critical && !self.reflex.intervention_active() {
            let commands = vec![String::from("slow_tick"), String::from("suppress_rebloom")];
            let results = self.reflex.execute(
                &commands,
                &mut self.adaptive,
                &mut self.pulse,
                &mut self.sigils,
                tick,
            );
            for result in &results {
                debug!(command = %result.command, action = result.action, "Reflex executed");
            }
            actions.push(String::from("reflex_slow_tick"));
        } else if pressure.level <= PressureLevel::Normal && self.reflex.intervention_active() {
            let _ = self.reflex.restore_normal_operation(&mut self.adaptive);
            actions.push(String::from("reflex_restored"));
        }
        timings.assess_ms = phase_elapsed(phase, budget, "assess", &mut degraded);

        // --- Phase 3: Forecast ---
        let phase = Instant::now();
        let pre_forecast = self.pulse.current_state();
        let latest = self.router.latest();
        let forecast = {
            let (passion, acquaintance, opportunity, delta_time) = match inputs {
                Some(explicit) => (
                    explicit.passion,
                    explicit.acquaintance,
                    explicit.opportunity,
                    explicit.delta_time,
                ),
                None => {
                    let stub;
                    let latest_ref = match latest.as_deref() {
                        Some(chunk) => Some(chunk),
                        None => {
                            stub = contextual_stub(&pre_forecast);
                            Some(&stub)
                        }
                    };
                    (
                        derive_passion(latest_ref, &pre_forecast),
                        derive_acquaintance(&pre_forecast, tick),
                        opportunity_from_pulse(&pre_forecast),
                        self.next_interval,
                    )
                }
            };
            match self
                .forecast_engine
                .compute(&passion, &acquaintance, opportunity, delta_time)
            {
                Ok(result) => {
                    self.metrics.forecasts_computed =
                        self.metrics.forecasts_computed.saturating_add(1);
                    Some(result)
                }
                Err(err) => {
                    warn!(%err, "Forecast failed; recovering");
                    push_once(&mut actions, "error_recovery");
                    None
                }
            }
        };
        let confidence = forecast.as_ref().map_or(0.5, |f| f.forecast);
        timings.forecast_ms = phase_elapsed(phase, budget, "forecast", &mut degraded);

        // --- Phase 4: Regulate ---
        let phase = Instant::now();
        self.regulate(tick, &pre_forecast, confidence, &mut actions)?;
        timings.regulate_ms = phase_elapsed(phase, budget, "regulate", &mut degraded);

        // --- Phase 5: Narrate ---
        let phase = Instant::now();
        let post_pulse = self.pulse.current_state();
        let commentary = generate_commentary(&post_pulse, confidence, tick);
        let reflection = generate_reflection(&post_pulse, tick);
        self.metrics.reflections_generated =
            self.metrics.reflections_generated.saturating_add(1);
        self.log.append(
            tick,
            EventPayload::Reflection {
                text: reflection.clone(),
            },
        )?;

        let rebloom_events = if self.reflex.rebloom_suppressed() {
            Vec::new()
        } else {
            evaluate_reblooms(
                &post_pulse,
                confidence,
                self.sigils.is_active("STABILIZE_PROTOCOL"),
                latest.as_ref().map(|c| &c.memory_id),
                self.config.thresholds.thermal_rebloom_heat,
            )
        };
        for event in &rebloom_events {
            self.pressure.note_rebloom(event.intensity);
            self.metrics.reblooms_triggered = self.metrics.reblooms_triggered.saturating_add(1);
            self.log.append(
                tick,
                EventPayload::Rebloom {
                    id: event.id,
                    method: event.method,
                    source_id: event.source_id.clone(),
                    intensity: event.intensity,
                    reason: event.reason.clone(),
                },
            )?;
        }

        self.extended_forecast(&post_pulse, tick);
        timings.narrate_ms = phase_elapsed(phase, budget, "narrate", &mut degraded);

        // --- Phase 6: Record ---
        let phase = Instant::now();
        let chunk = MemoryChunk::now(
            Speaker::Core,
            format!("Tick {tick}: {commentary}"),
            Some(String::from("cognitive_tick")),
            post_pulse,
            self.sigils.active_names(),
        );
        let chunk_id = chunk.memory_id.clone();
        let preview = chunk.preview(80);
        let _routing = self.router.route(chunk);
        self.entropy.note_bloom(chunk_id.clone(), post_pulse.entropy);
        self.log.append(
            tick,
            EventPayload::Memory {
                memory_id: chunk_id,
                preview,
            },
        )?;
        self.log.append(
            tick,
            EventPayload::State(StatePayload {
                entropy: post_pulse.entropy,
                scup: post_pulse.scup,
                heat: post_pulse.heat,
                mood: post_pulse.mood,
                zone: post_pulse.zone,
                note: None,
            }),
        )?;

        let auto_save = self.config.memory.auto_save_interval_ticks;
        if auto_save > 0 && tick.checked_rem(auto_save) == Some(0) {
            if let Err(err) = self.persist_unsaved() {
                warn!(%err, "Auto-save failed; memories requeued");
                self.metrics.persistence_failures =
                    self.metrics.persistence_failures.saturating_add(1);
                push_once(&mut actions, "persistence_error");
            }
        }
        self.router.check_invariants()?;
        timings.record_ms = phase_elapsed(phase, budget, "record", &mut degraded);

        // --- Phase 7: Schedule next tick ---
        let phase = Instant::now();
        let duration = tick_start.elapsed();
        let mut load = (duration.as_secs_f64() / self.next_interval.max(1e-6)).clamp(0.0, 1.0);
        if !degraded.is_empty() {
            // A budget overrun counts as full load so the next interval
            // stretches.
            load = 1.0;
        }
        let unsaved = self.router.stats().unsaved_len;
        if unsaved > UNSAVED_BACKPRESSURE_FLOOR {
            load = load.max(0.8);
        }
        let action_count = u32::try_from(actions.len()).map(f64::from).unwrap_or(f64::MAX);
        let sigil_count = u32::try_from(self.sigils.active_count())
            .map(f64::from)
            .unwrap_or(f64::MAX);
        let system_pressure = ((action_count + sigil_count) / 10.0).clamp(0.0, 1.0);
        let adaptive = self.adaptive.calculate(
            post_pulse.entropy,
            post_pulse.heat_normalized(),
            load,
            system_pressure,
        );
        self.next_interval = adaptive.interval_secs;
        timings.schedule_ms = phase_elapsed(phase, budget, "schedule", &mut degraded);

        // Bookkeeping for the next tick and the rolling averages.
        self.last_tick_activations = self.sigils.activations_this_tick();
        self.metrics.sigils_triggered = self.sigils.total_activations();
        let duration_ms = duration.as_secs_f64() * 1000.0;
        self.total_duration_ms += duration_ms;
        let ticks_f = u32::try_from(tick.min(u64::from(u32::MAX)))
            .map(f64::from)
            .unwrap_or(f64::MAX);
        self.metrics.average_tick_ms = self.total_duration_ms / ticks_f;

        self.last_forecast = forecast.clone();
        self.last_pressure = pressure.clone();
        self.last_commentary = commentary.clone();
        self.last_reflection = Some(reflection.clone());

        info!(
            tick,
            entropy = post_pulse.entropy,
            zone = ?post_pulse.zone,
            pressure = pressure.pressure,
            confidence,
            next_interval = self.next_interval,
            "Tick complete"
        );

        Ok(TickResponse {
            tick_number: tick,
            timestamp,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            phase_timings: timings,
            system_state: post_pulse,
            entropy_reading,
            pressure,
            forecast,
            actions_taken: actions,
            active_sigils: self.sigils.active_names(),
            commentary,
            reflection: Some(reflection),
            rebloom_events,
            adaptive,
            degraded_phases: degraded,
            performance: self.metrics,
        })
    }

    /// Phase 4: the regulation rule table, in priority order. Each rule
    /// registers at most one sigil per tick.
    fn regulate(
        &mut self,
        tick: u64,
        sensed: &PulseSnapshot,
        confidence: f64,
        actions: &mut Vec<String>,
    ) -> Result<(), CoreError> {
        let thresholds = self.config.thresholds.clone();
        let mut working = self.pulse.current_state();
        let mut directives = Vec::new();

        // Rule 1: high confidence under high entropy -> stabilize.
        if confidence > thresholds.forecast_threshold && sensed.entropy > thresholds.entropy_threshold
        {
            self.try_register(
                "STABILIZE_PROTOCOL",
                "high_confidence_entropy",
                tick,
                &mut working,
                &mut directives,
                actions,
                "stabilization_triggered",
            )?;
        }

        // Rule 2: entropy spike -> emergency regulation.
        if sensed.entropy > thresholds.entropy_spike_threshold {
            self.try_register(
                "ENTROPY_REGULATION",
                "entropy_spike",
                tick,
                &mut working,
                &mut directives,
                actions,
                "entropy_regulation_triggered",
            )?;
        }

        // Rule 3: low confidence -> mark a rebloom for the post-tick
        // evaluator.
        if confidence < thresholds.rebloom_threshold {
            push_once(actions, "rebloom_triggered");
        }

        let outcome = self.pulse.apply_snapshot(working);

        // Rule 4: critical zone running too hot -> emergency cooldown.
        // Runs against the applied state so the sigil effects above are
        // not discarded.
        if sensed.zone == Zone::Critical && sensed.heat > thresholds.emergency_cooldown_heat {
            match self.pulse.emergency_cooldown(70.0) {
                Ok(()) => push_once(actions, "emergency_cooldown"),
                Err(err) => {
                    warn!(%err, "Emergency cooldown rejected");
                    push_once(actions, "error_recovery");
                }
            }
        }
        if outcome.thermal_peak {
            self.log.append(
                tick,
                EventPayload::State(StatePayload {
                    entropy: working.entropy,
                    scup: working.scup,
                    heat: working.heat,
                    mood: working.mood,
                    zone: working.zone,
                    note: Some(String::from("thermal_peak")),
                }),
            )?;
        }

        for directive in directives {
            match directive {
                SigilDirective::ConsolidateMemories => {
                    let dropped = self.router.consolidate();
                    debug!(dropped, "Memory consolidation requested by sigil");
                    push_once(actions, "memory_consolidation");
                }
                SigilDirective::ActiveSetCleared => {
                    push_once(actions, "sigil_ring_cleared");
                }
            }
        }
        Ok(())
    }

    /// Register one sigil for a rule, logging activation/suppression
    /// events and collecting effect directives.
    #[allow(clippy::too_many_arguments)]
    fn try_register(
        &mut self,
        name: &str,
        source: &str,
        tick: u64,
        working: &mut PulseSnapshot,
        directives: &mut Vec<SigilDirective>,
        actions: &mut Vec<String>,
        action_tag: &'static str,
    ) -> Result<(), CoreError> {
        match self.sigils.register(name, source, tick, working) {
            Ok(Registration::Activated {
                cascade,
                directives: new_directives,
            }) => {
                actions.push(String::from(action_tag));
                directives.extend(new_directives);
                self.log.append(
                    tick,
                    EventPayload::Sigil {
                        name: String::from(name),
                        action: SigilAction::Activated,
                        source: String::from(source),
                    },
                )?;
                for linked in cascade {
                    self.log.append(
                        tick,
                        EventPayload::Sigil {
                            name: linked,
                            action: SigilAction::Activated,
                            source: String::from("cascade"),
                        },
                    )?;
                }
            }
            Ok(Registration::Suppressed { reason }) => {
                debug!(sigil = name, ?reason, "Sigil suppressed");
                self.log.append(
                    tick,
                    EventPayload::Sigil {
                        name: String::from(name),
                        action: SigilAction::Suppressed,
                        source: String::from(source),
                    },
                )?;
            }
            Err(err) => {
                warn!(%err, "Sigil registration rejected");
                push_once(actions, "error_recovery");
            }
        }
        Ok(())
    }

    /// The optional second forecast over a mood-selected passion tag.
    fn extended_forecast(&mut self, pulse: &PulseSnapshot, tick: u64) {
        let tag = extended_passion_tag(pulse.entropy, pulse.mood);
        let passion = Passion::new(tag, pulse.scup, pulse.entropy);
        let acquaintance = derive_acquaintance(pulse, tick);
        let opportunity = opportunity_from_pulse(pulse);
        match self
            .forecast_engine
            .compute(&passion, &acquaintance, opportunity, self.next_interval)
        {
            Ok(result) => {
                self.metrics.forecasts_computed =
                    self.metrics.forecasts_computed.saturating_add(1);
                debug!(tag, forecast = result.forecast, limit_horizon = result.limit_horizon, "Extended forecast");
            }
            Err(err) => debug!(%err, "Extended forecast skipped"),
        }
    }

    /// Flush routed-but-unsaved chunks to the memory file.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] after requeuing the chunks so a later
    /// attempt can retry them.
    pub fn persist_unsaved(&mut self) -> Result<usize, LoaderError> {
        let chunks = self.router.take_unsaved();
        if chunks.is_empty() {
            return Ok(0);
        }
        let count = chunks.len();
        match self.loader.append(&chunks) {
            Ok(()) => Ok(count),
            Err(err) => {
                self.router.requeue_unsaved(chunks);
                Err(err)
            }
        }
    }

    /// Graceful shutdown: final STATE event, memory flush with bounded
    /// retries, sink detach.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventOrdering`] if the final event cannot be
    /// appended (which would itself be an invariant violation).
    pub fn shutdown(&mut self, reason: &str) -> Result<ShutdownReport, CoreError> {
        let pulse = self.pulse.current_state();
        self.log.append(
            self.tick_count,
            EventPayload::State(StatePayload {
                entropy: pulse.entropy,
                scup: pulse.scup,
                heat: pulse.heat,
                mood: pulse.mood,
                zone: pulse.zone,
                note: Some(format!("shutdown: {reason}")),
            }),
        )?;

        let mut persisted = 0;
        let mut persist_failures = 0;
        for attempt in 1..=SHUTDOWN_PERSIST_ATTEMPTS {
            match self.persist_unsaved() {
                Ok(count) => {
                    persisted = count;
                    persist_failures = 0;
                    break;
                }
                Err(err) => {
                    warn!(%err, attempt, "Shutdown persistence attempt failed");
                    persist_failures = self.router.stats().unsaved_len;
                }
            }
        }

        self.log.detach_sink();
        info!(reason, persisted, persist_failures, "Core shutdown complete");
        Ok(ShutdownReport {
            persisted_memories: persisted,
            persist_failures,
            total_events: self.log.len(),
        })
    }

    /// Read-only snapshot for external collaborators.
    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            tick: self.tick_count,
            pulse: self.pulse.current_state(),
            heat_trend: self.pulse.trend(),
            entropy: self.entropy.summary(),
            active_sigils: self.sigils.active_names(),
            last_forecast: self.last_forecast.clone(),
            pressure: self.last_pressure.clone(),
            memory: self.router.stats(),
            commentary: self.last_commentary.clone(),
            reflection: self.last_reflection.clone(),
        }
    }

    /// Route previously persisted chunks back through the tier rules
    /// (the `replay` surface). Returns how many were routed.
    pub fn ingest_memories(&mut self, chunks: Vec<MemoryChunk>) -> usize {
        let count = chunks.len();
        for chunk in chunks {
            let id: MemoryId = chunk.memory_id.clone();
            let entropy = chunk.entropy();
            let _ = self.router.route(chunk);
            self.entropy.note_bloom(id, entropy);
        }
        // Replayed chunks are already on disk; don't write them back.
        let _ = self.router.take_unsaved();
        count
    }

    /// The interval (seconds) until the next tick.
    pub const fn next_interval(&self) -> f64 {
        self.next_interval
    }

    /// Completed tick count.
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Mutable pulse access (operator/test injection surface).
    pub const fn pulse_mut(&mut self) -> &mut PulseController {
        &mut self.pulse
    }

    /// The event log.
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// Router statistics.
    pub fn router_stats(&self) -> dawn_memory::RouterStats {
        self.router.stats()
    }

    /// The memory loader bound to the configured path.
    pub const fn loader(&self) -> &MemoryLoader {
        &self.loader
    }
}

/// A zone-indexed stub chunk used when the router is still empty.
fn contextual_stub(pulse: &PulseSnapshot) -> MemoryChunk {
    let (content, topic, sigils) = match pulse.zone {
        Zone::Critical => (
            format!(
                "System entering critical state with entropy {:.3}, heightened vigilance required",
                pulse.entropy
            ),
            "system_alert",
            vec![String::from("STABILIZE_PROTOCOL")],
        ),
        Zone::Surge => (
            format!(
                "Navigating chaotic patterns, entropy at {:.3}, seeking stability",
                pulse.entropy
            ),
            "navigation",
            vec![String::from("ENTROPY_REGULATION")],
        ),
        Zone::Active => (
            format!(
                "Active processing state, entropy {:.3}, engaging with complexity",
                pulse.entropy
            ),
            "active_processing",
            vec![String::from("EXPLORATION_MODE")],
        ),
        Zone::Calm => (
            format!(
                "Calm contemplative state, entropy {:.3}, open to reflection",
                pulse.entropy
            ),
            "contemplation",
            vec![String::from("DEEP_REFLECTION")],
        ),
    };
    MemoryChunk::now(Speaker::Core, content, Some(String::from(topic)), *pulse, sigils)
}

/// Elapsed milliseconds for a phase, marking it degraded on overrun.
fn phase_elapsed(start: Instant, budget: Duration, name: &'static str, degraded: &mut Vec<&'static str>) -> u64 {
    let elapsed = start.elapsed();
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    if elapsed > budget {
        warn!(phase = name, elapsed_ms, "Phase budget overrun");
        degraded.push(name);
    }
    elapsed_ms
}

/// Push an action tag if it is not already present.
fn push_once(actions: &mut Vec<String>, tag: &'static str) {
    if !actions.iter().any(|a| a == tag) {
        actions.push(String::from(tag));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dawn_pulse::PulseUpdate;

    use super::*;

    fn test_config() -> DawnConfig {
        let mut config = DawnConfig::default();
        // Tests never touch the filesystem.
        config.memory.auto_save_interval_ticks = 0;
        config.events.persist = false;
        config
    }

    fn driver() -> TickDriver {
        TickDriver::new(test_config())
    }

    fn scenario_inputs() -> (Passion, Acquaintance) {
        (
            Passion::new("system_stability", 0.6, 0.4).with_centrality(0.8),
            Acquaintance::from_parts(0.3, 2.0),
        )
    }

    #[test]
    fn first_tick_produces_a_complete_response() {
        let mut d = driver();
        let response = d.tick().unwrap();
        assert_eq!(response.tick_number, 1);
        assert!(response.forecast.is_some());
        assert!(!response.commentary.is_empty());
        assert!(response.reflection.is_some());
        assert!(response.adaptive.interval_secs >= 0.1);
        assert!(response.adaptive.interval_secs <= 10.0);
    }

    #[test]
    fn high_entropy_high_confidence_triggers_stabilization() {
        let mut d = driver();
        let _ = d.pulse_mut().update_state(PulseUpdate {
            entropy: Some(0.82),
            heat: Some(35.0),
            ..PulseUpdate::default()
        });
        let (passion, acquaintance) = scenario_inputs();
        let response = d
            .tick_with_forecast_inputs(passion, acquaintance, 0.7, 1.5)
            .unwrap();

        let forecast = response.forecast.unwrap();
        assert!((forecast.forecast - 0.4356).abs() < 1e-3);
        assert!(
            response
                .actions_taken
                .iter()
                .any(|a| a == "stabilization_triggered")
        );
        assert!(
            response
                .active_sigils
                .iter()
                .any(|s| s == "STABILIZE_PROTOCOL")
        );
    }

    #[test]
    fn entropy_spike_triggers_regulation_and_lowers_entropy() {
        let mut d = driver();
        let _ = d.pulse_mut().update_state(PulseUpdate {
            entropy: Some(0.92),
            ..PulseUpdate::default()
        });
        let response = d.tick().unwrap();
        assert!(
            response
                .actions_taken
                .iter()
                .any(|a| a == "entropy_regulation_triggered")
        );
        assert!(response.system_state.entropy < 0.92);
    }

    #[test]
    fn low_confidence_marks_a_rebloom() {
        let mut d = driver();
        // Contextual derivation on a calm pulse yields a tiny forecast.
        let response = d.tick().unwrap();
        assert!(response.actions_taken.iter().any(|a| a == "rebloom_triggered"));
    }

    #[test]
    fn tick_memory_is_routed_every_tick() {
        let mut d = driver();
        let _ = d.tick().unwrap();
        let _ = d.tick().unwrap();
        let stats = d.router_stats();
        assert_eq!(stats.routing_decisions, 2);
        assert_eq!(stats.recent_len, 2);
    }

    #[test]
    fn events_are_appended_in_phase_order_per_tick() {
        let mut d = driver();
        let _ = d.tick().unwrap();
        let kinds: Vec<&'static str> = d.log().iter().map(|e| e.payload.kind()).collect();
        // Reflection (narrate) before memory/state (record).
        let reflection_pos = kinds.iter().position(|k| *k == "REFLECTION");
        let memory_pos = kinds.iter().position(|k| *k == "MEMORY");
        let state_pos = kinds.iter().position(|k| *k == "STATE");
        assert!(reflection_pos < memory_pos);
        assert!(memory_pos < state_pos);
    }

    #[test]
    fn event_ticks_are_weakly_monotone_across_ticks() {
        let mut d = driver();
        for _ in 0..3 {
            let _ = d.tick().unwrap();
        }
        let ticks: Vec<u64> = d.log().iter().map(|e| e.tick).collect();
        assert!(ticks.windows(2).all(|w| w.first() <= w.get(1)));
    }

    #[test]
    fn interval_stays_in_bounds_over_many_ticks() {
        let mut d = driver();
        for _ in 0..20 {
            let response = d.tick().unwrap();
            assert!(response.adaptive.interval_secs >= 0.1);
            assert!(response.adaptive.interval_secs <= 10.0);
        }
    }

    #[test]
    fn zone_recomputation_is_stable_after_tick() {
        let mut d = driver();
        let response = d.tick().unwrap();
        let state = response.system_state;
        assert_eq!(state.zone, Zone::classify(state.heat, state.entropy));
    }

    #[test]
    fn snapshot_reflects_last_tick() {
        let mut d = driver();
        let response = d.tick().unwrap();
        let snapshot = d.snapshot();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.commentary, response.commentary);
        assert_eq!(snapshot.active_sigils, response.active_sigils);
        assert_eq!(snapshot.memory.recent_len, 1);
    }

    #[test]
    fn sustained_extremes_build_pressure() {
        let mut d = driver();
        let _ = d.pulse_mut().update_state(PulseUpdate {
            entropy: Some(0.99),
            heat: Some(100.0),
            ..PulseUpdate::default()
        });
        // Reblooms from the hot, chaotic ticks accumulate bloom mass.
        for _ in 0..3 {
            let _ = d.tick().unwrap();
        }
        let snapshot = d.snapshot();
        assert!(snapshot.pressure.pressure > 80.0);
        assert!(snapshot.pressure.shi < 1.0);
    }

    #[test]
    fn slow_tick_reflex_doubles_and_restores() {
        let mut d = driver();
        let start_interval = d.adaptive.base_interval();
        assert!((start_interval - 2.0).abs() < f64::EPSILON);

        let commands = vec![String::from("slow_tick")];
        let _ = d.reflex.execute(
            &commands,
            &mut d.adaptive,
            &mut d.pulse,
            &mut d.sigils,
            1,
        );
        assert!((d.adaptive.base_interval() - 4.0).abs() < f64::EPSILON);

        let _ = d.reflex.restore_normal_operation(&mut d.adaptive);
        assert!((d.adaptive.base_interval() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn error_recovery_never_escalates() {
        let mut d = driver();
        // Many ticks under extreme state: no invariant errors.
        let _ = d.pulse_mut().update_state(PulseUpdate {
            entropy: Some(1.0),
            heat: Some(100.0),
            ..PulseUpdate::default()
        });
        for _ in 0..10 {
            assert!(d.tick().is_ok());
        }
        assert!(d.router_stats().recent_len <= 200);
    }

    #[test]
    fn shutdown_emits_final_state_event() {
        let mut d = driver();
        let _ = d.tick().unwrap();
        let report = d.shutdown("test_exit").unwrap();
        assert!(report.total_events >= 3);
        let last = d.log().iter().last().unwrap();
        assert_eq!(last.payload.kind(), "STATE");
    }

    #[test]
    fn ingest_memories_routes_without_rewriting() {
        let mut d = driver();
        let chunks = vec![
            MemoryChunk::now(
                Speaker::User,
                "replayed memory one",
                None,
                PulseSnapshot::baseline(),
                Vec::new(),
            ),
            MemoryChunk::now(
                Speaker::User,
                "replayed memory two",
                None,
                PulseSnapshot::baseline(),
                Vec::new(),
            ),
        ];
        let count = d.ingest_memories(chunks);
        assert_eq!(count, 2);
        let stats = d.router_stats();
        assert_eq!(stats.recent_len, 2);
        assert_eq!(stats.unsaved_len, 0);
    }
}
