//! The run loop: cadence, bounds, and clean shutdown around the tick.
//!
//! The tick itself is synchronous; this module owns the async cadence
//! around it -- sleep for the adaptive interval, honor a cooperative stop
//! flag between ticks, stop at a tick bound, and drive the graceful
//! shutdown sequence when the loop ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{info, warn};

use crate::snapshot::CoreSnapshot;
use crate::tick::{CoreError, ShutdownReport, TickDriver, TickResponse};

/// Why the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The configured tick bound was reached.
    MaxTicksReached,
    /// The stop flag was raised (SIGINT or operator).
    StopRequested,
}

/// Bounds on a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunBounds {
    /// Stop after this many ticks (`None` = run until stopped).
    pub max_ticks: Option<u64>,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Why the loop ended.
    pub end_reason: EndReason,
    /// Ticks executed.
    pub total_ticks: u64,
    /// The final tick's response, when at least one tick ran.
    pub final_response: Option<TickResponse>,
    /// The shutdown report.
    pub shutdown: ShutdownReport,
}

/// Callback invoked after each tick completes.
///
/// Implementations update observer snapshots, print summaries, and so on.
/// They receive the response together with a fresh read-only snapshot.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, response: &TickResponse, snapshot: &CoreSnapshot);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _response: &TickResponse, _snapshot: &CoreSnapshot) {}
}

/// Run the tick loop until a bound or the stop flag ends it.
///
/// Cancellation is cooperative: the flag is checked between ticks, never
/// inside one. On exit the driver's graceful shutdown runs (final STATE
/// event, memory flush, sink detach); awaiting the event writer's drain
/// is the caller's job since it owns the writer handle.
///
/// # Errors
///
/// Returns [`CoreError`] when a tick reports an invariant violation; the
/// caller should log, flush what it can, and exit with code 4.
pub async fn run_loop(
    driver: &mut TickDriver,
    bounds: RunBounds,
    stop: &Arc<AtomicBool>,
    callback: &mut dyn TickCallback,
) -> Result<RunSummary, CoreError> {
    info!(max_ticks = ?bounds.max_ticks, "Tick loop starting");
    let mut final_response: Option<TickResponse> = None;

    let end_reason = loop {
        if stop.load(Ordering::Acquire) {
            info!("Stop requested; leaving tick loop");
            break EndReason::StopRequested;
        }
        if bounds
            .max_ticks
            .is_some_and(|max| driver.tick_count() >= max)
        {
            info!(ticks = driver.tick_count(), "Tick bound reached");
            break EndReason::MaxTicksReached;
        }

        let response = driver.tick()?;
        let snapshot = driver.snapshot();
        callback.on_tick(&response, &snapshot);
        final_response = Some(response);

        let interval = driver.next_interval();
        tokio::select! {
            () = tokio::time::sleep(std::time::Duration::from_secs_f64(interval)) => {}
            () = wait_for_stop(stop) => {}
        }
    };

    let reason_tag = match end_reason {
        EndReason::MaxTicksReached => "max_ticks_reached",
        EndReason::StopRequested => "stop_requested",
    };
    let shutdown = driver.shutdown(reason_tag)?;
    if shutdown.persist_failures > 0 {
        warn!(
            failures = shutdown.persist_failures,
            "Memories left unpersisted at shutdown"
        );
    }

    Ok(RunSummary {
        end_reason,
        total_ticks: driver.tick_count(),
        final_response,
        shutdown,
    })
}

/// Resolve once the stop flag is raised (polled coarsely; the loop only
/// needs between-tick granularity).
async fn wait_for_stop(stop: &Arc<AtomicBool>) {
    while !stop.load(Ordering::Acquire) {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

/// Log the end-of-run summary.
pub fn log_run_end(summary: &RunSummary) {
    info!(
        reason = ?summary.end_reason,
        total_ticks = summary.total_ticks,
        persisted = summary.shutdown.persisted_memories,
        events = summary.shutdown.total_events,
        "Run ended"
    );
    if let Some(response) = &summary.final_response {
        info!(
            tick = response.tick_number,
            entropy = response.system_state.entropy,
            zone = ?response.system_state.zone,
            avg_tick_ms = response.performance.average_tick_ms,
            entropy_spikes = response.performance.entropy_spikes,
            sigils = response.performance.sigils_triggered,
            reblooms = response.performance.reblooms_triggered,
            reflections = response.performance.reflections_generated,
            forecasts = response.performance.forecasts_computed,
            "Final tick summary"
        );
    } else {
        warn!("Run ended with no ticks executed");
    }
}
