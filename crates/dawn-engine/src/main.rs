//! DAWN engine binary: the cognitive core's command-line surface.
//!
//! Subcommands:
//!
//! - `run [--ticks N]` -- run the tick loop, bounded or until SIGINT,
//!   then shut down cleanly (exit 0);
//! - `replay <jsonl>` -- load a memory file, route every chunk through
//!   the tier rules, report, and stop;
//! - `verify <jsonl>` -- validate a memory file's JSON Lines format.
//!
//! Exit codes: 0 success, 2 bad arguments or configuration, 3 persistence
//! error, 4 internal invariant violation.
//!
//! # Startup sequence (`run`)
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `dawn-config.yaml` (profile via `DAWN_PROFILE`)
//! 3. Spawn the background event writer (when persistence is enabled)
//! 4. Build the tick driver
//! 5. Install the SIGINT handler for cooperative stop
//! 6. Run the tick loop
//! 7. Drain the event writer within its deadline and report

mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dawn_core::{DawnConfig, NoOpCallback, RunBounds, TickDriver, log_run_end, run_loop};
use dawn_events::spawn_writer;
use dawn_memory::MemoryLoader;
use dawn_types::collection_stats;

use crate::error::EngineError;

/// Command-line interface for the DAWN cognitive core.
#[derive(Debug, Parser)]
#[command(name = "dawn-engine", version, about = "DAWN cognitive tick core")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "dawn-config.yaml")]
    config: PathBuf,

    /// The subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Engine subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the cognitive tick loop.
    Run {
        /// Stop after this many ticks (omit to run until SIGINT).
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Load a memory JSONL file and route it through the tier rules.
    Replay {
        /// The memory file to replay.
        file: PathBuf,
    },
    /// Validate a memory JSONL file's format.
    Verify {
        /// The memory file to verify.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            // Logging is not yet initialized on the config path.
            eprintln!("dawn-engine: {err}");
            return ExitCode::from(err.exit_code());
        }
    };

    init_logging(&config);

    let result = match cli.command {
        Command::Run { ticks } => run(config, ticks).await,
        Command::Replay { file } => replay(config, &file),
        Command::Verify { file } => verify(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, code = err.exit_code(), "dawn-engine failed");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Load configuration, falling back to profile defaults when the file is
/// absent.
fn load_config(path: &Path) -> Result<DawnConfig, EngineError> {
    if path.exists() {
        Ok(DawnConfig::from_file(path)?)
    } else {
        Ok(DawnConfig::from_env_profile())
    }
}

/// Initialize structured logging once.
fn init_logging(config: &DawnConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// The `run` subcommand.
async fn run(config: DawnConfig, ticks: Option<u64>) -> Result<(), EngineError> {
    info!(?ticks, "dawn-engine starting");

    // Event writer (optional persistence).
    let drain_deadline = Duration::from_secs(config.events.drain_deadline_secs);
    let (mut driver, writer) = if config.events.persist {
        let (sink, handle) = spawn_writer(config.events.path.clone());
        (TickDriver::with_event_sink(config, sink), Some(handle))
    } else {
        (TickDriver::new(config), None)
    };
    info!("Tick driver initialized");

    // Cooperative stop on SIGINT.
    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("SIGINT received; requesting clean shutdown");
            stop_signal.store(true, Ordering::Release);
        }
    });

    // Run the loop.
    let mut callback = NoOpCallback;
    let summary = run_loop(
        &mut driver,
        RunBounds { max_ticks: ticks },
        &stop,
        &mut callback,
    )
    .await?;
    log_run_end(&summary);

    // Drain the event writer within its deadline.
    if let Some(handle) = writer {
        let report = handle.finish(drain_deadline).await;
        info!(
            written = report.written,
            retries = report.retries,
            dead_lettered = report.dead_lettered,
            "Event writer finished"
        );
    }

    if summary.shutdown.persist_failures > 0 {
        return Err(EngineError::ShutdownPersist {
            count: summary.shutdown.persist_failures,
        });
    }

    info!("dawn-engine shutdown complete");
    Ok(())
}

/// The `replay` subcommand: load memories and route them, then stop.
fn replay(config: DawnConfig, file: &Path) -> Result<(), EngineError> {
    let loader = MemoryLoader::new(file);
    let report = loader.load()?;
    if report.failed_lines > 0 {
        warn!(failed = report.failed_lines, "Some memory lines were skipped");
    }

    let stats = collection_stats(&report.chunks);
    info!(
        loaded = report.chunks.len(),
        speakers = stats.unique_speakers,
        topics = stats.unique_topics,
        avg_entropy = stats.average_entropy,
        "Memory file loaded"
    );

    let mut driver = TickDriver::new(config);
    let routed = driver.ingest_memories(report.chunks);
    let router = driver.router_stats();
    info!(
        routed,
        working = router.working_len,
        recent = router.recent_len,
        significant = router.significant_len,
        "Replay complete"
    );
    Ok(())
}

/// The `verify` subcommand: validate the file's format.
fn verify(file: &Path) -> Result<(), EngineError> {
    let loader = MemoryLoader::new(file);
    let report = loader.load()?;
    let total = report.chunks.len().saturating_add(report.failed_lines);

    if report.failed_lines > 0 {
        return Err(EngineError::VerificationFailed {
            failed: report.failed_lines,
            total,
            path: file.display().to_string(),
        });
    }

    info!(
        valid = report.chunks.len(),
        path = %file.display(),
        "Memory file verified"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dawn_types::{MemoryChunk, PulseSnapshot, Speaker};

    use super::*;

    fn write_memory_file(dir: &tempfile::TempDir, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn valid_line(content: &str) -> String {
        let chunk = MemoryChunk::now(
            Speaker::Core,
            content,
            None,
            PulseSnapshot::baseline(),
            Vec::new(),
        );
        serde_json::to_string(&chunk).unwrap()
    }

    #[test]
    fn verify_accepts_valid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_memory_file(
            &dir,
            "valid.jsonl",
            &[valid_line("one"), valid_line("two")],
        );
        assert!(verify(&path).is_ok());
    }

    #[test]
    fn verify_rejects_malformed_files_with_code_3() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_memory_file(
            &dir,
            "broken.jsonl",
            &[valid_line("fine"), String::from("{broken")],
        );
        let err = verify(&path).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn verify_missing_file_is_a_persistence_error() {
        let err = verify(Path::new("/nonexistent/mem.jsonl")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn replay_routes_loaded_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_memory_file(
            &dir,
            "replay.jsonl",
            &[valid_line("alpha"), valid_line("beta"), valid_line("gamma")],
        );
        let mut config = DawnConfig::default();
        config.events.persist = false;
        config.memory.auto_save_interval_ticks = 0;
        assert!(replay(config, &path).is_ok());
    }

    #[test]
    fn load_config_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/dawn-config.yaml"));
        assert!(config.is_ok());
    }

    #[tokio::test]
    async fn bounded_run_exits_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DawnConfig::default();
        config.tick.base_interval_secs = 0.05;
        config.tick.min_interval_secs = 0.01;
        config.memory.path = dir
            .path()
            .join("memories.jsonl")
            .display()
            .to_string();
        config.events.path = dir.path().join("events.jsonl").display().to_string();
        config.memory.auto_save_interval_ticks = 2;

        let result = run(config, Some(3)).await;
        assert!(result.is_ok());

        // Events landed on disk.
        let events = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert!(events.lines().count() >= 3);
    }
}
