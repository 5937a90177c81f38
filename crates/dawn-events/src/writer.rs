//! Background JSON Lines writer for the event log.
//!
//! The log forwards records over a bounded channel; this task drains the
//! channel and appends one line per record. Disk failures are retried a
//! bounded number of times with a short backoff; records that still fail
//! are dead-lettered (counted and logged, never blocking the tick loop).
//! On shutdown the channel closes and the writer drains whatever is left
//! before reporting its totals.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::record::EventRecord;

/// Bounded channel capacity between the log and the writer.
const CHANNEL_CAPACITY: usize = 1024;

/// Write attempts per record before dead-lettering.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Sending half held by the event log.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<EventRecord>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Forward a record without blocking.
    ///
    /// A full or closed channel increments the drop counter instead of
    /// waiting -- the tick loop must never stall on persistence.
    pub fn forward(&self, record: &EventRecord) {
        if let Err(err) = self.tx.try_send(record.clone()) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(%err, "Event sink full; record dropped to counter");
        }
    }

    /// Records dropped at the sink so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Final accounting from the writer task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    /// Records successfully written.
    pub written: u64,
    /// Individual write attempts that failed and were retried.
    pub retries: u64,
    /// Records abandoned after exhausting retries.
    pub dead_lettered: u64,
}

/// Handle used to await the writer during shutdown.
#[derive(Debug)]
pub struct WriterHandle {
    handle: JoinHandle<WriterReport>,
    dropped: Arc<AtomicU64>,
}

impl WriterHandle {
    /// Await the writer's drain up to `deadline`.
    ///
    /// On timeout the task is abandoned and a partial report (drop
    /// counter only) is returned; shutdown must stay bounded even when
    /// the disk does not cooperate.
    pub async fn finish(self, deadline: Duration) -> WriterReport {
        match tokio::time::timeout(deadline, self.handle).await {
            Ok(Ok(report)) => report,
            Ok(Err(join_err)) => {
                warn!(%join_err, "Event writer task failed");
                WriterReport {
                    dead_lettered: self.dropped.load(Ordering::Relaxed),
                    ..WriterReport::default()
                }
            }
            Err(_elapsed) => {
                warn!("Event writer drain deadline exceeded; abandoning task");
                WriterReport {
                    dead_lettered: self.dropped.load(Ordering::Relaxed),
                    ..WriterReport::default()
                }
            }
        }
    }
}

/// Spawn the background writer for the given file path.
///
/// Returns the sink to attach to an [`EventLog`] and the handle to await
/// at shutdown.
///
/// [`EventLog`]: crate::log::EventLog
pub fn spawn_writer(path: impl Into<PathBuf>) -> (EventSink, WriterHandle) {
    let path = path.into();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));

    let handle = tokio::spawn(write_loop(path, rx));
    (
        EventSink {
            tx,
            dropped: Arc::clone(&dropped),
        },
        WriterHandle { handle, dropped },
    )
}

async fn write_loop(path: PathBuf, mut rx: mpsc::Receiver<EventRecord>) -> WriterReport {
    let mut report = WriterReport::default();

    while let Some(record) = rx.recv().await {
        match append_with_retry(&path, &record, &mut report.retries).await {
            Ok(()) => report.written = report.written.saturating_add(1),
            Err(err) => {
                report.dead_lettered = report.dead_lettered.saturating_add(1);
                warn!(%err, tick = record.tick, "Event dead-lettered after retries");
            }
        }
    }

    info!(
        written = report.written,
        retries = report.retries,
        dead_lettered = report.dead_lettered,
        path = %path.display(),
        "Event writer drained"
    );
    report
}

async fn append_with_retry(
    path: &Path,
    record: &EventRecord,
    retries: &mut u64,
) -> Result<(), std::io::Error> {
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match append_line(path, record) {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(%err, attempt, "Event append attempt failed");
                *retries = retries.saturating_add(1);
                last_err = Some(err);
                tokio::time::sleep(RETRY_BACKOFF.saturating_mul(attempt)).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::other("event append failed")))
}

fn append_line(path: &Path, record: &EventRecord) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(record).map_err(std::io::Error::other)?;
    line.push('\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    file.flush()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dawn_types::{Mood, Zone};

    use crate::record::{EventPayload, StatePayload};

    use super::*;

    fn sample_record(tick: u64) -> EventRecord {
        EventRecord::new(
            tick,
            EventPayload::State(StatePayload {
                entropy: 0.5,
                scup: 0.5,
                heat: 25.0,
                mood: Mood::Neutral,
                zone: Zone::Calm,
                note: None,
            }),
        )
    }

    #[tokio::test]
    async fn writer_lands_records_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (sink, handle) = spawn_writer(&path);

        for tick in 1..=5 {
            sink.forward(&sample_record(tick));
        }
        drop(sink);
        let report = handle.finish(Duration::from_secs(5)).await;
        assert_eq!(report.written, 5);
        assert_eq!(report.dead_lettered, 0);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        for line in lines {
            let parsed: Result<EventRecord, _> = serde_json::from_str(line);
            assert!(parsed.is_ok());
        }
    }

    #[tokio::test]
    async fn drain_deadline_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (sink, handle) = spawn_writer(&path);
        sink.forward(&sample_record(1));
        drop(sink);
        // Even a generous deadline returns promptly once drained.
        let report = handle.finish(Duration::from_secs(10)).await;
        assert_eq!(report.written, 1);
    }

    #[tokio::test]
    async fn unwritable_path_dead_letters() {
        // A directory path cannot be opened as a file.
        let dir = tempfile::tempdir().unwrap();
        let (sink, handle) = spawn_writer(dir.path());
        sink.forward(&sample_record(1));
        drop(sink);
        let report = handle.finish(Duration::from_secs(5)).await;
        assert_eq!(report.written, 0);
        assert_eq!(report.dead_lettered, 1);
        assert!(report.retries >= 2);
    }
}
