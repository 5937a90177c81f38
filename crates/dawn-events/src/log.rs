//! The in-memory append-only event log.
//!
//! Appends are O(1) and never block: when a persistence sink is attached,
//! forwarding uses a non-blocking send and counts drops instead of
//! waiting. Tick numbers must be weakly monotone -- a regression is an
//! invariant violation the driver escalates to a fatal exit.

use tracing::error;

use crate::record::{EventPayload, EventRecord};
use crate::writer::EventSink;

/// Errors from the event log.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// An append carried a tick lower than an already-logged tick.
    #[error("event-log monotonicity broken: tick {tick} after tick {last_tick}")]
    MonotonicityBroken {
        /// The offending tick.
        tick: u64,
        /// The highest tick already logged.
        last_tick: u64,
    },
}

/// Append-only, totally ordered event sequence.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<EventRecord>,
    last_tick: Option<u64>,
    sink: Option<EventSink>,
}

impl EventLog {
    /// Create a log without persistence.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            last_tick: None,
            sink: None,
        }
    }

    /// Create a log that forwards appends to a background writer.
    pub const fn with_sink(sink: EventSink) -> Self {
        Self {
            entries: Vec::new(),
            last_tick: None,
            sink: Some(sink),
        }
    }

    /// Append a payload at the given tick.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::MonotonicityBroken`] when `tick` is lower
    /// than the last appended tick. The entry is not recorded in that
    /// case.
    pub fn append(&mut self, tick: u64, payload: EventPayload) -> Result<(), EventLogError> {
        if let Some(last) = self.last_tick {
            if tick < last {
                error!(tick, last, "Event log monotonicity broken");
                return Err(EventLogError::MonotonicityBroken {
                    tick,
                    last_tick: last,
                });
            }
        }
        self.last_tick = Some(tick);

        let record = EventRecord::new(tick, payload);
        if let Some(sink) = &self.sink {
            sink.forward(&record);
        }
        self.entries.push(record);
        Ok(())
    }

    /// Number of logged events.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all entries in append order.
    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter()
    }

    /// Entries at or after the given index (for incremental readers).
    pub fn since(&self, index: usize) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter().skip(index)
    }

    /// Drop the persistence sink, closing the writer's channel.
    ///
    /// Called during shutdown so the background writer can drain and
    /// finish.
    pub fn detach_sink(&mut self) -> Option<EventSink> {
        self.sink.take()
    }
}
