//! Event sourcing for the cognitive core.
//!
//! Every phase of every tick appends typed records to the in-memory
//! [`EventLog`]; the log preserves total order per tick, enforces weakly
//! monotone tick numbers, and never blocks the appender. When persistence
//! is enabled, appends are forwarded over a bounded channel to a
//! background writer that lands them in a JSON Lines file with bounded
//! retries, falling back to an in-memory dead-letter count when the disk
//! stays unavailable.
//!
//! [`EventLog`]: log::EventLog

pub mod log;
pub mod record;
pub mod writer;

pub use log::{EventLog, EventLogError};
pub use record::{EventPayload, EventRecord, SigilAction, StatePayload};
pub use writer::{EventSink, WriterHandle, WriterReport, spawn_writer};
