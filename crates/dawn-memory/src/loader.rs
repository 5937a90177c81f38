//! JSON Lines persistence for memory chunks.
//!
//! One chunk per line (format v1). Writers append line-atomically; readers
//! tolerate malformed and truncated trailing lines by skipping them and
//! counting, never by failing the load. Loaded records pass a range check
//! (entropy and SCUP in `[0, 1]`, heat in `[0, 100]`) before they are
//! accepted; out-of-range records count as failures.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use validator::Validate;

use dawn_types::{MemoryChunk, Mood, Speaker};

/// Errors from the memory loader.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Reading or writing the backing file failed.
    #[error("memory file I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A chunk could not be serialized for writing.
    #[error("memory serialization failed: {source}")]
    Serialize {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}

/// Outcome of a load: accepted chunks plus the failure counter.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Chunks that parsed and validated.
    pub chunks: Vec<MemoryChunk>,
    /// Lines that were skipped (malformed JSON, missing fields, or
    /// out-of-range values).
    pub failed_lines: usize,
}

/// Range checks applied to each loaded record.
#[derive(Debug, Validate)]
struct RecordRanges {
    /// Entropy must sit in the unit interval.
    #[validate(range(min = 0.0, max = 1.0))]
    entropy: f64,
    /// SCUP must sit in the unit interval.
    #[validate(range(min = 0.0, max = 1.0))]
    scup: f64,
    /// Heat must sit on the soft-bounded heat scale.
    #[validate(range(min = 0.0, max = 100.0))]
    heat: f64,
}

impl RecordRanges {
    fn of(chunk: &MemoryChunk) -> Self {
        Self {
            entropy: chunk.entropy(),
            scup: chunk.scup(),
            heat: chunk.heat(),
        }
    }
}

/// Filter predicates over chunk collections.
///
/// All set fields must match (conjunction). Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFilter {
    /// Exact speaker match.
    pub speaker: Option<Speaker>,
    /// Exact topic match.
    pub topic: Option<String>,
    /// Case-insensitive content substring.
    pub content_contains: Option<String>,
    /// Inclusive lower entropy bound.
    pub min_entropy: Option<f64>,
    /// Inclusive upper entropy bound.
    pub max_entropy: Option<f64>,
    /// Inclusive lower heat bound.
    pub min_heat: Option<f64>,
    /// Inclusive upper heat bound.
    pub max_heat: Option<f64>,
    /// Exact mood match.
    pub mood: Option<Mood>,
    /// Required linked sigil.
    pub has_sigil: Option<String>,
}

impl MemoryFilter {
    /// Whether a chunk satisfies every set predicate.
    pub fn matches(&self, chunk: &MemoryChunk) -> bool {
        if self.speaker.is_some_and(|s| s != chunk.speaker) {
            return false;
        }
        if self
            .topic
            .as_deref()
            .is_some_and(|t| chunk.topic.as_deref() != Some(t))
        {
            return false;
        }
        if self.content_contains.as_deref().is_some_and(|needle| {
            !chunk
                .content
                .to_lowercase()
                .contains(&needle.to_lowercase())
        }) {
            return false;
        }
        if self.min_entropy.is_some_and(|min| chunk.entropy() < min) {
            return false;
        }
        if self.max_entropy.is_some_and(|max| chunk.entropy() > max) {
            return false;
        }
        if self.min_heat.is_some_and(|min| chunk.heat() < min) {
            return false;
        }
        if self.max_heat.is_some_and(|max| chunk.heat() > max) {
            return false;
        }
        if self.mood.is_some_and(|m| m != chunk.pulse_state.mood) {
            return false;
        }
        if self
            .has_sigil
            .as_deref()
            .is_some_and(|s| !chunk.has_sigil(s))
        {
            return false;
        }
        true
    }

    /// Apply the filter to a slice, cloning the survivors.
    pub fn apply(&self, chunks: &[MemoryChunk]) -> Vec<MemoryChunk> {
        chunks.iter().filter(|c| self.matches(c)).cloned().collect()
    }
}

/// JSON Lines reader/writer for memory files.
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    path: PathBuf,
}

impl MemoryLoader {
    /// Create a loader bound to a file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The bound file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all chunks, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Io`] on file errors or
    /// [`LoaderError::Serialize`] if a chunk cannot be encoded.
    pub fn save(&self, chunks: &[Arc<MemoryChunk>]) -> Result<(), LoaderError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&self.path)?;
        for chunk in chunks {
            let line = serde_json::to_string(chunk.as_ref())?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        info!(count = chunks.len(), path = %self.path.display(), "Memories saved");
        Ok(())
    }

    /// Append chunks to the file, creating it if absent.
    ///
    /// Each line is written in one call so a crash can truncate at most
    /// the final line -- which loaders already tolerate.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Io`] on file errors or
    /// [`LoaderError::Serialize`] if a chunk cannot be encoded.
    pub fn append(&self, chunks: &[Arc<MemoryChunk>]) -> Result<(), LoaderError> {
        if chunks.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        for chunk in chunks {
            let mut line = serde_json::to_string(chunk.as_ref())?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        file.flush()?;
        debug!(count = chunks.len(), path = %self.path.display(), "Memories appended");
        Ok(())
    }

    /// Load every parseable chunk from the file.
    ///
    /// Malformed lines, records missing required fields, and records with
    /// out-of-range numerics are skipped and counted. Records that omitted
    /// the optional derived fields get them recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Io`] only when the file itself cannot be
    /// opened or read; bad content never fails the load.
    pub fn load(&self) -> Result<LoadReport, LoaderError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut report = LoadReport::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_line(trimmed) {
                Ok(chunk) => report.chunks.push(chunk),
                Err(reason) => {
                    report.failed_lines = report.failed_lines.saturating_add(1);
                    warn!(line = line_no.saturating_add(1), %reason, "Skipping memory line");
                }
            }
        }

        info!(
            loaded = report.chunks.len(),
            failed = report.failed_lines,
            path = %self.path.display(),
            "Memories loaded"
        );
        Ok(report)
    }

    /// Lazily stream chunks from the file, skipping bad lines.
    ///
    /// The stream is finite and non-restartable; consumers must not assume
    /// random access.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Io`] if the file cannot be opened.
    pub fn stream(&self) -> Result<MemoryStream, LoaderError> {
        let file = File::open(&self.path)?;
        Ok(MemoryStream {
            lines: BufReader::new(file).lines(),
        })
    }
}

/// Lazy, finite, non-restartable chunk stream over a JSON Lines file.
#[derive(Debug)]
pub struct MemoryStream {
    lines: Lines<BufReader<File>>,
}

impl Iterator for MemoryStream {
    type Item = MemoryChunk;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => {
                    warn!(%err, "Memory stream read error; ending stream");
                    return None;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_line(trimmed) {
                Ok(chunk) => return Some(chunk),
                Err(reason) => {
                    warn!(%reason, "Skipping memory line in stream");
                }
            }
        }
    }
}

/// Parse and validate one JSON line into a chunk.
fn parse_line(line: &str) -> Result<MemoryChunk, String> {
    let mut chunk: MemoryChunk =
        serde_json::from_str(line).map_err(|e| format!("JSON decode error: {e}"))?;
    RecordRanges::of(&chunk)
        .validate()
        .map_err(|e| format!("out-of-range field: {e}"))?;
    if chunk.content_length == 0 && !chunk.content.is_empty() {
        chunk.recompute_derived();
    }
    Ok(chunk)
}
