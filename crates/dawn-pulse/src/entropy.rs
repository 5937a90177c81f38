//! Entropy analyzer: rolling window, chaos warnings, hot-bloom tracking.
//!
//! The analyzer ingests one entropy sample per tick. A warning fires when
//! the sample itself reaches the spike threshold (0.85, inclusive) or when
//! the short-term mean (last 8 samples) rises more than 0.2 above the
//! mid-term mean (last 64). Volatility is the population standard
//! deviation of the short window.
//!
//! Hot-bloom detection is a small side channel: the router notes each
//! stored chunk's entropy here, and the analyzer can report the top-k
//! recent chunk identifiers whose entropy reached the hot threshold.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use dawn_types::MemoryId;

/// Capacity of the rolling sample window.
const WINDOW_CAPACITY: usize = 256;

/// Length of the short-term window (volatility, short mean).
const SHORT_WINDOW: usize = 8;

/// Length of the mid-term window (baseline mean).
const MID_WINDOW: usize = 64;

/// Absolute sample value at which a warning always fires (inclusive).
const SPIKE_THRESHOLD: f64 = 0.85;

/// Short-mean rise over the mid-mean that fires a warning.
const RISE_THRESHOLD: f64 = 0.2;

/// Chunk entropy at or above this value counts as a hot bloom.
const HOT_BLOOM_THRESHOLD: f64 = 0.7;

/// Capacity of the recent-bloom side buffer.
const BLOOM_CAPACITY: usize = 64;

/// Errors from the entropy analyzer.
#[derive(Debug, thiserror::Error)]
pub enum EntropyError {
    /// A sample outside the `[0, 1]` entropy range (or non-finite).
    #[error("entropy sample {value} outside [0, 1]")]
    SampleOutOfRange {
        /// The rejected sample.
        value: f64,
    },
}

/// Result of analyzing one entropy sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntropyReading {
    /// The accepted sample.
    pub sample: f64,
    /// Difference from the previous sample (0 for the first).
    pub delta: f64,
    /// Whether a chaos warning fired on this sample.
    pub warning_triggered: bool,
    /// Population standard deviation of the short window.
    pub volatility: f64,
}

/// Summary of the analyzer state for snapshot consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EntropySummary {
    /// Most recent sample (0 before the first sample).
    pub current: f64,
    /// Mean over the full window.
    pub mean: f64,
    /// Short-window volatility.
    pub volatility: f64,
    /// Number of samples currently held.
    pub samples: usize,
    /// Total warnings fired since construction.
    pub warnings_triggered: u64,
}

/// Rolling-window entropy analyzer.
#[derive(Debug, Clone, Default)]
pub struct EntropyAnalyzer {
    window: VecDeque<f64>,
    warnings: u64,
    recent_blooms: VecDeque<(MemoryId, f64)>,
}

impl EntropyAnalyzer {
    /// Create an empty analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one sample and report delta, warning, and volatility.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::SampleOutOfRange`] for non-finite samples or
    /// samples outside `[0, 1]`; the window is untouched in that case.
    pub fn analyze(&mut self, sample: f64) -> Result<EntropyReading, EntropyError> {
        if !sample.is_finite() || !(0.0..=1.0).contains(&sample) {
            return Err(EntropyError::SampleOutOfRange { value: sample });
        }

        let delta = self.window.back().map_or(0.0, |prev| sample - prev);

        if self.window.len() >= WINDOW_CAPACITY {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        let short_mean = self.tail_mean(SHORT_WINDOW);
        let mid_mean = self.tail_mean(MID_WINDOW);
        let warning_triggered =
            sample >= SPIKE_THRESHOLD || (short_mean - mid_mean) > RISE_THRESHOLD;
        if warning_triggered {
            self.warnings = self.warnings.saturating_add(1);
            debug!(sample, delta, short_mean, mid_mean, "Entropy warning");
        }

        Ok(EntropyReading {
            sample,
            delta,
            warning_triggered,
            volatility: self.volatility(),
        })
    }

    /// Associate a stored chunk with its entropy for hot-bloom tracking.
    pub fn note_bloom(&mut self, chunk_id: MemoryId, entropy: f64) {
        if self.recent_blooms.len() >= BLOOM_CAPACITY {
            self.recent_blooms.pop_front();
        }
        self.recent_blooms.push_back((chunk_id, entropy));
    }

    /// Top-`k` recent chunk identifiers whose entropy reached the hot
    /// threshold, highest entropy first.
    pub fn hot_blooms(&self, k: usize) -> Vec<MemoryId> {
        let mut hot: Vec<(&MemoryId, f64)> = self
            .recent_blooms
            .iter()
            .filter(|(_, e)| *e >= HOT_BLOOM_THRESHOLD)
            .map(|(id, e)| (id, *e))
            .collect();
        hot.sort_by(|a, b| b.1.total_cmp(&a.1));
        hot.into_iter().take(k).map(|(id, _)| id.clone()).collect()
    }

    /// Population standard deviation of the short window.
    pub fn volatility(&self) -> f64 {
        let len = self.window.len();
        let start = len.saturating_sub(SHORT_WINDOW);
        let tail: Vec<f64> = self.window.iter().skip(start).copied().collect();
        if tail.len() < 2 {
            return 0.0;
        }
        let count = u32::try_from(tail.len()).map(f64::from).unwrap_or(f64::MAX);
        let mean = tail.iter().sum::<f64>() / count;
        let variance = tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        variance.sqrt()
    }

    /// Summary for snapshot consumers.
    pub fn summary(&self) -> EntropySummary {
        let samples = self.window.len();
        let mean = if samples == 0 {
            0.0
        } else {
            let count = u32::try_from(samples).map(f64::from).unwrap_or(f64::MAX);
            self.window.iter().sum::<f64>() / count
        };
        EntropySummary {
            current: self.window.back().copied().unwrap_or(0.0),
            mean,
            volatility: self.volatility(),
            samples,
            warnings_triggered: self.warnings,
        }
    }

    fn tail_mean(&self, span: usize) -> f64 {
        let len = self.window.len();
        let start = len.saturating_sub(span);
        let tail_len = len.saturating_sub(start);
        if tail_len == 0 {
            return 0.0;
        }
        let count = u32::try_from(tail_len).map(f64::from).unwrap_or(f64::MAX);
        self.window.iter().skip(start).sum::<f64>() / count
    }
}
