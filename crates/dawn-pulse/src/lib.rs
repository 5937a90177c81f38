//! Thermal pulse controller and entropy analyzer.
//!
//! These are the two sensors the tick driver polls at the top of every
//! tick. The [`PulseController`] owns the live [`PulseSnapshot`] (heat,
//! entropy, SCUP, mood, zone) plus a short heat history used for trend
//! derivation; the [`EntropyAnalyzer`] keeps a rolling window of entropy
//! samples and raises chaos warnings.
//!
//! Both expose read snapshots and typed mutators only; neither knows about
//! the driver, memory, or sigils.
//!
//! [`PulseSnapshot`]: dawn_types::PulseSnapshot
//! [`PulseController`]: controller::PulseController
//! [`EntropyAnalyzer`]: entropy::EntropyAnalyzer

pub mod controller;
pub mod entropy;

pub use controller::{PulseController, PulseError, PulseUpdate, UpdateOutcome};
pub use entropy::{EntropyAnalyzer, EntropyError, EntropyReading, EntropySummary};
