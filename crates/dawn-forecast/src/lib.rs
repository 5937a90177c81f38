//! Deterministic behavior forecasting.
//!
//! The forecasting engine turns a [`Passion`] (what the system is leaning
//! toward), an [`Acquaintance`] (how familiar the territory is), an
//! opportunity level, and a time delta into the five forecast scalars
//! (F, P, p, RL, LH) plus a confidence band and a predicted-behavior tag.
//!
//! Everything here is a pure function: equal inputs always produce equal
//! results, no clocks, no randomness. Forecast results live for one tick
//! and are discarded after the driver records them.

pub mod contextual;
pub mod engine;
pub mod models;

pub use contextual::{derive_acquaintance, derive_passion};
pub use engine::{
    ForecastEngine, ForecastError, ForecastResult, SensitivityAnalysis, SensitivityPoint,
    opportunity_from_pulse,
};
pub use models::{Acquaintance, Passion};
