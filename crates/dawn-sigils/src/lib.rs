//! Sigils: named regulatory intents with cascading activation.
//!
//! A sigil is the unit of self-regulation. Registering one runs its typed
//! effect against a pulse snapshot, may cascade into linked sigils (depth
//! limited), and leaves an activation record with a TTL. Re-registering an
//! active name, or a name still cooling down after decay, is suppressed
//! rather than an error -- suppression is an expected outcome the driver
//! reports, not a failure.
//!
//! The engine never touches other subsystems directly: effects mutate a
//! [`PulseSnapshot`] value the caller passes in, and anything beyond that
//! comes back as a [`SigilDirective`] for the driver to act on.
//!
//! [`PulseSnapshot`]: dawn_types::PulseSnapshot

pub mod effects;
pub mod engine;

pub use effects::{SigilDirective, SigilEffect, apply_effect};
pub use engine::{ActiveSigil, DecayedSigil, Registration, SigilEngine, SigilError, SuppressionReason};
