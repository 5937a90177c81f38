//! The sigil engine: activation records, suppression, cascade, decay.
//!
//! Invariants maintained here:
//!
//! - at most one activation per name in the active set;
//! - cascade activation is depth-limited (default 3) so chains terminate;
//! - a decayed or pruned name enters a suppression cooldown keyed to the
//!   monotone tick clock, so it cannot immediately re-activate;
//! - every decay produces a record the driver turns into a SIGIL event.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use dawn_types::PulseSnapshot;

use crate::effects::{SigilDirective, SigilEffect, apply_effect};

/// Default activation lifetime, in ticks.
pub const DEFAULT_TTL_TICKS: u64 = 5;

/// Default suppression cooldown after decay, in ticks.
const SUPPRESSION_COOLDOWN_TICKS: u64 = 2;

/// Maximum cascade depth (the root registration is depth 0).
const MAX_CASCADE_DEPTH: u8 = 3;

/// Errors from the sigil engine.
#[derive(Debug, thiserror::Error)]
pub enum SigilError {
    /// The name does not resolve to any known sigil.
    #[error("unknown sigil: {name}")]
    UnknownSigil {
        /// The rejected name.
        name: String,
    },
}

/// One live activation in the active set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSigil {
    /// Canonical sigil name (unique within the active set).
    pub name: String,
    /// What registered it (rule tag, `"cascade"`, operator, ...).
    pub source: String,
    /// Tick on which it activated.
    pub activated_tick: u64,
    /// Wall-clock activation time.
    pub activated_at: DateTime<Utc>,
    /// Ticks until decay.
    pub ttl_ticks: u64,
    /// Cascade depth at activation (0 for direct registrations).
    pub cascade_depth: u8,
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Registration {
    /// The sigil activated; cascade lists any linked names that activated
    /// with it, and directives carry side requests for the driver.
    Activated {
        /// Linked sigil names that activated through the cascade.
        cascade: Vec<String>,
        /// Side requests raised by the effect(s).
        directives: Vec<SigilDirective>,
    },
    /// The sigil did not activate.
    Suppressed {
        /// Why it was suppressed.
        reason: SuppressionReason,
    },
}

impl Registration {
    /// Whether the registration activated the sigil.
    pub const fn activated(&self) -> bool {
        matches!(self, Self::Activated { .. })
    }
}

/// Why a registration was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// The name is already in the active set.
    AlreadyActive,
    /// The name is cooling down after a recent decay.
    Cooldown,
    /// The cascade reached its depth limit.
    DepthLimit,
}

/// A decayed activation, reported so the driver can emit its event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecayedSigil {
    /// The sigil that decayed.
    pub name: String,
    /// Tick on which it had activated.
    pub activated_tick: u64,
    /// Tick on which it decayed.
    pub decayed_tick: u64,
}

/// Registry of active sigils and suppression cooldowns.
#[derive(Debug, Clone, Default)]
pub struct SigilEngine {
    active: BTreeMap<String, ActiveSigil>,
    /// name -> tick at which the cooldown ends (exclusive).
    suppression: BTreeMap<String, u64>,
    activations_this_tick: u64,
    total_activations: u64,
}

impl SigilEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sigil by name at the given tick.
    ///
    /// Runs the effect against `pulse` on activation, then attempts the
    /// cascade links (source `"cascade"`, depth-limited). Suppression is a
    /// normal outcome; only unknown names are errors.
    ///
    /// # Errors
    ///
    /// Returns [`SigilError::UnknownSigil`] when the name has no built-in
    /// effect.
    pub fn register(
        &mut self,
        name: &str,
        source: &str,
        tick: u64,
        pulse: &mut PulseSnapshot,
    ) -> Result<Registration, SigilError> {
        self.register_at_depth(name, source, tick, pulse, 0)
    }

    /// Advance the engine to a new tick: expire TTLs and reset the
    /// per-tick activation counter. Returns the decayed activations.
    pub fn begin_tick(&mut self, tick: u64) -> Vec<DecayedSigil> {
        self.activations_this_tick = 0;

        let expired: Vec<String> = self
            .active
            .iter()
            .filter(|(_, sigil)| tick >= sigil.activated_tick.saturating_add(sigil.ttl_ticks))
            .map(|(name, _)| name.clone())
            .collect();

        let mut decayed = Vec::with_capacity(expired.len());
        for name in expired {
            if let Some(sigil) = self.active.remove(&name) {
                self.suppression.insert(
                    name.clone(),
                    tick.saturating_add(SUPPRESSION_COOLDOWN_TICKS),
                );
                debug!(sigil = %name, activated = sigil.activated_tick, "Sigil decayed");
                decayed.push(DecayedSigil {
                    name,
                    activated_tick: sigil.activated_tick,
                    decayed_tick: tick,
                });
            }
        }

        // Drop cooldowns that have already elapsed.
        self.suppression.retain(|_, deadline| *deadline > tick);
        decayed
    }

    /// Drain the whole active set (the prune reflex). Returns the drained
    /// activations so the driver can emit per-sigil decay events.
    pub fn prune_all(&mut self, tick: u64) -> Vec<DecayedSigil> {
        let drained: Vec<DecayedSigil> = self
            .active
            .values()
            .map(|sigil| DecayedSigil {
                name: sigil.name.clone(),
                activated_tick: sigil.activated_tick,
                decayed_tick: tick,
            })
            .collect();
        for sigil in drained.iter() {
            self.suppression.insert(
                sigil.name.clone(),
                tick.saturating_add(SUPPRESSION_COOLDOWN_TICKS),
            );
        }
        self.active.clear();
        if !drained.is_empty() {
            info!(count = drained.len(), "Sigil ring pruned");
        }
        drained
    }

    /// Names currently active, in deterministic (sorted) order.
    pub fn active_names(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    /// Whether a name is currently active.
    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains_key(name)
    }

    /// Number of active sigils.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// View of the active records, in name order.
    pub fn active(&self) -> impl Iterator<Item = &ActiveSigil> {
        self.active.values()
    }

    /// Activations since the last [`begin_tick`](Self::begin_tick).
    pub const fn activations_this_tick(&self) -> u64 {
        self.activations_this_tick
    }

    /// Lifetime activation count.
    pub const fn total_activations(&self) -> u64 {
        self.total_activations
    }

    fn register_at_depth(
        &mut self,
        name: &str,
        source: &str,
        tick: u64,
        pulse: &mut PulseSnapshot,
        depth: u8,
    ) -> Result<Registration, SigilError> {
        let effect = SigilEffect::from_name(name).ok_or_else(|| SigilError::UnknownSigil {
            name: String::from(name),
        })?;

        if depth >= MAX_CASCADE_DEPTH {
            return Ok(Registration::Suppressed {
                reason: SuppressionReason::DepthLimit,
            });
        }
        if self.active.contains_key(name) {
            return Ok(Registration::Suppressed {
                reason: SuppressionReason::AlreadyActive,
            });
        }
        if self.suppression.get(name).is_some_and(|end| *end > tick) {
            return Ok(Registration::Suppressed {
                reason: SuppressionReason::Cooldown,
            });
        }

        self.active.insert(
            String::from(name),
            ActiveSigil {
                name: String::from(name),
                source: String::from(source),
                activated_tick: tick,
                activated_at: Utc::now(),
                ttl_ticks: DEFAULT_TTL_TICKS,
                cascade_depth: depth,
            },
        );
        self.activations_this_tick = self.activations_this_tick.saturating_add(1);
        self.total_activations = self.total_activations.saturating_add(1);
        info!(sigil = name, source, tick, depth, "Sigil activated");

        let mut directives = Vec::new();
        if let Some(directive) = apply_effect(effect, pulse) {
            if directive == SigilDirective::ActiveSetCleared {
                // Emergency reset wipes the ring; keep only the reset
                // itself so its own TTL still bounds it.
                let survivor = self.active.remove(name);
                self.active.clear();
                if let Some(s) = survivor {
                    self.active.insert(String::from(name), s);
                }
            }
            directives.push(directive);
        }

        let mut cascade = Vec::new();
        for linked in effect.cascade_links() {
            let next_depth = depth.saturating_add(1);
            match self.register_at_depth(linked, "cascade", tick, pulse, next_depth)? {
                Registration::Activated {
                    cascade: nested,
                    directives: nested_directives,
                } => {
                    cascade.push(String::from(*linked));
                    cascade.extend(nested);
                    directives.extend(nested_directives);
                }
                Registration::Suppressed { reason } => {
                    debug!(sigil = linked, ?reason, "Cascade suppressed");
                }
            }
        }

        Ok(Registration::Activated {
            cascade,
            directives,
        })
    }
}
