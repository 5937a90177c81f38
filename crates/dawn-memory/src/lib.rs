//! Memory routing and persistence.
//!
//! The [`MemoryRouter`] decides where each chunk lives: a small working
//! set of currently-influential memories, a rolling recent window, and a
//! bounded significant tier for everything above the importance threshold.
//! The [`MemoryLoader`] moves chunks to and from JSON Lines files,
//! skipping malformed lines with a counter instead of failing the load.
//!
//! The router is single-writer (the tick driver); readers take copies of
//! tier summaries. Chunks are held behind [`Arc`] so a memory can sit in
//! several tiers without duplication, matching the shared-by-immutable-
//! reference ownership rule.
//!
//! [`Arc`]: std::sync::Arc
//! [`MemoryRouter`]: router::MemoryRouter
//! [`MemoryLoader`]: loader::MemoryLoader

pub mod loader;
pub mod router;

pub use loader::{LoadReport, LoaderError, MemoryFilter, MemoryLoader, MemoryStream};
pub use router::{
    MemoryRouter, RetrievalContext, RouterConfig, RouterError, RouterStats, RoutingOutcome,
    importance,
};
