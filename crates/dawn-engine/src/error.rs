//! Engine-level errors and their process exit codes.

use dawn_core::{ConfigError, CoreError};
use dawn_memory::LoaderError;

/// Errors surfaced by the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration could not be loaded or was invalid.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Memory persistence failed.
    #[error("persistence error: {source}")]
    Persistence {
        /// The underlying loader error.
        #[from]
        source: LoaderError,
    },

    /// A memory file failed format verification.
    #[error("{failed} of {total} lines failed verification in {path}")]
    VerificationFailed {
        /// Lines that did not parse or validate.
        failed: usize,
        /// Total lines considered.
        total: usize,
        /// The file that was verified.
        path: String,
    },

    /// Memories could not be persisted during shutdown.
    #[error("{count} memories left unpersisted at shutdown")]
    ShutdownPersist {
        /// Number of chunks that never reached disk.
        count: usize,
    },

    /// The core reported an invariant violation.
    #[error("internal invariant violation: {source}")]
    Invariant {
        /// The underlying core error.
        #[from]
        source: CoreError,
    },
}

impl EngineError {
    /// The process exit code for this error (2 bad arguments/config,
    /// 3 persistence, 4 invariant violation).
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } => 2,
            Self::Persistence { .. }
            | Self::VerificationFailed { .. }
            | Self::ShutdownPersist { .. } => 3,
            Self::Invariant { .. } => 4,
        }
    }
}
