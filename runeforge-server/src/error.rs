//! Lifecycle error taxonomy.

use runeforge_resolver::ResolutionError;
use runeforge_runtime::{ContextError, ScriptIdentity};
use thiserror::Error;

/// Errors surfaced by lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The identity already has an active context.
    #[error("Script '{0}' is already loaded")]
    AlreadyActive(ScriptIdentity),

    /// No such script: not on disk for load, not registered for reload.
    #[error("Script '{0}' not found")]
    NotFound(ScriptIdentity),

    /// The requested transition is not legal from the current state.
    #[error("Cannot {operation} '{identity}' while {state}")]
    InvalidTransition {
        identity: ScriptIdentity,
        state: &'static str,
        operation: &'static str,
    },

    /// A bounded stage exceeded its configured timeout.
    #[error("Timed out while {stage} '{identity}'")]
    Timeout {
        identity: ScriptIdentity,
        stage: &'static str,
    },

    /// Dependency resolution failed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Context construction or script evaluation failed.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl LifecycleError {
    /// Whether reissuing the command may succeed without operator
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            LifecycleError::Timeout { .. } => true,
            LifecycleError::Resolution(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;
