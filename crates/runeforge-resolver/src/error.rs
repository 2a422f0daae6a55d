//! Error types for dependency resolution.

use thiserror::Error;

/// Errors that can occur while resolving script dependencies.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// Coordinate string did not parse as `group:artifact:version`.
    #[error("Malformed coordinate: {0}")]
    MalformedCoordinate(String),

    /// No configured repository has the artifact.
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Transient failure talking to a repository. Reissuing the load command
    /// may succeed.
    #[error("Network failure fetching {coordinate}: {message}")]
    NetworkFailure { coordinate: String, message: String },

    /// Downloaded bytes did not match the checksum the repository published.
    /// Signals tampering or corruption; never retried automatically.
    #[error("Checksum mismatch for {coordinate}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        coordinate: String,
        expected: String,
        actual: String,
    },

    /// IO error touching the artifact cache.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolutionError {
    /// Whether reissuing the load command may succeed without operator
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolutionError::NetworkFailure { .. })
    }
}

/// Result type for resolver operations.
pub type ResolutionResult<T> = std::result::Result<T, ResolutionError>;
