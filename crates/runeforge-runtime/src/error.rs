//! Error types for context construction and script evaluation.

use thiserror::Error;

/// Errors that can occur while building or running a script context.
#[derive(Error, Debug)]
pub enum ContextError {
    /// Failed to parse a script manifest.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// An artifact's source failed to compile or evaluate.
    #[error("Malformed artifact {coordinate}: {message}")]
    MalformedArtifact { coordinate: String, message: String },

    /// A previous context for the same script is still live. Teardown must
    /// complete before a new context is constructed.
    #[error("Previous context for '{0}' has not been torn down")]
    TeardownConflict(String),

    /// The script's own code failed to compile or run.
    #[error("Script error in '{identity}': {message}")]
    Script { identity: String, message: String },

    /// IO error reading script or artifact sources.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for runtime operations.
pub type ContextResult<T> = std::result::Result<T, ContextError>;
