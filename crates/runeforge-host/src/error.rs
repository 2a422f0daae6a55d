//! Error types for the host bridge and event surface.

use thiserror::Error;

/// Errors from submitting work to the host thread.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BridgeError {
    /// The host submission queue is full.
    #[error("Host thread is busy")]
    HostBusy,

    /// The owning script context was torn down before the task ran. The
    /// task body was never executed.
    #[error("Submission cancelled")]
    Cancelled,

    /// The host thread has shut down.
    #[error("Host thread has shut down")]
    ShutDown,
}

/// Result type for bridge operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Errors from script handler registration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    /// Unknown event kind name.
    #[error("Unknown event kind: {0}")]
    UnknownEvent(String),

    /// Unknown handler priority name.
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    /// Registration attempted outside the script load window.
    #[error("Handlers can only be registered during script load")]
    RegistrationClosed,

    /// A scheduled task period must be positive.
    #[error("Schedule period must be greater than zero")]
    InvalidPeriod,
}
