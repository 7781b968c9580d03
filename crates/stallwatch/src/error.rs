//! Error types for the stall watchdog.
//!
//! Stalls themselves are not errors: they are reported through the stall
//! policy. These errors cover misconfiguration and probe thread lifecycle.

use thiserror::Error;

/// Errors that can occur while configuring or running the watchdog.
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The probe scheduler is single-use and was already started.
    #[error("Probe scheduler already started")]
    AlreadyStarted,

    /// The operating system refused to spawn the probe thread.
    #[error("Failed to spawn probe thread")]
    SpawnFailed(#[source] std::io::Error),

    /// The probe thread panicked, most likely inside the stall handler.
    #[error("Probe thread panicked")]
    ProbePanicked,

    /// Configuration text could not be parsed.
    #[error("Failed to parse configuration")]
    ConfigParse(#[from] serde_json::Error),
}

impl WatchdogError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a spawn failure error.
    #[must_use]
    pub fn spawn_failed(source: std::io::Error) -> Self {
        Self::SpawnFailed(source)
    }
}

/// A specialized `Result` type for watchdog operations.
pub type WatchdogResult<T> = std::result::Result<T, WatchdogError>;
