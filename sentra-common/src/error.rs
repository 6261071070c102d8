//! Common error types for Sentra

use thiserror::Error;

/// Common result type for Sentra operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Sentra pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input; the operation had no side effects
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Requested entity not found, or no responders in range
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal state transition (e.g. re-triggering a reported session)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External collaborator (store, broker, blob, gateway) unavailable
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors a processing loop should skip rather than die on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Internal(_))
    }
}
