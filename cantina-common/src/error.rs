//! Common error types for the cantina access engine

use std::time::Duration;
use thiserror::Error;

/// Common result type for cantina operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the engine and the HTTP service
///
/// Access denials (unknown badge, duplicate access) are not errors; they
/// travel as [`crate::models::OutcomeKind`] values.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing badge id, bad date, bad report parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Admin secret rejected
    #[error("Unauthorized")]
    Unauthorized,

    /// Ledger store failure (wraps sqlx::Error)
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Ledger call exceeded its time bound
    #[error("Storage timed out after {0:?}")]
    StorageTimeout(Duration),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encode/decode error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures of the ledger store itself
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::StorageTimeout(_))
    }
}
