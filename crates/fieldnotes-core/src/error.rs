//! Error types for fieldnotes-core

use thiserror::Error;

/// Result type alias using fieldnotes-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldnotes-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Device is not registered for this owner
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Note not found (or tombstoned, for owner-facing reads)
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// Note belongs to a different owner
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error originates in the persistence layer.
    pub const fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::LibSql(_) | Self::Io(_))
    }
}
