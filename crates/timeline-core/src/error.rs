//! Error types for timeline-core

use thiserror::Error;

/// Result type alias using timeline-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by local persistence, the content store, and the mutation queue
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Referenced media file does not exist
    #[error("Media file not found: {0}")]
    MissingMedia(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Content store error
    #[error("Storage error: {0}")]
    Storage(String),
}
