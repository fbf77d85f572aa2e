//! Error types for the key-value layer.

use thiserror::Error;

/// Errors that can occur during key-value operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking task could not be joined.
    #[error("blocking task failed: {0}")]
    Task(String),

    /// A scoped view was used after the namespace behind it went away.
    #[error("view detached: {0}")]
    Detached(String),

    /// Generic backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for key-value operations.
pub type Result<T> = std::result::Result<T, KvError>;
