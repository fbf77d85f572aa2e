//! Error types for the multistore core.

use thiserror::Error;

/// Errors produced while constructing or verifying core values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Handle 0 is reserved and never names a sub-store.
    #[error("invalid store id: {0}")]
    InvalidStoreId(u64),

    /// A block id must be exactly 32 bytes.
    #[error("invalid block id length: expected 32 bytes, got {0}")]
    InvalidBlockIdLength(usize),

    #[error("block hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
