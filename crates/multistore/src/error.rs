//! Error types for the registry and its block-store views.

use std::fmt;

use multistore_core::{BlockId, CoreError, StoreId};
use multistore_kv::KvError;
use thiserror::Error;

/// Errors that can occur during multistore operations.
#[derive(Debug, Error)]
pub enum MultiStoreError {
    /// The handle is not in the live set, or was deleted.
    #[error("store {0} not found")]
    StoreNotFound(StoreId),

    /// No reachable store holds the block.
    #[error("block {0} not found")]
    BlockNotFound(BlockId),

    /// The handle was issued before the registry was closed.
    #[error("store {0} is closed")]
    StoreClosed(StoreId),

    /// Operation not supported by this view.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// One or more sub-store probes failed and no answer was found.
    #[error("{0}")]
    Aggregate(AggregateError),

    /// Failure passed through from the shared key-value store.
    #[error("storage error: {0}")]
    Kv(#[from] KvError),

    /// Core value error (e.g. hash mismatch on a verified read).
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Persisted registry records could not be decoded or are inconsistent.
    #[error("corrupt registry metadata: {0}")]
    CorruptMetadata(String),

    /// Registry metadata could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Every representable handle has been allocated.
    #[error("store id space exhausted")]
    Exhausted,
}

impl MultiStoreError {
    /// True for both store and block absence.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoreNotFound(_) | Self::BlockNotFound(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// The per-store failures, if this is an aggregate error.
    pub fn as_aggregate(&self) -> Option<&AggregateError> {
        match self {
            Self::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }
}

/// Result type for multistore operations.
pub type Result<T> = std::result::Result<T, MultiStoreError>;

/// Which block-store call a probe was making when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOp {
    Has,
    Get,
}

impl fmt::Display for ProbeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOp::Has => write!(f, "has"),
            ProbeOp::Get => write!(f, "get"),
        }
    }
}

/// One failed probe against one sub-store.
#[derive(Debug)]
pub struct ProbeFailure {
    /// The sub-store that produced the error.
    pub store: StoreId,
    /// The call that failed.
    pub op: ProbeOp,
    /// The error it returned.
    pub error: MultiStoreError,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (store {}): {}", self.op, self.store, self.error)
    }
}

/// Ordered collection of probe failures, in the order the stores were probed.
#[derive(Debug)]
pub struct AggregateError {
    failures: Vec<ProbeFailure>,
}

impl AggregateError {
    pub fn new(failures: Vec<ProbeFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[ProbeFailure] {
        &self.failures
    }

    /// The stores that failed, in probe order.
    pub fn stores(&self) -> Vec<StoreId> {
        self.failures.iter().map(|f| f.store).collect()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_failures(self) -> Vec<ProbeFailure> {
        self.failures
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sub-store probe(s) failed", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
