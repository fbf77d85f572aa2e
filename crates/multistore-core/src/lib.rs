//! # Multistore Core
//!
//! Pure primitives shared by every multistore crate: sub-store handles,
//! content addresses, and blocks.
//!
//! This crate contains no I/O and no storage. It is pure computation over
//! identifiers and byte buffers.
//!
//! ## Key Types
//!
//! - [`StoreId`] - Non-zero handle naming one sub-store
//! - [`BlockId`] - Content address of a block (Blake3 hash of its bytes)
//! - [`Block`] - Raw bytes paired with their content address

pub mod block;
pub mod error;
pub mod types;

pub use block::Block;
pub use error::{CoreError, Result};
pub use types::{BlockId, StoreId};
