//! # Multistore
//!
//! Namespace multiplexing over a single shared key-value store: many
//! logically isolated block stores, each named by a small integer handle,
//! living side by side in one underlying store.
//!
//! ## Overview
//!
//! - **Registry** ([`MultiStore`]): allocates, opens, lists and deletes
//!   handles, persisting the next-handle counter and the live-handle set so
//!   state survives a restart.
//! - **Sub-stores** ([`SubStore`]): per-handle key-value and block views
//!   confined to the handle's key prefix.
//! - **Aggregate reader** ([`MultiReadBlockstore`]): a read-only view that
//!   answers "does any open sub-store hold this block" and fetches it from
//!   whichever one does, collecting per-store failures instead of aborting.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use multistore::{Blockstore, MultiStore};
//! use multistore::core::Block;
//! use multistore::kv::SqliteKv;
//!
//! async fn example() {
//!     let kv = SqliteKv::open("stores.db").unwrap();
//!     let registry = MultiStore::open(kv).await.unwrap();
//!
//!     let id = registry.allocate().await.unwrap();
//!     let store = registry.get(id).await.unwrap();
//!     let block = Block::new(b"hello".to_vec());
//!     store.put(&block).await.unwrap();
//!
//!     let everywhere = registry.multi_read_blockstore();
//!     assert!(everywhere.has(block.id()).await.unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `multistore::core` - Handles, content addresses and blocks
//! - `multistore::kv` - The shared key-value store abstraction and backends

pub mod blockstore;
pub mod config;
pub mod error;
pub mod multi_read;
pub mod namespace;
pub mod registry;
pub mod substore;

pub use multistore_core as core;
pub use multistore_kv as kv;

pub use blockstore::{Blockstore, KvBlockstore};
pub use config::MultiStoreConfig;
pub use error::{AggregateError, MultiStoreError, ProbeFailure, ProbeOp, Result};
pub use multi_read::MultiReadBlockstore;
pub use registry::MultiStore;
pub use substore::{NamespacedKv, StoreState, SubStore};

pub use multistore_core::{Block, BlockId, StoreId};
