//! # Multistore KV
//!
//! The shared key-value store that every sub-store lives inside. Provides a
//! trait-based interface over raw byte keys with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The [`KvStore`] trait is the only thing the namespace registry needs from
//! its backing store: point reads and writes, existence checks, and a prefix
//! scan used to erase a whole namespace. The primary implementation is
//! [`SqliteKv`], with [`MemoryKv`] for tests and ephemeral use.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use multistore_kv::{KvStore, SqliteKv};
//!
//! async fn example() {
//!     let kv = SqliteKv::open("stores.db").unwrap();
//!     kv.put(b"greeting", Bytes::from_static(b"hello")).await.unwrap();
//!     let keys = kv.keys_with_prefix(b"greet").await.unwrap();
//!     assert_eq!(keys, vec![b"greeting".to_vec()]);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No cross-key transactions**: callers must tolerate two `put`s not
//!   being atomic with respect to each other.
//! - **Ordered scans**: `keys_with_prefix` returns keys in ascending byte order.
//! - **Idempotent deletes**: deleting an absent key is not an error.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{KvError, Result};
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;
pub use traits::{prefix_upper_bound, KvStore};
