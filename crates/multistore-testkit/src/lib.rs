//! # Multistore Testkit
//!
//! Testing utilities for multistore.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fault injection**: [`FaultyKv`], a key-value store that fails on demand
//!   for chosen key ranges, chosen keys, or after a number of deletions
//! - **Generators**: seeded block generators and proptest strategies
//! - **Fixtures**: a populated registry over a fault-injectable store
//!
//! ## Fault Injection
//!
//! Make one namespace unreadable and watch the aggregate view route around it:
//!
//! ```rust,no_run
//! use multistore::Blockstore;
//! use multistore_testkit::RegistryFixture;
//!
//! async fn example() {
//!     let fixture = RegistryFixture::new(3, 4).await.unwrap();
//!     let (broken, _) = fixture.stores[1].clone();
//!     fixture.kv.fail_namespace(broken);
//!
//!     let target = fixture.blocks[2][0].clone();
//!     let everywhere = fixture.registry.multi_read_blockstore();
//!     assert_eq!(everywhere.get(target.id()).await.unwrap(), target);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use multistore_testkit::generators::block;
//!
//! proptest! {
//!     #[test]
//!     fn block_verifies(b in block(256)) {
//!         prop_assert!(b.verify().is_ok());
//!     }
//! }
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;

pub use faults::FaultyKv;
pub use fixtures::RegistryFixture;
pub use generators::{random_blocks, RegistryOp};
