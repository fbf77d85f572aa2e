//! Block generators and proptest strategies.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use multistore_core::{Block, BlockId, StoreId};

/// Deterministic pseudo-random blocks of `size` bytes.
///
/// The same seed always yields the same blocks.
pub fn random_blocks(count: usize, size: usize, seed: u64) -> Vec<Block> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut data = vec![0u8; size];
            rng.fill_bytes(&mut data);
            Block::new(data)
        })
        .collect()
}

/// Generate block payload bytes of at most `max_len`.
pub fn block_data(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a block.
pub fn block(max_len: usize) -> impl Strategy<Value = Block> {
    block_data(max_len).prop_map(Block::new)
}

/// Generate a random BlockId.
pub fn block_id() -> impl Strategy<Value = BlockId> {
    any::<[u8; 32]>().prop_map(BlockId::from_bytes)
}

/// Generate a valid (non-zero) StoreId.
pub fn store_id() -> impl Strategy<Value = StoreId> {
    (1u64..).prop_map(|n| StoreId::new(n).unwrap_or(StoreId::FIRST))
}

/// One step of a registry workload.
#[derive(Debug, Clone)]
pub enum RegistryOp {
    Allocate,
    /// Delete the live handle at this position (modulo the live count).
    Delete(prop::sample::Index),
    /// Drop the registry and open a new one over the same store.
    Reopen,
}

/// Generate a registry workload, weighted towards allocation.
pub fn registry_ops(max_len: usize) -> impl Strategy<Value = Vec<RegistryOp>> {
    let op = prop_oneof![
        4 => Just(RegistryOp::Allocate),
        2 => any::<prop::sample::Index>().prop_map(RegistryOp::Delete),
        1 => Just(RegistryOp::Reopen),
    ];
    prop::collection::vec(op, 0..=max_len)
}
