//! Pre-populated registries for integration tests.

use std::sync::Arc;

use multistore::{Blockstore, MultiStore, MultiStoreConfig, Result, SubStore};
use multistore_core::{Block, StoreId};

use crate::faults::FaultyKv;
use crate::generators::random_blocks;

const BLOCK_SIZE: usize = 128;

/// A registry over a [`FaultyKv`] with a few sub-stores already filled.
///
/// `stores[i]` holds the blocks in `blocks[i]`. Every block is distinct.
pub struct RegistryFixture {
    pub kv: FaultyKv,
    pub registry: MultiStore,
    pub stores: Vec<(StoreId, Arc<SubStore>)>,
    pub blocks: Vec<Vec<Block>>,
}

impl RegistryFixture {
    pub async fn new(store_count: usize, blocks_per_store: usize) -> Result<Self> {
        Self::with_config(store_count, blocks_per_store, MultiStoreConfig::default()).await
    }

    pub async fn with_config(
        store_count: usize,
        blocks_per_store: usize,
        config: MultiStoreConfig,
    ) -> Result<Self> {
        let kv = FaultyKv::new();
        let registry = MultiStore::open_with_config(kv.clone(), config).await?;

        let mut stores = Vec::with_capacity(store_count);
        let mut blocks = Vec::with_capacity(store_count);
        for i in 0..store_count {
            let id = registry.allocate().await?;
            let store = registry.get(id).await?;
            let batch = random_blocks(blocks_per_store, BLOCK_SIZE, i as u64);
            store.put_many(&batch).await?;
            stores.push((id, store));
            blocks.push(batch);
        }

        Ok(Self {
            kv,
            registry,
            stores,
            blocks,
        })
    }

    /// A second registry over the same underlying store, as after a restart.
    pub async fn reopen(&self) -> Result<MultiStore> {
        MultiStore::open_with_config(self.kv.clone(), self.registry.config().clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_populates_each_store() {
        let fixture = RegistryFixture::new(3, 4).await.unwrap();
        assert_eq!(fixture.registry.list().await.len(), 3);

        for ((_, store), batch) in fixture.stores.iter().zip(&fixture.blocks) {
            assert_eq!(batch.len(), 4);
            for block in batch {
                assert_eq!(store.get(block.id()).await.unwrap(), *block);
            }
        }
    }

    #[tokio::test]
    async fn test_reopen_sees_same_handles() {
        let fixture = RegistryFixture::new(2, 1).await.unwrap();
        let again = fixture.reopen().await.unwrap();
        assert_eq!(again.list().await, fixture.registry.list().await);
    }
}
