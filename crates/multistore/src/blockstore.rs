//! Blockstore trait: the content-addressed block capability set.
//!
//! Anything implementing [`Blockstore`] can be probed by the aggregate
//! read-only view. [`KvBlockstore`] layers blocks over any [`KvStore`],
//! storing each block under its 32-byte address.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use multistore_core::{Block, BlockId};
use multistore_kv::KvStore;

use crate::error::{MultiStoreError, Result};

/// Async interface for content-addressed block storage.
#[async_trait]
pub trait Blockstore: Send + Sync {
    /// Check if a block is present.
    async fn has(&self, id: &BlockId) -> Result<bool>;

    /// Fetch a block. Fails with `BlockNotFound` if absent.
    async fn get(&self, id: &BlockId) -> Result<Block>;

    /// Size in bytes of a stored block.
    async fn get_size(&self, id: &BlockId) -> Result<usize>;

    /// Store a block under its own address.
    async fn put(&self, block: &Block) -> Result<()>;

    async fn put_many(&self, blocks: &[Block]) -> Result<()>;

    /// Remove a block. Removing an absent block succeeds.
    async fn delete_block(&self, id: &BlockId) -> Result<()>;

    /// Every block address currently stored.
    async fn all_keys(&self) -> Result<Vec<BlockId>>;

    /// Toggle recomputing the address of every block returned by `get`.
    fn hash_on_read(&self, enabled: bool);
}

/// Blockstore over a key-value store, keyed by raw block address.
pub struct KvBlockstore<K> {
    kv: K,
    hash_on_read: AtomicBool,
}

impl<K: KvStore> KvBlockstore<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            hash_on_read: AtomicBool::new(false),
        }
    }

    /// The key-value store blocks are written to.
    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn verifies_on_read(&self) -> bool {
        self.hash_on_read.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<K: KvStore> Blockstore for KvBlockstore<K> {
    async fn has(&self, id: &BlockId) -> Result<bool> {
        Ok(self.kv.has(id.as_bytes()).await?)
    }

    async fn get(&self, id: &BlockId) -> Result<Block> {
        let data = self
            .kv
            .get(id.as_bytes())
            .await?
            .ok_or(MultiStoreError::BlockNotFound(*id))?;
        let block = Block::with_id(*id, data);
        if self.verifies_on_read() {
            block.verify()?;
        }
        Ok(block)
    }

    async fn get_size(&self, id: &BlockId) -> Result<usize> {
        let data = self
            .kv
            .get(id.as_bytes())
            .await?
            .ok_or(MultiStoreError::BlockNotFound(*id))?;
        Ok(data.len())
    }

    async fn put(&self, block: &Block) -> Result<()> {
        self.kv
            .put(block.id().as_bytes(), block.data().clone())
            .await?;
        Ok(())
    }

    async fn put_many(&self, blocks: &[Block]) -> Result<()> {
        for block in blocks {
            self.put(block).await?;
        }
        Ok(())
    }

    async fn delete_block(&self, id: &BlockId) -> Result<()> {
        self.kv.delete(id.as_bytes()).await?;
        Ok(())
    }

    async fn all_keys(&self) -> Result<Vec<BlockId>> {
        let keys = self.kv.keys_with_prefix(&[]).await?;
        let mut ids = Vec::with_capacity(keys.len());
        for key in keys {
            match BlockId::try_from(key.as_slice()) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(key_len = key.len(), error = %e, "skipping non-block key"),
            }
        }
        Ok(ids)
    }

    fn hash_on_read(&self, enabled: bool) {
        self.hash_on_read.store(enabled, Ordering::Relaxed);
    }
}
