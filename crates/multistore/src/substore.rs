//! Sub-store handles: per-namespace views over the shared store.
//!
//! A [`SubStore`] bundles a handle with a [`NamespacedKv`] and a blockstore
//! layered on it. Every key passing through either view is prefixed on the
//! way in and stripped on the way out, so a holder can neither see nor touch
//! another namespace. Isolation is structural; nothing is access-checked.
//!
//! Handles fail closed once the registry deletes or closes them.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use multistore_core::{Block, BlockId, StoreId};
use multistore_kv::{KvError, KvStore};

use crate::blockstore::{Blockstore, KvBlockstore};
use crate::error::{MultiStoreError, Result};
use crate::namespace::{namespace_prefix, strip_namespace, NAMESPACE_PREFIX_LEN};

/// Lifecycle of an issued handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Usable.
    Open,
    /// The registry was closed; the namespace still exists.
    Closed,
    /// The namespace was deleted.
    Deleted,
}

const OPEN: u8 = 0;
const CLOSED: u8 = 1;
const DELETED: u8 = 2;

#[derive(Debug)]
struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn new() -> Self {
        Self(AtomicU8::new(OPEN))
    }

    fn state(&self) -> StoreState {
        match self.0.load(Ordering::Acquire) {
            OPEN => StoreState::Open,
            CLOSED => StoreState::Closed,
            _ => StoreState::Deleted,
        }
    }

    /// Move out of `Open`. A handle never comes back once retired.
    fn retire(&self, to: StoreState) {
        let code = match to {
            StoreState::Open => return,
            StoreState::Closed => CLOSED,
            StoreState::Deleted => DELETED,
        };
        let _ = self
            .0
            .compare_exchange(OPEN, code, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Key-value view confined to one namespace of the shared store.
#[derive(Clone)]
pub struct NamespacedKv {
    id: StoreId,
    prefix: [u8; NAMESPACE_PREFIX_LEN],
    inner: Arc<dyn KvStore>,
    lifecycle: Arc<Lifecycle>,
}

impl NamespacedKv {
    fn new(id: StoreId, inner: Arc<dyn KvStore>, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            id,
            prefix: namespace_prefix(id),
            inner,
            lifecycle,
        }
    }

    pub fn store_id(&self) -> StoreId {
        self.id
    }

    fn scoped(&self, key: &[u8]) -> multistore_kv::Result<Vec<u8>> {
        match self.lifecycle.state() {
            StoreState::Open => {
                let mut raw = Vec::with_capacity(self.prefix.len() + key.len());
                raw.extend_from_slice(&self.prefix);
                raw.extend_from_slice(key);
                Ok(raw)
            }
            state => Err(KvError::Detached(format!(
                "store {} is {:?}",
                self.id, state
            ))),
        }
    }
}

#[async_trait]
impl KvStore for NamespacedKv {
    async fn get(&self, key: &[u8]) -> multistore_kv::Result<Option<Bytes>> {
        let raw = self.scoped(key)?;
        self.inner.get(&raw).await
    }

    async fn put(&self, key: &[u8], value: Bytes) -> multistore_kv::Result<()> {
        let raw = self.scoped(key)?;
        self.inner.put(&raw, value).await
    }

    async fn delete(&self, key: &[u8]) -> multistore_kv::Result<()> {
        let raw = self.scoped(key)?;
        self.inner.delete(&raw).await
    }

    async fn has(&self, key: &[u8]) -> multistore_kv::Result<bool> {
        let raw = self.scoped(key)?;
        self.inner.has(&raw).await
    }

    async fn keys_with_prefix(&self, prefix: &[u8]) -> multistore_kv::Result<Vec<Vec<u8>>> {
        let raw = self.scoped(prefix)?;
        let keys = self.inner.keys_with_prefix(&raw).await?;
        Ok(keys
            .iter()
            .filter_map(|k| strip_namespace(self.id, k).map(<[u8]>::to_vec))
            .collect())
    }

    async fn delete_batch(&self, keys: &[Vec<u8>]) -> multistore_kv::Result<()> {
        let raw = keys
            .iter()
            .map(|k| self.scoped(k))
            .collect::<multistore_kv::Result<Vec<_>>>()?;
        self.inner.delete_batch(&raw).await
    }
}

/// An open sub-store: a handle plus its scoped key-value and block views.
///
/// Obtained from [`MultiStore::get`](crate::MultiStore::get). Block
/// operations go through the [`Blockstore`] impl on this type.
pub struct SubStore {
    id: StoreId,
    kv: NamespacedKv,
    blocks: KvBlockstore<NamespacedKv>,
    lifecycle: Arc<Lifecycle>,
}

impl SubStore {
    pub(crate) fn new(id: StoreId, shared: Arc<dyn KvStore>, hash_on_read: bool) -> Self {
        let lifecycle = Arc::new(Lifecycle::new());
        let kv = NamespacedKv::new(id, shared, Arc::clone(&lifecycle));
        let blocks = KvBlockstore::new(kv.clone());
        blocks.hash_on_read(hash_on_read);
        Self {
            id,
            kv,
            blocks,
            lifecycle,
        }
    }

    /// The handle this store was opened for.
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Raw key-value access confined to this namespace.
    pub fn kv(&self) -> &NamespacedKv {
        &self.kv
    }

    pub fn state(&self) -> StoreState {
        self.lifecycle.state()
    }

    pub(crate) fn retire(&self, to: StoreState) {
        self.lifecycle.retire(to);
    }

    fn ensure_open(&self) -> Result<()> {
        match self.lifecycle.state() {
            StoreState::Open => Ok(()),
            StoreState::Closed => Err(MultiStoreError::StoreClosed(self.id)),
            StoreState::Deleted => Err(MultiStoreError::StoreNotFound(self.id)),
        }
    }
}

impl fmt::Debug for SubStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubStore")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl Blockstore for SubStore {
    async fn has(&self, id: &BlockId) -> Result<bool> {
        self.ensure_open()?;
        self.blocks.has(id).await
    }

    async fn get(&self, id: &BlockId) -> Result<Block> {
        self.ensure_open()?;
        self.blocks.get(id).await
    }

    async fn get_size(&self, id: &BlockId) -> Result<usize> {
        self.ensure_open()?;
        self.blocks.get_size(id).await
    }

    async fn put(&self, block: &Block) -> Result<()> {
        self.ensure_open()?;
        self.blocks.put(block).await
    }

    async fn put_many(&self, blocks: &[Block]) -> Result<()> {
        self.ensure_open()?;
        self.blocks.put_many(blocks).await
    }

    async fn delete_block(&self, id: &BlockId) -> Result<()> {
        self.ensure_open()?;
        self.blocks.delete_block(id).await
    }

    async fn all_keys(&self) -> Result<Vec<BlockId>> {
        self.ensure_open()?;
        self.blocks.all_keys().await
    }

    fn hash_on_read(&self, enabled: bool) {
        self.blocks.hash_on_read(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::namespaced_key;
    use multistore_kv::MemoryKv;

    fn sid(n: u64) -> StoreId {
        StoreId::new(n).unwrap()
    }

    fn open_pair(shared: &MemoryKv) -> (SubStore, SubStore) {
        let kv: Arc<dyn KvStore> = Arc::new(shared.clone());
        (
            SubStore::new(sid(1), Arc::clone(&kv), false),
            SubStore::new(sid(2), kv, false),
        )
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let shared = MemoryKv::new();
        let (one, two) = open_pair(&shared);

        one.kv().put(b"k", Bytes::from_static(b"one")).await.unwrap();
        two.kv().put(b"k", Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(
            one.kv().get(b"k").await.unwrap(),
            Some(Bytes::from_static(b"one"))
        );
        assert_eq!(
            two.kv().get(b"k").await.unwrap(),
            Some(Bytes::from_static(b"two"))
        );

        // Raw keys carry the namespace prefix
        assert!(shared.has(&namespaced_key(sid(1), b"k")).await.unwrap());
        assert_eq!(one.kv().keys_with_prefix(b"").await.unwrap(), vec![b"k".to_vec()]);
    }

    #[tokio::test]
    async fn test_blocks_scoped_to_namespace() {
        let shared = MemoryKv::new();
        let (one, two) = open_pair(&shared);
        let block = Block::new(b"only in one".to_vec());

        one.put(&block).await.unwrap();
        assert!(one.has(block.id()).await.unwrap());
        assert!(!two.has(block.id()).await.unwrap());
        assert!(two.get(block.id()).await.unwrap_err().is_not_found());
        assert_eq!(one.all_keys().await.unwrap(), vec![*block.id()]);
        assert!(two.all_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_handle_fails_closed() {
        let shared = MemoryKv::new();
        let (one, _) = open_pair(&shared);
        let block = Block::new(b"doomed".to_vec());
        one.put(&block).await.unwrap();

        one.retire(StoreState::Deleted);
        assert_eq!(one.state(), StoreState::Deleted);
        assert!(matches!(
            one.get(block.id()).await,
            Err(MultiStoreError::StoreNotFound(id)) if id == sid(1)
        ));
        assert!(matches!(
            one.kv().put(b"k", Bytes::new()).await,
            Err(KvError::Detached(_))
        ));
    }

    #[tokio::test]
    async fn test_retire_is_one_way() {
        let shared = MemoryKv::new();
        let (one, _) = open_pair(&shared);

        one.retire(StoreState::Closed);
        one.retire(StoreState::Deleted);
        one.retire(StoreState::Open);
        assert_eq!(one.state(), StoreState::Closed);
        assert!(matches!(
            one.has(&BlockId::of(b"x")).await,
            Err(MultiStoreError::StoreClosed(_))
        ));
    }
}
