//! KvStore trait: the abstract interface over the shared key-value store.
//!
//! This trait allows the registry to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// The KvStore trait: async interface over raw byte keys.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Durable and linearizable per key**: a completed `put` is visible to
///   every later `get` of the same key.
/// - **No cross-key transactions**: only `delete_batch` may group work, and
///   only as an optimization.
/// - **Ordered prefix scans**: keys come back in ascending byte order.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key`.
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &[u8], value: Bytes) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// Check if `key` is present.
    async fn has(&self, key: &[u8]) -> Result<bool>;

    /// List every raw key starting with `prefix`, in ascending order.
    async fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Remove a group of keys.
    ///
    /// The default implementation deletes one key at a time and stops at the
    /// first failure, leaving the keys before it removed.
    async fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<K: KvStore + ?Sized> KvStore for Arc<K> {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &[u8], value: Bytes) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key).await
    }

    async fn has(&self, key: &[u8]) -> Result<bool> {
        (**self).has(key).await
    }

    async fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        (**self).keys_with_prefix(prefix).await
    }

    async fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        (**self).delete_batch(keys).await
    }
}

/// Smallest key that sorts after every key starting with `prefix`.
///
/// Returns `None` when no such bound exists (empty prefix or all `0xff`),
/// meaning a scan must run to the end of the key space.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}
