//! The registry: allocation, persistence, listing and deletion of handles.
//!
//! The registry owns the shared key-value store, the cache of open
//! sub-stores, the next-handle counter and the live-handle set. One
//! reader/writer lock guards all of it. Metadata mutations hold the write
//! lock across their persistence calls so the in-memory copy never runs
//! ahead of the durable record.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use multistore_core::StoreId;
use multistore_kv::KvStore;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::MultiStoreConfig;
use crate::error::{MultiStoreError, Result};
use crate::multi_read::MultiReadBlockstore;
use crate::namespace::{
    decode_live_set, decode_next_id, encode_live_set, encode_next_id, namespace_prefix,
    LIVE_SET_KEY, NEXT_ID_KEY,
};
use crate::substore::{StoreState, SubStore};

/// Mutable registry state, guarded by the registry lock.
pub(crate) struct RegistryState {
    /// Next handle to allocate. Never decremented.
    pub(crate) next: StoreId,
    /// Handles currently allocated, mirroring the persisted set.
    pub(crate) live: BTreeSet<StoreId>,
    /// Materialized handles, populated lazily by `get`.
    pub(crate) open: BTreeMap<StoreId, Arc<SubStore>>,
}

/// Many isolated block stores multiplexed over one shared key-value store.
///
/// Independent registries over different stores can coexist in one process;
/// all state lives in the instance.
pub struct MultiStore {
    kv: Arc<dyn KvStore>,
    config: MultiStoreConfig,
    state: Arc<RwLock<RegistryState>>,
}

impl MultiStore {
    /// Open a registry over `kv` with default configuration, recovering any
    /// metadata a previous instance persisted there.
    pub async fn open<K: KvStore + 'static>(kv: K) -> Result<Self> {
        Self::open_with_config(kv, MultiStoreConfig::default()).await
    }

    /// Open a registry over `kv` with the given configuration.
    pub async fn open_with_config<K: KvStore + 'static>(
        kv: K,
        config: MultiStoreConfig,
    ) -> Result<Self> {
        let kv: Arc<dyn KvStore> = Arc::new(kv);
        let (next, live) = load_metadata(kv.as_ref()).await?;
        debug!(next = %next, live = live.len(), "opened multistore");

        Ok(Self {
            kv,
            config,
            state: Arc::new(RwLock::new(RegistryState {
                next,
                live,
                open: BTreeMap::new(),
            })),
        })
    }

    pub fn config(&self) -> &MultiStoreConfig {
        &self.config
    }

    /// Allocate a fresh handle.
    ///
    /// The counter is persisted before the live set, so a crash between the
    /// two writes burns a handle but never leaves a live handle at or above
    /// the counter.
    pub async fn allocate(&self) -> Result<StoreId> {
        let mut state = self.state.write().await;
        let id = state.next;
        let advanced = id.next().ok_or(MultiStoreError::Exhausted)?;

        self.kv.put(NEXT_ID_KEY, encode_next_id(advanced)).await?;

        let mut live = state.live.clone();
        live.insert(id);
        if let Err(e) = self.persist_live_set(&live).await {
            // Put the durable counter back so the handle is not burned. If
            // that fails too, advance in memory to match what is on disk.
            match self.kv.put(NEXT_ID_KEY, encode_next_id(id)).await {
                Ok(()) => warn!(store = %id, error = %e, "allocation rolled back"),
                Err(restore) => {
                    warn!(
                        store = %id,
                        error = %e,
                        restore_error = %restore,
                        "allocation failed; handle burned"
                    );
                    state.next = advanced;
                }
            }
            return Err(e);
        }

        state.next = advanced;
        state.live = live;
        debug!(store = %id, "allocated store");
        Ok(id)
    }

    /// Open the sub-store for a live handle.
    ///
    /// Repeated calls return the same cached instance until the handle is
    /// deleted or the registry is closed.
    pub async fn get(&self, id: StoreId) -> Result<Arc<SubStore>> {
        {
            let state = self.state.read().await;
            if let Some(store) = state.open.get(&id) {
                return Ok(Arc::clone(store));
            }
            if !state.live.contains(&id) {
                return Err(MultiStoreError::StoreNotFound(id));
            }
        }

        let mut state = self.state.write().await;
        // Re-check: another caller may have opened or deleted it meanwhile.
        if let Some(store) = state.open.get(&id) {
            return Ok(Arc::clone(store));
        }
        if !state.live.contains(&id) {
            return Err(MultiStoreError::StoreNotFound(id));
        }

        let store = Arc::new(SubStore::new(
            id,
            Arc::clone(&self.kv),
            self.config.hash_on_read,
        ));
        state.open.insert(id, Arc::clone(&store));
        debug!(store = %id, "opened store");
        Ok(store)
    }

    /// All live handles in ascending order.
    pub async fn list(&self) -> Vec<StoreId> {
        self.state.read().await.live.iter().copied().collect()
    }

    /// The handle the next `allocate` will return.
    pub async fn peek_next(&self) -> StoreId {
        self.state.read().await.next
    }

    /// Handles currently held in the open-store cache, ascending.
    pub async fn open_handles(&self) -> Vec<StoreId> {
        self.state.read().await.open.keys().copied().collect()
    }

    /// Delete a sub-store and erase every key under its prefix.
    ///
    /// Already-issued handles for `id` fail closed from here on. If erasing
    /// fails partway the handle stays live, residual keys stay behind, and
    /// the error is returned; calling `delete` again resumes the erase.
    pub async fn delete(&self, id: StoreId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.live.contains(&id) {
            return Err(MultiStoreError::StoreNotFound(id));
        }

        if let Some(store) = state.open.remove(&id) {
            store.retire(StoreState::Deleted);
        }

        let erased = self.erase_namespace(id).await?;

        let mut live = state.live.clone();
        live.remove(&id);
        self.persist_live_set(&live).await?;
        state.live = live;

        info!(store = %id, keys = erased, "deleted store");
        Ok(())
    }

    /// Drop every cached handle without touching persisted metadata.
    ///
    /// Handles issued before the close report `StoreClosed`; calling `get`
    /// again opens fresh ones over the same data.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let open = std::mem::take(&mut state.open);
        for store in open.values() {
            store.retire(StoreState::Closed);
        }
        info!(closed = open.len(), "closed multistore");
        Ok(())
    }

    /// A read-only view answering block queries across all open sub-stores.
    pub fn multi_read_blockstore(&self) -> MultiReadBlockstore {
        MultiReadBlockstore::over_registry(Arc::clone(&self.state))
    }

    async fn persist_live_set(&self, live: &BTreeSet<StoreId>) -> Result<()> {
        self.kv.put(LIVE_SET_KEY, encode_live_set(live)?).await?;
        Ok(())
    }

    /// Remove every key under `id`'s prefix in batches. Returns the count.
    async fn erase_namespace(&self, id: StoreId) -> Result<usize> {
        let keys = self.kv.keys_with_prefix(&namespace_prefix(id)).await?;
        let mut erased = 0;
        for chunk in keys.chunks(self.config.batch_size()) {
            if let Err(e) = self.kv.delete_batch(chunk).await {
                warn!(
                    store = %id,
                    erased,
                    remaining = keys.len() - erased,
                    error = %e,
                    "namespace erase interrupted; retry delete to resume"
                );
                return Err(e.into());
            }
            erased += chunk.len();
        }
        Ok(erased)
    }
}

/// Read the counter and live set, defaulting both for a fresh store.
async fn load_metadata(kv: &dyn KvStore) -> Result<(StoreId, BTreeSet<StoreId>)> {
    let next = match kv.get(NEXT_ID_KEY).await? {
        Some(raw) => decode_next_id(&raw)?,
        None => StoreId::FIRST,
    };
    let live = match kv.get(LIVE_SET_KEY).await? {
        Some(raw) => decode_live_set(&raw)?,
        None => BTreeSet::new(),
    };

    if let Some(max) = live.last() {
        if *max >= next {
            return Err(MultiStoreError::CorruptMetadata(format!(
                "live handle {} is not below next handle {}",
                max, next
            )));
        }
    }
    Ok((next, live))
}
