//! Read-only block view spanning every open sub-store.
//!
//! Queries fan out over the members in ascending handle order. A member that
//! errors is recorded and skipped; the errors only surface if no member
//! produces an answer. Writes are rejected because there is no way to pick
//! which sub-store should receive a new block.

use std::sync::Arc;

use async_trait::async_trait;
use multistore_core::{Block, BlockId, StoreId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::blockstore::Blockstore;
use crate::error::{AggregateError, MultiStoreError, ProbeFailure, ProbeOp, Result};
use crate::registry::RegistryState;

type Member = (StoreId, Arc<dyn Blockstore>);

enum Membership {
    /// Whatever the registry has open at the start of each call.
    Registry(Arc<RwLock<RegistryState>>),
    /// A caller-supplied set, sorted by handle.
    Fixed(Vec<Member>),
}

/// Aggregate read-only blockstore.
///
/// Each call snapshots membership under the registry's shared lock and then
/// probes without holding it, so a `delete` that finishes mid-call does not
/// change which stores that call visits. A member retired after the snapshot
/// reads as empty.
pub struct MultiReadBlockstore {
    members: Membership,
}

impl MultiReadBlockstore {
    pub(crate) fn over_registry(state: Arc<RwLock<RegistryState>>) -> Self {
        Self {
            members: Membership::Registry(state),
        }
    }

    /// Build a view over an explicit set of block stores.
    pub fn from_stores(stores: impl IntoIterator<Item = (StoreId, Arc<dyn Blockstore>)>) -> Self {
        let mut members: Vec<Member> = stores.into_iter().collect();
        members.sort_by_key(|(id, _)| *id);
        Self {
            members: Membership::Fixed(members),
        }
    }

    async fn snapshot(&self) -> Vec<Member> {
        match &self.members {
            Membership::Registry(state) => {
                let state = state.read().await;
                state
                    .open
                    .iter()
                    .map(|(id, store)| (*id, Arc::clone(store) as Arc<dyn Blockstore>))
                    .collect()
            }
            Membership::Fixed(members) => members.clone(),
        }
    }
}

/// Fold a failed probe into `failures`.
///
/// A member deleted or closed after the snapshot no longer holds anything,
/// so its refusal counts as a miss rather than a failure.
fn record(failures: &mut Vec<ProbeFailure>, store: StoreId, op: ProbeOp, error: MultiStoreError) {
    if retired_since_snapshot(store, &error) {
        debug!(store = %store, op = %op, "sub-store retired mid-call; treating as absent");
        return;
    }
    warn!(store = %store, op = %op, error = %error, "sub-store probe failed");
    failures.push(ProbeFailure { store, op, error });
}

fn retired_since_snapshot(store: StoreId, error: &MultiStoreError) -> bool {
    matches!(
        error,
        MultiStoreError::StoreNotFound(id) | MultiStoreError::StoreClosed(id) if *id == store
    )
}

#[async_trait]
impl Blockstore for MultiReadBlockstore {
    async fn has(&self, id: &BlockId) -> Result<bool> {
        let mut failures = Vec::new();
        for (store_id, store) in self.snapshot().await {
            match store.has(id).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => record(&mut failures, store_id, ProbeOp::Has, e),
            }
        }

        if failures.is_empty() {
            Ok(false)
        } else {
            Err(MultiStoreError::Aggregate(AggregateError::new(failures)))
        }
    }

    async fn get(&self, id: &BlockId) -> Result<Block> {
        let mut failures = Vec::new();
        for (store_id, store) in self.snapshot().await {
            match store.has(id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    record(&mut failures, store_id, ProbeOp::Has, e);
                    continue;
                }
            }

            match store.get(id).await {
                Ok(block) => return Ok(block),
                Err(e) => record(&mut failures, store_id, ProbeOp::Get, e),
            }
        }

        if failures.is_empty() {
            Err(MultiStoreError::BlockNotFound(*id))
        } else {
            Err(MultiStoreError::Aggregate(AggregateError::new(failures)))
        }
    }

    async fn get_size(&self, _id: &BlockId) -> Result<usize> {
        Err(MultiStoreError::Unsupported("get_size"))
    }

    async fn put(&self, _block: &Block) -> Result<()> {
        Err(MultiStoreError::Unsupported("put"))
    }

    async fn put_many(&self, _blocks: &[Block]) -> Result<()> {
        Err(MultiStoreError::Unsupported("put_many"))
    }

    async fn delete_block(&self, _id: &BlockId) -> Result<()> {
        Err(MultiStoreError::Unsupported("delete_block"))
    }

    async fn all_keys(&self) -> Result<Vec<BlockId>> {
        Err(MultiStoreError::Unsupported("all_keys"))
    }

    /// Each member verifies its own reads; the aggregate has nothing to do.
    fn hash_on_read(&self, _enabled: bool) {}
}
