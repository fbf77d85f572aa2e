//! Failure scenarios driven through the fault-injecting store.

use std::collections::BTreeSet;

use anyhow::{ensure, Result};
use multistore::kv::KvStore;
use multistore::namespace::{namespace_prefix, LIVE_SET_KEY, NEXT_ID_KEY};
use multistore::{Block, Blockstore, MultiStore, MultiStoreConfig, MultiStoreError, ProbeOp, StoreId};
use multistore_testkit::generators::registry_ops;
use multistore_testkit::{FaultyKv, RegistryFixture, RegistryOp};
use proptest::prelude::*;

fn sid(n: u64) -> StoreId {
    StoreId::new(n).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn test_found_block_hides_broken_store() -> Result<()> {
    init_tracing();
    let fixture = RegistryFixture::new(3, 4).await?;
    let broken = sid(2);
    fixture.kv.fail_namespace(broken);

    let everywhere = fixture.registry.multi_read_blockstore();
    let present = fixture.blocks[2][0].clone();
    assert!(everywhere.has(present.id()).await?);
    assert_eq!(everywhere.get(present.id()).await?, present);

    // Store 1 answers before the broken store is ever probed
    let first = fixture.blocks[0][0].clone();
    assert_eq!(everywhere.get(first.id()).await?, first);
    Ok(())
}

#[tokio::test]
async fn test_absent_block_reports_broken_store() -> Result<()> {
    init_tracing();
    let fixture = RegistryFixture::new(3, 4).await?;
    fixture.kv.fail_namespace(sid(2));

    let everywhere = fixture.registry.multi_read_blockstore();
    let absent = Block::new(b"nowhere".to_vec());

    let err = everywhere.has(absent.id()).await.unwrap_err();
    let aggregate = err.as_aggregate().expect("aggregate error");
    assert_eq!(aggregate.stores(), vec![sid(2)]);
    assert_eq!(aggregate.failures()[0].op, ProbeOp::Has);

    let err = everywhere.get(absent.id()).await.unwrap_err();
    assert!(!err.is_not_found());
    let aggregate = err.as_aggregate().expect("aggregate error");
    assert_eq!(aggregate.stores(), vec![sid(2)]);
    // The existence check fails before any fetch is attempted
    assert_eq!(aggregate.failures()[0].op, ProbeOp::Has);
    assert!(err.to_string().contains("injected"));
    Ok(())
}

#[tokio::test]
async fn test_allocation_rolls_back_when_counter_write_fails() -> Result<()> {
    let fixture = RegistryFixture::new(2, 0).await?;
    fixture.kv.fail_puts_to(NEXT_ID_KEY);

    assert!(fixture.registry.allocate().await.is_err());
    assert_eq!(fixture.registry.peek_next().await, sid(3));
    assert_eq!(fixture.registry.list().await, vec![sid(1), sid(2)]);

    fixture.kv.heal();
    assert_eq!(fixture.registry.allocate().await?, sid(3));
    Ok(())
}

#[tokio::test]
async fn test_allocation_rolls_back_when_live_set_write_fails() -> Result<()> {
    let fixture = RegistryFixture::new(2, 0).await?;
    fixture.kv.fail_puts_to(LIVE_SET_KEY);

    assert!(fixture.registry.allocate().await.is_err());
    assert_eq!(fixture.registry.peek_next().await, sid(3));
    assert_eq!(fixture.registry.list().await, vec![sid(1), sid(2)]);

    // The durable counter was restored too
    let reopened = fixture.reopen().await?;
    assert_eq!(reopened.peek_next().await, sid(3));
    assert_eq!(reopened.list().await, vec![sid(1), sid(2)]);

    fixture.kv.heal();
    assert_eq!(fixture.registry.allocate().await?, sid(3));
    Ok(())
}

#[tokio::test]
async fn test_interrupted_delete_can_be_resumed() -> Result<()> {
    init_tracing();
    let config = MultiStoreConfig::default().with_delete_batch_size(3);
    let fixture = RegistryFixture::with_config(2, 10, config).await?;
    let (target, _) = fixture.stores[0].clone();
    let prefix = namespace_prefix(target);

    fixture.kv.fail_deletes_after(4);
    assert!(fixture.registry.delete(target).await.is_err());

    // Still live, with the unerased keys left behind
    assert_eq!(fixture.registry.list().await, vec![sid(1), sid(2)]);
    let residual = fixture.kv.inner().keys_with_prefix(&prefix).await?;
    assert_eq!(residual.len(), 6);

    fixture.kv.heal();
    fixture.registry.delete(target).await?;
    assert_eq!(fixture.registry.list().await, vec![sid(2)]);
    assert!(fixture.kv.inner().keys_with_prefix(&prefix).await?.is_empty());

    // The neighbour is untouched
    let (_, other) = &fixture.stores[1];
    for block in &fixture.blocks[1] {
        assert!(other.has(block.id()).await?);
    }
    Ok(())
}

#[tokio::test]
async fn test_delete_keeps_handle_listed_when_live_set_write_fails() -> Result<()> {
    let fixture = RegistryFixture::new(2, 3).await?;
    let (target, stale) = fixture.stores[1].clone();
    fixture.kv.fail_puts_to(LIVE_SET_KEY);

    assert!(fixture.registry.delete(target).await.is_err());
    assert_eq!(fixture.registry.list().await, vec![sid(1), sid(2)]);
    assert_eq!(fixture.reopen().await?.list().await, vec![sid(1), sid(2)]);

    // The handle issued before the attempt fails closed regardless
    let block = &fixture.blocks[1][0];
    assert!(matches!(
        stale.get(block.id()).await,
        Err(MultiStoreError::StoreNotFound(_))
    ));

    fixture.kv.heal();
    fixture.registry.delete(target).await?;
    assert_eq!(fixture.registry.list().await, vec![sid(1)]);
    assert_eq!(fixture.reopen().await?.list().await, vec![sid(1)]);
    Ok(())
}

/// Replay `ops` against a real registry and a plain model of it.
async fn replay(ops: Vec<RegistryOp>) -> Result<()> {
    let kv = FaultyKv::new();
    let mut registry = MultiStore::open(kv.clone()).await?;

    let mut next = 1u64;
    let mut live = BTreeSet::new();
    let mut issued = BTreeSet::new();

    for op in ops {
        match op {
            RegistryOp::Allocate => {
                let id = registry.allocate().await?;
                ensure!(id.get() == next, "expected {} got {}", next, id);
                ensure!(issued.insert(id), "handle {} issued twice", id);
                live.insert(id);
                next += 1;
            }
            RegistryOp::Delete(index) => {
                if live.is_empty() {
                    continue;
                }
                let id = *live
                    .iter()
                    .nth(index.index(live.len()))
                    .expect("index within bounds");
                registry.delete(id).await?;
                live.remove(&id);
                ensure!(
                    kv.inner().keys_with_prefix(&namespace_prefix(id)).await?.is_empty(),
                    "residual keys for {}",
                    id
                );
            }
            RegistryOp::Reopen => {
                registry.close().await?;
                registry = MultiStore::open(kv.clone()).await?;
            }
        }

        let listed: BTreeSet<StoreId> = registry.list().await.into_iter().collect();
        ensure!(listed == live, "listed {:?} but model has {:?}", listed, live);
        ensure!(registry.peek_next().await.get() == next);
        ensure!(live.iter().all(|id| id.get() < next));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_registry_matches_model(ops in registry_ops(40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let outcome = runtime.block_on(replay(ops));
        prop_assert!(outcome.is_ok(), "{:?}", outcome);
    }
}
