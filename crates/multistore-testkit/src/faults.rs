//! Fault injection for the shared key-value store.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use multistore::namespace::namespace_prefix;
use multistore_core::StoreId;
use multistore_kv::{KvError, KvStore, MemoryKv, Result};

#[derive(Default)]
struct Faults {
    /// Any operation touching a key under one of these prefixes fails.
    prefixes: Vec<Vec<u8>>,
    /// Writes to exactly these keys fail.
    put_keys: Vec<Vec<u8>>,
    /// Key deletions still allowed before every further one fails.
    deletes_left: Option<usize>,
}

/// A [`MemoryKv`] wrapper that fails on demand.
///
/// Clones share both the data and the fault configuration.
#[derive(Clone, Default)]
pub struct FaultyKv {
    inner: MemoryKv,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing store.
    pub fn wrap(inner: MemoryKv) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    /// The healthy store underneath, bypassing every fault.
    pub fn inner(&self) -> &MemoryKv {
        &self.inner
    }

    /// Fail every operation on keys under `prefix`.
    pub fn fail_prefix(&self, prefix: &[u8]) {
        self.installed().prefixes.push(prefix.to_vec());
    }

    /// Fail every operation inside one sub-store's namespace.
    pub fn fail_namespace(&self, id: StoreId) {
        self.fail_prefix(&namespace_prefix(id));
    }

    /// Fail writes to `key`.
    pub fn fail_puts_to(&self, key: &[u8]) {
        self.installed().put_keys.push(key.to_vec());
    }

    /// Allow `n` more key deletions, then fail every deletion after that.
    pub fn fail_deletes_after(&self, n: usize) {
        self.installed().deletes_left = Some(n);
    }

    /// Remove every injected fault.
    pub fn heal(&self) {
        *self.installed() = Faults::default();
    }

    /// Panics on a poisoned lock rather than dropping the fault.
    fn installed(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().expect("fault configuration lock poisoned")
    }

    fn faults(&self) -> Result<MutexGuard<'_, Faults>> {
        self.faults
            .lock()
            .map_err(|e| KvError::Poisoned(e.to_string()))
    }

    fn check_key(&self, op: &str, key: &[u8]) -> Result<()> {
        let faults = self.faults()?;
        if faults.prefixes.iter().any(|p| key.starts_with(p)) {
            return Err(injected(op));
        }
        Ok(())
    }

    fn check_put(&self, key: &[u8]) -> Result<()> {
        self.check_key("put", key)?;
        if self.faults()?.put_keys.iter().any(|k| k == key) {
            return Err(injected("put"));
        }
        Ok(())
    }

    fn check_delete(&self, key: &[u8]) -> Result<()> {
        self.check_key("delete", key)?;
        let mut faults = self.faults()?;
        match faults.deletes_left.as_mut() {
            Some(0) => Err(injected("delete")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn injected(op: &str) -> KvError {
    KvError::Backend(format!("injected {} fault", op))
}

#[async_trait]
impl KvStore for FaultyKv {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_key("get", key)?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &[u8], value: Bytes) -> Result<()> {
        self.check_put(key)?;
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_delete(key)?;
        self.inner.delete(key).await
    }

    async fn has(&self, key: &[u8]) -> Result<bool> {
        self.check_key("has", key)?;
        self.inner.has(key).await
    }

    async fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        {
            let faults = self.faults()?;
            // A scan fails if it overlaps a failing range at all
            if faults
                .prefixes
                .iter()
                .any(|p| prefix.starts_with(p) || p.starts_with(prefix))
            {
                return Err(injected("scan"));
            }
        }
        self.inner.keys_with_prefix(prefix).await
    }

    async fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        // One key at a time so an injected failure leaves partial progress
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_faults() {
        let kv = FaultyKv::new();
        kv.put(b"ok/1", Bytes::new()).await.unwrap();
        kv.put(b"bad/1", Bytes::new()).await.unwrap();

        kv.fail_prefix(b"bad/");
        assert!(kv.has(b"ok/1").await.unwrap());
        assert!(kv.has(b"bad/1").await.is_err());
        assert!(kv.keys_with_prefix(b"").await.is_err());
        assert_eq!(kv.keys_with_prefix(b"ok/").await.unwrap().len(), 1);

        kv.heal();
        assert!(kv.has(b"bad/1").await.unwrap());
    }

    #[test]
    fn test_installing_faults_on_poisoned_lock_panics() {
        let kv = FaultyKv::new();
        let shared = kv.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.faults.lock().unwrap();
            panic!("poison the fault lock");
        })
        .join();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| kv.fail_prefix(b"any")));
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_put_key_faults() {
        let kv = FaultyKv::new();
        kv.fail_puts_to(b"meta");
        assert!(kv.put(b"meta", Bytes::new()).await.is_err());
        kv.put(b"metadata", Bytes::new()).await.unwrap();
        assert!(!kv.inner().has(b"meta").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_countdown_leaves_partial_progress() {
        let kv = FaultyKv::new();
        let keys: Vec<Vec<u8>> = (0u8..5).map(|i| vec![i]).collect();
        for key in &keys {
            kv.put(key, Bytes::new()).await.unwrap();
        }

        kv.fail_deletes_after(2);
        assert!(kv.delete_batch(&keys).await.is_err());
        assert_eq!(kv.inner().len().unwrap(), 3);
    }
}
