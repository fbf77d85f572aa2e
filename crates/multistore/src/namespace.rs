//! Namespace codec: how handles and registry metadata map onto raw keys.
//!
//! The shared key space is split by the first byte:
//!
//! ```text
//! 0x00 <name>                registry metadata (next-handle counter, live set)
//! 0x01 <store id: u64 BE> …  keys belonging to one sub-store
//! ```
//!
//! Namespace prefixes are fixed-width, so no prefix can be a prefix of
//! another handle's prefix, and none of them can start a metadata key.

use std::collections::BTreeSet;

use bytes::Bytes;
use multistore_core::StoreId;

use crate::error::{MultiStoreError, Result};

const META_TAG: u8 = 0x00;
const NAMESPACE_TAG: u8 = 0x01;

/// Length in bytes of every namespace prefix.
pub const NAMESPACE_PREFIX_LEN: usize = 9;

/// Key holding the next handle to allocate.
pub const NEXT_ID_KEY: &[u8] = b"\x00multistore/next";

/// Key holding the CBOR-encoded set of live handles.
pub const LIVE_SET_KEY: &[u8] = b"\x00multistore/live";

/// The key prefix owned by `id`.
pub fn namespace_prefix(id: StoreId) -> [u8; NAMESPACE_PREFIX_LEN] {
    let mut prefix = [0u8; NAMESPACE_PREFIX_LEN];
    prefix[0] = NAMESPACE_TAG;
    prefix[1..].copy_from_slice(&id.to_be_bytes());
    prefix
}

/// Scope a namespace-relative key into the shared key space.
pub fn namespaced_key(id: StoreId, key: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(NAMESPACE_PREFIX_LEN + key.len());
    raw.extend_from_slice(&namespace_prefix(id));
    raw.extend_from_slice(key);
    raw
}

/// Split a raw key into its owning handle and namespace-relative remainder.
///
/// Returns `None` for metadata keys and anything not written by this codec.
pub fn decode_namespaced_key(raw: &[u8]) -> Option<(StoreId, &[u8])> {
    if raw.len() < NAMESPACE_PREFIX_LEN || raw[0] != NAMESPACE_TAG {
        return None;
    }
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&raw[1..NAMESPACE_PREFIX_LEN]);
    let id = StoreId::new(u64::from_be_bytes(id_bytes))?;
    Some((id, &raw[NAMESPACE_PREFIX_LEN..]))
}

/// Strip `id`'s prefix from a raw key, if the key belongs to `id`.
pub fn strip_namespace(id: StoreId, raw: &[u8]) -> Option<&[u8]> {
    raw.strip_prefix(&namespace_prefix(id)[..])
}

/// True if `raw` lies in the registry metadata region.
pub fn is_metadata_key(raw: &[u8]) -> bool {
    raw.first() == Some(&META_TAG)
}

pub fn encode_next_id(next: StoreId) -> Bytes {
    Bytes::copy_from_slice(&next.to_be_bytes())
}

pub fn decode_next_id(raw: &[u8]) -> Result<StoreId> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        MultiStoreError::CorruptMetadata(format!(
            "next-handle counter is {} bytes, expected 8",
            raw.len()
        ))
    })?;
    StoreId::new(u64::from_be_bytes(bytes))
        .ok_or_else(|| MultiStoreError::CorruptMetadata("next-handle counter is 0".into()))
}

pub fn encode_live_set(live: &BTreeSet<StoreId>) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(live, &mut buf).map_err(|e| MultiStoreError::Encoding(e.to_string()))?;
    Ok(Bytes::from(buf))
}

pub fn decode_live_set(raw: &[u8]) -> Result<BTreeSet<StoreId>> {
    ciborium::from_reader(raw)
        .map_err(|e| MultiStoreError::CorruptMetadata(format!("live-handle set: {}", e)))
}
