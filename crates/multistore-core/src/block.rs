//! Blocks: raw bytes paired with their content address.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::BlockId;

/// An immutable block of bytes addressed by its Blake3 hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    id: BlockId,
    data: Bytes,
}

impl Block {
    /// Create a block, computing its content address.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            id: BlockId::of(&data),
            data,
        }
    }

    /// Pair bytes with an already-known address without rehashing.
    ///
    /// Use [`Block::verify`] if the pairing comes from untrusted storage.
    pub fn with_id(id: BlockId, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// The content address.
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// The raw bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Length of the raw bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Recompute the address and check it matches the stored one.
    pub fn verify(&self) -> Result<()> {
        let actual = BlockId::of(&self.data);
        if actual != self.id {
            return Err(CoreError::HashMismatch {
                expected: self.id.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_block_id_is_content_hash() {
        let block = Block::new(b"some bytes".to_vec());
        assert_eq!(*block.id(), BlockId::of(b"some bytes"));
        assert_eq!(block.len(), 10);
        block.verify().unwrap();
    }

    #[test]
    fn test_verify_detects_tampering() {
        let good = Block::new(b"original".to_vec());
        let tampered = Block::with_id(*good.id(), b"tampered".to_vec());
        assert!(matches!(
            tampered.verify(),
            Err(CoreError::HashMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn test_block_id_deterministic(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let b1 = Block::new(data.clone());
            let b2 = Block::new(data);
            prop_assert_eq!(b1.id(), b2.id());
        }

        #[test]
        fn test_block_id_unique_with_different_data(
            d1 in prop::collection::vec(any::<u8>(), 0..128),
            d2 in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            prop_assume!(d1 != d2);
            let b1 = Block::new(d1);
            let b2 = Block::new(d2);
            prop_assert_ne!(b1.id(), b2.id());
        }
    }
}
