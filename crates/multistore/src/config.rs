//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`MultiStore`](crate::MultiStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiStoreConfig {
    /// Maximum number of keys removed per batch when erasing a namespace.
    /// Zero is treated as one.
    pub delete_batch_size: usize,
    /// Initial hash-on-read setting for every sub-store blockstore.
    pub hash_on_read: bool,
}

impl Default for MultiStoreConfig {
    fn default() -> Self {
        Self {
            delete_batch_size: 256,
            hash_on_read: false,
        }
    }
}

impl MultiStoreConfig {
    /// Set the namespace erase batch size.
    pub fn with_delete_batch_size(mut self, size: usize) -> Self {
        self.delete_batch_size = size;
        self
    }

    /// Set whether sub-stores verify block hashes on read.
    pub fn with_hash_on_read(mut self, enabled: bool) -> Self {
        self.hash_on_read = enabled;
        self
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.delete_batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MultiStoreConfig = serde_json::from_str(r#"{"hash_on_read": true}"#).unwrap();
        assert!(config.hash_on_read);
        assert_eq!(config.delete_batch_size, 256);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let config = MultiStoreConfig::default().with_delete_batch_size(0);
        assert_eq!(config.batch_size(), 1);
    }
}
