//! Store configuration

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the key index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of hash buckets per index file
    pub hash_slot_count: u32,

    /// Maximum number of usable entries per index file
    pub entries_per_file: u32,

    /// Per-query cap on returned offsets
    pub max_query_results: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            hash_slot_count: 5_000_000,
            entries_per_file: 20_000_000,
            max_query_results: 64,
        }
    }
}

/// Configuration for the storage layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for all store files
    pub store_path: PathBuf,

    /// Key index settings
    pub index: IndexConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./store"),
            index: IndexConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    /// Directory holding the index files
    pub fn index_path(&self) -> PathBuf {
        self.store_path.join("index")
    }

    /// Path of the durable checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        self.store_path.join("checkpoint")
    }

    /// Path of the commit log file
    pub fn commitlog_path(&self) -> PathBuf {
        self.store_path.join("commitlog")
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.hash_slot_count == 0 {
            return Err(StoreError::InvalidConfig(
                "hash_slot_count must be nonzero".into(),
            ));
        }
        if self.index.entries_per_file == 0 {
            return Err(StoreError::InvalidConfig(
                "entries_per_file must be nonzero".into(),
            ));
        }
        if self.index.max_query_results == 0 {
            return Err(StoreError::InvalidConfig(
                "max_query_results must be nonzero".into(),
            ));
        }
        Ok(())
    }
}
