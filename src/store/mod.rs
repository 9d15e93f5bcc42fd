//! Durable key-value primitives.
//!
//! The persistence bridge only needs get/set/remove on string keys. The
//! on-disk implementation is a single fjall partition; writes are flushed
//! before returning so a crash right after a registry mutation keeps it.

pub mod bridge;

pub use bridge::{snapshot_key, PersistenceBridge, TransferSnapshot, INDEX_KEY};

use crate::error::Result;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

// =============================================================================
// fjall
// =============================================================================

/// Key-value store backed by a fjall keyspace
pub struct FjallStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallStore {
    const PARTITION: &'static str = "transfers";

    /// Open or create the store under `path`
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = Config::new(path).open()?;
        let partition =
            keyspace.open_partition(Self::PARTITION, PartitionCreateOptions::default())?;

        tracing::debug!(path = %path.display(), "Opened transfer store");

        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn flush(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

impl KvStore for FjallStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .partition
            .get(key)?
            .map(|value| String::from_utf8_lossy(&value).into_owned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.partition.insert(key, value)?;
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.partition.remove(key)?;
        self.flush()
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Volatile store, for runs that should leave nothing behind
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}
