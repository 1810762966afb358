//! In-memory content storage backend.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use quill_types::EntryHash;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{ContentStore, StoreUsage};

/// In-memory content store backed by a `RwLock<HashMap>`.
///
/// Useful for testing and for nodes configured to run in memory-only mode.
/// Optionally tracks total bytes stored against a maximum.
pub struct MemoryStore {
    blobs: RwLock<HashMap<EntryHash, Bytes>>,
    max_bytes: u64,
}

impl MemoryStore {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self::with_capacity(u64::MAX)
    }

    /// Create an in-memory store holding at most `max_bytes` of payload.
    pub fn with_capacity(max_bytes: u64) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            max_bytes,
        }
    }

    /// Return a reference to the inner map (for testing purposes).
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RwLock<HashMap<EntryHash, Bytes>> {
        &self.blobs
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<EntryHash, Bytes>>, StoreError> {
        self.blobs.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<EntryHash, Bytes>>, StoreError> {
        self.blobs.write().map_err(|_| poisoned())
    }

    fn used_bytes_unlocked(map: &HashMap<EntryHash, Bytes>) -> u64 {
        map.values().map(|v| v.len() as u64).sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Io(std::io::Error::other("memory store lock poisoned"))
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, data: Bytes) -> Result<EntryHash, StoreError> {
        let hash = EntryHash::from_data(&data);
        let mut map = self.write()?;

        if map.contains_key(&hash) {
            debug!(%hash, "blob already stored");
            return Ok(hash);
        }

        let used = Self::used_bytes_unlocked(&map);
        let needed = data.len() as u64;

        if used.saturating_add(needed) > self.max_bytes {
            return Err(StoreError::CapacityExceeded {
                needed,
                available: self.max_bytes.saturating_sub(used),
            });
        }

        debug!(%hash, size = data.len(), "storing blob in memory");
        map.insert(hash, data);
        Ok(hash)
    }

    async fn get(&self, hash: EntryHash) -> Result<Option<Bytes>, StoreError> {
        Ok(self.read()?.get(&hash).cloned())
    }

    async fn contains(&self, hash: EntryHash) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(&hash))
    }

    async fn list(&self) -> Result<Vec<EntryHash>, StoreError> {
        Ok(self.read()?.keys().copied().collect())
    }

    async fn usage(&self) -> Result<StoreUsage, StoreError> {
        let map = self.read()?;
        Ok(StoreUsage {
            blobs: map.len() as u64,
            bytes: Self::used_bytes_unlocked(&map),
        })
    }

    async fn verify(&self, hash: EntryHash) -> Result<bool, StoreError> {
        match self.read()?.get(&hash) {
            Some(data) => Ok(EntryHash::from_data(data) == hash),
            None => Err(StoreError::NotFound(hash)),
        }
    }
}
