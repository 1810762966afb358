//! Core trait and types for content storage.

use bytes::Bytes;
use quill_types::EntryHash;

use crate::error::StoreError;

/// How much a store currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreUsage {
    /// Number of distinct blobs.
    pub blobs: u64,
    /// Total payload bytes.
    pub bytes: u64,
}

/// Content-addressed blob storage.
///
/// `put` derives the key from the data, so storing the same bytes twice
/// returns the same hash and leaves the store unchanged. There is no delete:
/// blobs are immutable once written.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob and return its content hash.
    async fn put(&self, data: Bytes) -> Result<EntryHash, StoreError>;

    /// Retrieve a blob by hash. Returns `None` if not found.
    async fn get(&self, hash: EntryHash) -> Result<Option<Bytes>, StoreError>;

    /// Check whether a blob exists.
    async fn contains(&self, hash: EntryHash) -> Result<bool, StoreError>;

    /// List all stored hashes.
    async fn list(&self) -> Result<Vec<EntryHash>, StoreError>;

    /// Report what the store holds.
    async fn usage(&self) -> Result<StoreUsage, StoreError>;

    /// Verify blob integrity by re-hashing and comparing to the key.
    async fn verify(&self, hash: EntryHash) -> Result<bool, StoreError>;
}
