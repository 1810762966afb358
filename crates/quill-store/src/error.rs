//! Error types for content storage operations.

use quill_types::EntryHash;

/// Errors that can occur during content storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(EntryHash),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The store has reached its capacity limit.
    #[error("store capacity exceeded: need {needed} bytes, only {available} available")]
    CapacityExceeded {
        /// Bytes needed for the operation.
        needed: u64,
        /// Bytes currently available.
        available: u64,
    },

    /// Blob on disk does not match its content address.
    #[error("blob corruption detected: expected {expected}, actual hash {actual}")]
    Corrupt {
        /// The hash that was requested.
        expected: EntryHash,
        /// The hash computed from the data actually stored.
        actual: EntryHash,
    },
}
