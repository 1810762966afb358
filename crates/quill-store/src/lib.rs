//! Content-addressed entry storage.
//!
//! This crate defines the [`ContentStore`] trait, which maps the blake3 hash
//! of a payload to the payload itself, along with two backends:
//!
//! - [`MemoryStore`]: in-memory storage backed by a `RwLock<HashMap>`.
//! - [`FileStore`]: one file per blob with a 2-level fan-out directory layout.
//!
//! Stores hold no policy. Writes are idempotent and nothing is ever removed.

mod error;
mod file_store;
mod memory_store;
mod traits;

pub use error::StoreError;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::{ContentStore, StoreUsage};
