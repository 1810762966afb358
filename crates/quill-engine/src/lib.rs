//! Node orchestrator and query facade for Quill.
//!
//! The [`QuillNode`] owns an author identity, the local [`ActionLog`] and a
//! replication [`Transport`], and exposes the full create / read / update /
//! delete pipeline for entries and links.
//!
//! Applications depend on the [`QuillEngine`] trait rather than the concrete
//! node. [`Blog`] is the application shipped with the engine: posts,
//! comments and the link conventions that tie them together.
//!
//! [`ActionLog`]: quill_chain::ActionLog

pub mod blog;
pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod telemetry;
pub mod transport;

pub use blog::Blog;
pub use config::QuillConfig;
pub use engine::QuillEngine;
pub use error::EngineError;
pub use node::QuillNode;
pub use transport::{MemoryNetwork, MemoryTransport, NullTransport, Transport, TransportError};

#[cfg(test)]
mod tests;
