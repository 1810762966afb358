//! Error types for the engine.

use quill_chain::{ChainError, ValidationError};

use crate::transport::TransportError;

/// Errors that can occur during engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Admission, lookup or local storage failed. Content store failures
    /// arrive as [`ChainError::Content`].
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Replication transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Record not found locally or on the network.
    #[error("not found: {0}")]
    NotFound(String),

    /// A record was found but holds the wrong kind of entry.
    #[error("unexpected record: {0}")]
    UnexpectedRecord(String),
}

impl EngineError {
    /// The validation failure behind this error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Chain(e) => e.as_validation(),
            _ => None,
        }
    }

    /// Whether this is a missing hash or record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Chain(ChainError::NotFound(_)))
    }

    /// Whether a concurrent writer moved the chain head.
    pub fn is_chain_fork(&self) -> bool {
        matches!(self, Self::Chain(ChainError::ChainFork { .. }))
    }

    /// Whether the local node itself may be unhealthy.
    ///
    /// Only local persistence failures qualify; validation, fork and lookup
    /// errors are ordinary per-call outcomes.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Chain(ChainError::Storage(_) | ChainError::Content(_))
        )
    }
}
