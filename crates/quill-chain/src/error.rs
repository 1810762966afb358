//! Error types for the chain crate.

use std::fmt;

use quill_types::{ActionHash, AgentId};

/// The admission rule that rejected an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Entry text field at or above the configured maximum.
    ContentLength,
    /// Modifying someone else's record, or writing in someone else's name.
    Ownership,
    /// Too many qualifying creations inside the trailing window.
    RateLimit,
    /// A referenced record is missing, deleted or of the wrong type.
    ReferentialIntegrity,
    /// Timestamp earlier than the author's previous action.
    ChainOrder,
    /// Supplied entry does not match what the action declares.
    EntryMismatch,
}

impl Rule {
    /// Snake-case rule name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentLength => "content_length",
            Self::Ownership => "ownership",
            Self::RateLimit => "rate_limit",
            Self::ReferentialIntegrity => "referential_integrity",
            Self::ChainOrder => "chain_order",
            Self::EntryMismatch => "entry_mismatch",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-correctable rejection. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed ({rule}): {detail}")]
pub struct ValidationError {
    /// Which rule failed.
    pub rule: Rule,
    /// Human-readable explanation.
    pub detail: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(rule: Rule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

/// Errors that can occur during chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The action failed an admission rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The action does not extend the author's current head.
    ///
    /// The caller should re-read the head and retry.
    #[error("chain fork for author {author}: head is {expected:?}, action builds on {found:?}")]
    ChainFork {
        /// Author whose chain was targeted.
        author: AgentId,
        /// Current head (`None` for an empty chain).
        expected: Option<ActionHash>,
        /// Predecessor declared by the action.
        found: Option<ActionHash>,
    },

    /// A remote action arrived before its predecessor.
    #[error("missing predecessor {missing} on chain of {author}")]
    MissingPredecessor {
        /// Author of the incoming action.
        author: AgentId,
        /// Predecessor that is not known locally.
        missing: ActionHash,
    },

    /// Missing hash or record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Action hash verification failed.
    #[error("invalid action hash")]
    InvalidHash,

    /// Action signature verification failed.
    #[error("invalid action signature")]
    InvalidSignature,

    /// Local action storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Local entry storage failure.
    #[error("content store error: {0}")]
    Content(#[from] quill_store::StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ChainError {
    /// The validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }

    /// Shorthand for `NotFound`.
    pub(crate) fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl From<postcard::Error> for ChainError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
