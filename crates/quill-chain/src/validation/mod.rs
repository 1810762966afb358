//! Admission rules for candidate actions.
//!
//! Rules are small objects run in a fixed order; the first failure aborts
//! admission. Each rule sees the candidate action, its entry (if any) and a
//! read-only [`ChainView`] of everything admitted so far.

mod rules;

use std::time::Duration;

use quill_types::{Entry, EntryType, LinkTag};

use crate::action::SignedAction;
use crate::error::{ChainError, Rule};
use crate::revisions::ChainView;

pub use rules::{ContentLengthRule, OwnershipRule, RateLimitRule, ReferentialIntegrityRule};

/// Where a candidate came from.
///
/// Checks that depend on what this node has seen deleted only apply to
/// [`Origin::Local`] candidates. A remote action was checked against its
/// author's view when it was written; re-judging it against ours would
/// let peers disagree about the author's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Built and signed on this node.
    Local,
    /// Received from a peer.
    Remote,
}

/// An action awaiting admission.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub action: &'a SignedAction,
    pub entry: Option<&'a Entry>,
    pub origin: Origin,
}

/// A single admission rule.
pub trait ValidationRule: Send + Sync {
    /// Which rule this is, for reporting.
    fn rule(&self) -> Rule;

    /// Accept or reject the candidate.
    ///
    /// Rejections are `ChainError::Validation`; other errors come from
    /// reading the view.
    fn check(&self, candidate: &Candidate<'_>, view: &dyn ChainView) -> Result<(), ChainError>;
}

/// Maximum text length for one entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimit {
    pub entry_type: EntryType,
    /// Content must be strictly shorter than this many characters.
    pub max_chars: usize,
}

/// Creation budget for one entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub entry_type: EntryType,
    /// Creations allowed inside the window.
    pub max_creates: u32,
    /// Trailing window, ending at the candidate's timestamp (inclusive).
    pub window: Duration,
}

/// What one end of a link may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEndpoint {
    Anchor,
    Agent,
    /// A create or update of this entry type.
    Entry(EntryType),
}

/// Endpoint shapes for links carrying `tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSchema {
    pub tag: LinkTag,
    pub base: LinkEndpoint,
    pub target: LinkEndpoint,
}

/// Tunables for the built-in rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationConfig {
    pub content_limits: Vec<ContentLimit>,
    pub rate_limits: Vec<RateLimit>,
    /// Tags without a schema accept any endpoints.
    pub link_schemas: Vec<LinkSchema>,
}

impl ValidationConfig {
    /// Limit content of `entry_type` to fewer than `max_chars` characters.
    pub fn with_content_limit(mut self, entry_type: EntryType, max_chars: usize) -> Self {
        self.content_limits.push(ContentLimit {
            entry_type,
            max_chars,
        });
        self
    }

    /// Allow at most `max_creates` creations of `entry_type` per `window`.
    pub fn with_rate_limit(
        mut self,
        entry_type: EntryType,
        max_creates: u32,
        window: Duration,
    ) -> Self {
        self.rate_limits.push(RateLimit {
            entry_type,
            max_creates,
            window,
        });
        self
    }

    /// Require links tagged `tag` to run from `base` to `target`.
    pub fn with_link_schema(
        mut self,
        tag: impl Into<String>,
        base: LinkEndpoint,
        target: LinkEndpoint,
    ) -> Self {
        self.link_schemas.push(LinkSchema {
            tag: LinkTag::new(tag),
            base,
            target,
        });
        self
    }
}

/// Ordered list of rules; the first failure wins.
pub struct ValidationPipeline {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationPipeline {
    /// A pipeline running exactly `rules`, in order.
    pub fn new(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    /// The built-in rules in their fixed order: content length, ownership,
    /// rate limit, referential integrity.
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(vec![
            Box::new(ContentLengthRule::new(config.content_limits.clone())),
            Box::new(OwnershipRule),
            Box::new(RateLimitRule::new(config.rate_limits.clone())),
            Box::new(ReferentialIntegrityRule::new(config.link_schemas.clone())),
        ])
    }

    /// Run every rule until one fails.
    pub fn run(&self, candidate: &Candidate<'_>, view: &dyn ChainView) -> Result<(), ChainError> {
        for rule in &self.rules {
            rule.check(candidate, view)?;
        }
        Ok(())
    }

    /// The rules in execution order.
    pub fn rules(&self) -> Vec<Rule> {
        self.rules.iter().map(|r| r.rule()).collect()
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}
