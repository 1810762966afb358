//! The built-in admission rules.

use quill_types::{ActionHash, EntryType, LinkTag, Linkable};
use tracing::trace;

use super::{
    Candidate, ContentLimit, LinkEndpoint, LinkSchema, Origin, RateLimit, ValidationRule,
};
use crate::action::{ActionKind, SignedAction};
use crate::error::{ChainError, Rule, ValidationError};
use crate::revisions::{ChainView, RevisionResolver};

type Result<T> = std::result::Result<T, ChainError>;

fn reject(rule: Rule, detail: impl Into<String>) -> ChainError {
    ChainError::Validation(ValidationError::new(rule, detail))
}

/// Rejects entries whose text is at or above the configured length.
#[derive(Debug, Clone, Default)]
pub struct ContentLengthRule {
    limits: Vec<ContentLimit>,
}

impl ContentLengthRule {
    pub fn new(limits: Vec<ContentLimit>) -> Self {
        Self { limits }
    }
}

impl ValidationRule for ContentLengthRule {
    fn rule(&self) -> Rule {
        Rule::ContentLength
    }

    fn check(&self, candidate: &Candidate<'_>, _view: &dyn ChainView) -> Result<()> {
        let Some(entry) = candidate.entry else {
            return Ok(());
        };
        let entry_type = entry.entry_type();
        let chars = entry.content().chars().count();

        for limit in self.limits.iter().filter(|l| l.entry_type == entry_type) {
            if chars >= limit.max_chars {
                return Err(reject(
                    Rule::ContentLength,
                    format!(
                        "{entry_type} content has {chars} characters, must be fewer than {}",
                        limit.max_chars
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Only the author of a record may revise or delete it, and entries may
/// only name their actual author.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipRule;

impl ValidationRule for OwnershipRule {
    fn rule(&self) -> Rule {
        Rule::Ownership
    }

    fn check(&self, candidate: &Candidate<'_>, view: &dyn ChainView) -> Result<()> {
        let author = candidate.action.author();

        if let Some(entry) = candidate.entry
            && entry.author() != author
        {
            return Err(reject(
                Rule::Ownership,
                format!(
                    "entry names {} as author but the action is signed by {author}",
                    entry.author()
                ),
            ));
        }

        let target = match candidate.action.kind() {
            ActionKind::Update {
                previous_action, ..
            } => previous_action,
            ActionKind::Delete { deleted_action } => deleted_action,
            _ => return Ok(()),
        };

        // Missing or malformed targets are reported by referential integrity.
        let origin = match RevisionResolver::new(view).origin_of(target) {
            Ok(origin) => origin,
            Err(ChainError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        if origin.author() != author {
            return Err(reject(
                Rule::Ownership,
                format!(
                    "{} may not {} {target}: the record belongs to {}",
                    author,
                    candidate.action.kind().name(),
                    origin.author()
                ),
            ));
        }
        Ok(())
    }
}

/// Caps how many entries of a type one author may create per window.
#[derive(Debug, Clone, Default)]
pub struct RateLimitRule {
    limits: Vec<RateLimit>,
}

impl RateLimitRule {
    pub fn new(limits: Vec<RateLimit>) -> Self {
        Self { limits }
    }

    /// Creations of `entry_type` by the candidate's author inside the
    /// window ending at the candidate's timestamp.
    fn count_recent(
        candidate: &SignedAction,
        limit: &RateLimit,
        view: &dyn ChainView,
    ) -> Result<u32> {
        let now = candidate.timestamp();
        let since = now.saturating_sub(limit.window);
        let mut count = 0;

        // Chains are timestamp-ordered, so walking back can stop at the
        // first action older than the window.
        for hash in view.chain_of(&candidate.author())?.iter().rev() {
            let Some(action) = view.action(hash)? else {
                continue;
            };
            if action.timestamp() < since {
                break;
            }
            if action.timestamp() > now {
                continue;
            }
            if let ActionKind::Create { entry_type, .. } = action.kind()
                && *entry_type == limit.entry_type
            {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl ValidationRule for RateLimitRule {
    fn rule(&self) -> Rule {
        Rule::RateLimit
    }

    fn check(&self, candidate: &Candidate<'_>, view: &dyn ChainView) -> Result<()> {
        let ActionKind::Create { entry_type, .. } = candidate.action.kind() else {
            return Ok(());
        };

        for limit in self.limits.iter().filter(|l| l.entry_type == *entry_type) {
            let count = Self::count_recent(candidate.action, limit, view)?;
            trace!(%entry_type, count, max = limit.max_creates, "rate limit check");
            if count >= limit.max_creates {
                return Err(reject(
                    Rule::RateLimit,
                    format!(
                        "{count} {entry_type} creations in the last {:?}, at most {} allowed",
                        limit.window, limit.max_creates
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Everything an action points at must exist locally with the right shape.
///
/// Locally written actions must also not point at deleted records.
#[derive(Debug, Clone, Default)]
pub struct ReferentialIntegrityRule {
    schemas: Vec<LinkSchema>,
}

impl ReferentialIntegrityRule {
    pub fn new(schemas: Vec<LinkSchema>) -> Self {
        Self { schemas }
    }

    fn fetch(view: &dyn ChainView, hash: &ActionHash, role: &str) -> Result<SignedAction> {
        view.action(hash)?.ok_or_else(|| {
            reject(
                Rule::ReferentialIntegrity,
                format!("{role} {hash} is not known locally"),
            )
        })
    }

    /// The target must be a create or update, optionally of a given type.
    fn expect_revision(
        view: &dyn ChainView,
        hash: &ActionHash,
        role: &str,
        expected: Option<EntryType>,
    ) -> Result<SignedAction> {
        let action = Self::fetch(view, hash, role)?;
        let Some(actual) = action.kind().entry_type() else {
            return Err(reject(
                Rule::ReferentialIntegrity,
                format!(
                    "{role} {hash} is a {} action, not an entry",
                    action.kind().name()
                ),
            ));
        };
        if let Some(expected) = expected
            && actual != expected
        {
            return Err(reject(
                Rule::ReferentialIntegrity,
                format!("{role} {hash} is a {actual}, expected a {expected}"),
            ));
        }
        Ok(action)
    }

    fn expect_live(
        view: &dyn ChainView,
        origin: Origin,
        hash: &ActionHash,
        role: &str,
    ) -> Result<()> {
        if origin == Origin::Local && view.is_deleted(hash) {
            return Err(reject(
                Rule::ReferentialIntegrity,
                format!("{role} {hash} has been deleted"),
            ));
        }
        Ok(())
    }

    fn expect_linkable(
        view: &dyn ChainView,
        origin: Origin,
        linkable: &Linkable,
        role: &str,
        expected: Option<LinkEndpoint>,
    ) -> Result<()> {
        match (linkable, expected) {
            (Linkable::Action(hash), None) => {
                Self::fetch(view, hash, role)?;
            }
            (Linkable::Action(hash), Some(LinkEndpoint::Entry(entry_type))) => {
                Self::expect_revision(view, hash, role, Some(entry_type))?;
            }
            (Linkable::Agent(_), None | Some(LinkEndpoint::Agent))
            | (Linkable::Anchor(_), None | Some(LinkEndpoint::Anchor)) => return Ok(()),
            (linkable, Some(expected)) => {
                return Err(reject(
                    Rule::ReferentialIntegrity,
                    format!("{role} {linkable} does not match {expected:?}"),
                ));
            }
        }
        match linkable.as_action() {
            Some(hash) => Self::expect_live(view, origin, &hash, role),
            None => Ok(()),
        }
    }

    fn schema(&self, tag: &LinkTag) -> Option<&LinkSchema> {
        self.schemas.iter().find(|s| &s.tag == tag)
    }
}

impl ValidationRule for ReferentialIntegrityRule {
    fn rule(&self) -> Rule {
        Rule::ReferentialIntegrity
    }

    fn check(&self, candidate: &Candidate<'_>, view: &dyn ChainView) -> Result<()> {
        let origin = candidate.origin;
        if let Some(entry) = candidate.entry {
            for (hash, expected) in entry.references() {
                Self::expect_revision(view, &hash, "referenced record", Some(expected))?;
                Self::expect_live(view, origin, &hash, "referenced record")?;
            }
        }

        match candidate.action.kind() {
            ActionKind::Create { .. } => Ok(()),
            ActionKind::Update {
                previous_action,
                entry_type,
                ..
            } => {
                Self::expect_revision(view, previous_action, "updated record", Some(*entry_type))?;
                Self::expect_live(view, origin, previous_action, "updated record")
            }
            // Deleting twice is allowed; every delete is kept.
            ActionKind::Delete { deleted_action } => {
                Self::expect_revision(view, deleted_action, "deleted record", None).map(|_| ())
            }
            ActionKind::CreateLink { base, target, tag } => {
                let schema = self.schema(tag);
                Self::expect_linkable(view, origin, base, "link base", schema.map(|s| s.base))?;
                Self::expect_linkable(
                    view,
                    origin,
                    target,
                    "link target",
                    schema.map(|s| s.target),
                )
            }
            ActionKind::DeleteLink { link_action } => {
                let action = Self::fetch(view, link_action, "deleted link")?;
                if !matches!(action.kind(), ActionKind::CreateLink { .. }) {
                    return Err(reject(
                        Rule::ReferentialIntegrity,
                        format!(
                            "deleted link {link_action} is a {} action, not a link",
                            action.kind().name()
                        ),
                    ));
                }
                Ok(())
            }
        }
    }
}
