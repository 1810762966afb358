//! Tagged directed edges with query-time liveness.
//!
//! Creations and deletions are kept as two separate sets. A link is live
//! when its create action has no delete; nothing is ever removed, so the
//! deleted set doubles as an audit trail.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use quill_types::{ActionHash, AgentId, LinkTag, Linkable, Timestamp};

use crate::action::{ActionKind, SignedAction};

/// A link as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub base: Linkable,
    pub target: Linkable,
    pub tag: LinkTag,
    /// The create-link action; this is what a delete-link names.
    pub create_link_hash: ActionHash,
    pub author: AgentId,
    pub timestamp: Timestamp,
}

/// A link that has been deleted, with the actions that deleted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedLink {
    pub link: Link,
    /// Delete-link actions, oldest first.
    pub deletes: Vec<ActionHash>,
}

/// Index of every link ever created and every link deletion.
#[derive(Debug, Default)]
pub struct LinkIndex {
    /// base → links created from it.
    created: HashMap<Linkable, Vec<Link>>,
    /// create-link hash → (timestamp, delete-link hash).
    deleted: HashMap<ActionHash, Vec<(Timestamp, ActionHash)>>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a newly admitted action. Non-link actions are ignored.
    pub fn record(&mut self, action: &SignedAction) {
        match action.kind() {
            ActionKind::CreateLink { base, target, tag } => {
                self.created.entry(*base).or_default().push(Link {
                    base: *base,
                    target: *target,
                    tag: tag.clone(),
                    create_link_hash: action.hash,
                    author: action.author(),
                    timestamp: action.timestamp(),
                });
            }
            ActionKind::DeleteLink { link_action } => {
                let deletes = self.deleted.entry(*link_action).or_default();
                deletes.push((action.timestamp(), action.hash));
                deletes.sort();
            }
            _ => {}
        }
    }

    /// Whether any delete-link targets `create_link_hash`.
    pub fn is_deleted(&self, create_link_hash: &ActionHash) -> bool {
        self.deleted.contains_key(create_link_hash)
    }

    fn matching<'a>(
        &'a self,
        base: &Linkable,
        tag: Option<&'a LinkTag>,
    ) -> impl Iterator<Item = &'a Link> {
        self.created
            .get(base)
            .into_iter()
            .flatten()
            .filter(move |link| tag.is_none_or(|t| &link.tag == t))
    }

    /// Live links from `base`, optionally filtered by tag, oldest first.
    pub fn links_from(&self, base: &Linkable, tag: Option<&LinkTag>) -> Vec<Link> {
        let mut links: Vec<Link> = self
            .matching(base, tag)
            .filter(|link| !self.is_deleted(&link.create_link_hash))
            .cloned()
            .collect();
        links.sort_by_key(|l| (l.timestamp, l.create_link_hash));
        links
    }

    /// Deleted links from `base`, optionally filtered by tag, oldest first.
    pub fn deleted_links_from(&self, base: &Linkable, tag: Option<&LinkTag>) -> Vec<DeletedLink> {
        let mut links: Vec<DeletedLink> = self
            .matching(base, tag)
            .filter_map(|link| {
                let deletes = self.deleted.get(&link.create_link_hash)?;
                Some(DeletedLink {
                    link: link.clone(),
                    deletes: deletes.iter().map(|(_, h)| *h).collect(),
                })
            })
            .collect();
        links.sort_by_key(|d| (d.link.timestamp, d.link.create_link_hash));
        links
    }
}
