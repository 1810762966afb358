//! Update chains and tombstones.
//!
//! An entry's history is a tree rooted at its create action: every update
//! names the revision it supersedes, and every delete names the revision it
//! tombstones. The [`RevisionIndex`] remembers those edges; the
//! [`RevisionResolver`] walks them over any [`ChainView`].

use std::collections::HashMap;

use quill_types::{ActionHash, AgentId};

use crate::action::{ActionKind, SignedAction};
use crate::error::ChainError;

type Result<T> = std::result::Result<T, ChainError>;

/// Read-only view of admitted actions and their reverse edges.
pub trait ChainView {
    /// Fetch an admitted action.
    fn action(&self, hash: &ActionHash) -> Result<Option<SignedAction>>;

    /// All action hashes of an author's chain, oldest first.
    fn chain_of(&self, author: &AgentId) -> Result<Vec<ActionHash>>;

    /// Updates whose `previous_action` is `hash`.
    fn updates_of(&self, hash: &ActionHash) -> Vec<ActionHash>;

    /// Deletes whose `deleted_action` is `hash`.
    fn deletes_of(&self, hash: &ActionHash) -> Vec<ActionHash>;

    /// Whether at least one delete targets `hash`.
    fn is_deleted(&self, hash: &ActionHash) -> bool {
        !self.deletes_of(hash).is_empty()
    }
}

/// Reverse edges from revisions to their updates and deletes.
#[derive(Debug, Default)]
pub struct RevisionIndex {
    updates: HashMap<ActionHash, Vec<ActionHash>>,
    deletes: HashMap<ActionHash, Vec<ActionHash>>,
}

impl RevisionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the edges of a newly admitted action.
    pub fn record(&mut self, action: &SignedAction) {
        match action.kind() {
            ActionKind::Update {
                previous_action, ..
            } => self
                .updates
                .entry(*previous_action)
                .or_default()
                .push(action.hash),
            ActionKind::Delete { deleted_action } => self
                .deletes
                .entry(*deleted_action)
                .or_default()
                .push(action.hash),
            _ => {}
        }
    }

    pub fn updates_of(&self, hash: &ActionHash) -> Vec<ActionHash> {
        self.updates.get(hash).cloned().unwrap_or_default()
    }

    pub fn deletes_of(&self, hash: &ActionHash) -> Vec<ActionHash> {
        self.deletes.get(hash).cloned().unwrap_or_default()
    }
}

/// Resolves revision histories over a [`ChainView`].
pub struct RevisionResolver<'a, V: ChainView + ?Sized> {
    view: &'a V,
}

impl<'a, V: ChainView + ?Sized> RevisionResolver<'a, V> {
    pub fn new(view: &'a V) -> Self {
        Self { view }
    }

    fn fetch(&self, hash: &ActionHash) -> Result<SignedAction> {
        self.view
            .action(hash)?
            .ok_or_else(|| ChainError::not_found(format!("action {hash}")))
    }

    /// Fetch `hashes` and sort them oldest first.
    fn fetch_sorted(&self, hashes: &[ActionHash]) -> Result<Vec<SignedAction>> {
        let mut actions = hashes
            .iter()
            .map(|h| self.fetch(h))
            .collect::<Result<Vec<_>>>()?;
        actions.sort_by_key(SignedAction::order_key);
        Ok(actions)
    }

    /// Fetch a create or update action, rejecting every other kind.
    fn fetch_revision(&self, hash: &ActionHash) -> Result<SignedAction> {
        let action = self.fetch(hash)?;
        if action.kind().entry_hash().is_none() {
            return Err(ChainError::not_found(format!(
                "{} is a {} action, not an entry revision",
                hash,
                action.kind().name()
            )));
        }
        Ok(action)
    }

    /// Follow `previous_action` back to the create action of the entry.
    pub fn origin_of(&self, hash: &ActionHash) -> Result<SignedAction> {
        let mut current = self.fetch_revision(hash)?;
        while let ActionKind::Update {
            previous_action, ..
        } = current.kind()
        {
            let previous = *previous_action;
            current = self.fetch_revision(&previous)?;
        }
        Ok(current)
    }

    /// The newest revision reachable from `hash`.
    ///
    /// At each step a delete of the current revision ends the walk: the
    /// record is reported as `NotFound` unless `include_deleted` is set, in
    /// which case the deleted revision itself is returned. Otherwise the
    /// walk moves to the newest update of the current revision.
    ///
    /// A deleted revision is terminal even when it is not the last one.
    /// Deleting an intermediate revision makes the whole record `NotFound`
    /// from any starting point before it, although earlier revisions are
    /// still live and later updates still exist; the walk never falls back
    /// to an earlier revision or skips past the delete.
    pub fn latest(&self, hash: &ActionHash, include_deleted: bool) -> Result<SignedAction> {
        let mut current = self.fetch_revision(hash)?;
        loop {
            if self.view.is_deleted(&current.hash) {
                if include_deleted {
                    return Ok(current);
                }
                return Err(ChainError::not_found(format!(
                    "record {hash} was deleted at revision {}",
                    current.hash
                )));
            }

            let updates = self.fetch_sorted(&self.view.updates_of(&current.hash))?;
            match updates.into_iter().last() {
                Some(newest) => current = newest,
                None => return Ok(current),
            }
        }
    }

    /// Every revision from `hash` forward, oldest first.
    ///
    /// Branches (two updates of the same revision) are walked depth-first,
    /// each branch in timestamp order.
    pub fn all_revisions(&self, hash: &ActionHash) -> Result<Vec<SignedAction>> {
        let root = self.fetch_revision(hash)?;
        let mut revisions = Vec::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let mut updates = self.fetch_sorted(&self.view.updates_of(&current.hash))?;
            revisions.push(current);
            updates.reverse();
            stack.extend(updates);
        }

        Ok(revisions)
    }

    /// Every delete targeting `hash`, oldest first.
    pub fn deletes_for(&self, hash: &ActionHash) -> Result<Vec<SignedAction>> {
        self.fetch_revision(hash)?;
        self.fetch_sorted(&self.view.deletes_of(hash))
    }

    /// The earliest delete targeting `hash`.
    pub fn oldest_delete_for(&self, hash: &ActionHash) -> Result<SignedAction> {
        self.deletes_for(hash)?
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::not_found(format!("no delete for {hash}")))
    }
}
