//! [`QuillEngine`]: the query facade for applications.
//!
//! Applications (the bundled [`Blog`](crate::Blog), test harnesses, future
//! RPC adapters) depend on this trait instead of the concrete
//! [`QuillNode`](crate::QuillNode).

use quill_chain::{DeletedLink, Link, Record, SignedAction};
use quill_types::{ActionHash, AgentId, Entry, LinkTag, Linkable};

use crate::error::EngineError;

/// The externally callable surface of a node.
///
/// Every write returns once the action is durable locally; replication to
/// peers happens afterwards in the background.
#[async_trait::async_trait]
pub trait QuillEngine: Send + Sync {
    /// The author every write is attributed to.
    fn agent_id(&self) -> AgentId;

    /// Publish a new entry. The create action's hash identifies the record.
    async fn create_entry(&self, entry: Entry) -> Result<Record, EngineError>;

    /// The record as originally created (or the exact revision named).
    async fn get_entry(&self, hash: ActionHash) -> Result<Record, EngineError>;

    /// The newest live revision of a record.
    ///
    /// A deleted record is `NotFound` unless `include_deleted` is set.
    async fn get_latest(
        &self,
        hash: ActionHash,
        include_deleted: bool,
    ) -> Result<Record, EngineError>;

    /// Supersede `previous` with a new revision.
    async fn update_entry(&self, previous: ActionHash, entry: Entry)
    -> Result<Record, EngineError>;

    /// Tombstone a revision. Returns the delete action's hash.
    async fn delete_entry(&self, hash: ActionHash) -> Result<ActionHash, EngineError>;

    /// Add a tagged edge. Returns the create-link action's hash.
    async fn create_link(
        &self,
        base: Linkable,
        target: Linkable,
        tag: LinkTag,
    ) -> Result<ActionHash, EngineError>;

    /// Tombstone a link. Returns the delete-link action's hash.
    async fn delete_link(&self, link_action: ActionHash) -> Result<ActionHash, EngineError>;

    /// Live links from `base`, oldest first.
    async fn get_links(
        &self,
        base: Linkable,
        tag: Option<LinkTag>,
    ) -> Result<Vec<Link>, EngineError>;

    /// Deleted links from `base` with every delete recorded against each.
    async fn get_deleted_links(
        &self,
        base: Linkable,
        tag: Option<LinkTag>,
    ) -> Result<Vec<DeletedLink>, EngineError>;

    /// The record and every update after it, oldest first.
    async fn get_all_revisions(&self, hash: ActionHash) -> Result<Vec<Record>, EngineError>;

    /// Every delete of a revision, oldest first.
    async fn get_deletes(&self, hash: ActionHash) -> Result<Vec<SignedAction>, EngineError>;

    /// The earliest delete of a revision.
    async fn get_oldest_delete(&self, hash: ActionHash) -> Result<SignedAction, EngineError>;

    /// An author's chain as known locally, oldest first.
    async fn agent_activity(&self, author: AgentId) -> Result<Vec<ActionHash>, EngineError>;
}
