//! [`QuillNode`]: the node that ties the log, identity, clock and transport together.
//!
//! A `QuillNode` owns the author identity, the clock, the local action log
//! and the replication transport, and implements the [`QuillEngine`] facade
//! on top of them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use quill_chain::{
    Action, ActionKind, ActionLog, ChainHead, ChainStore, DeletedLink, Identity, Link, Record,
    SignedAction, ValidationConfig, ValidationPipeline,
};
use quill_store::{ContentStore, FileStore, MemoryStore};
use quill_types::{ActionHash, AgentId, Clock, Entry, LinkTag, Linkable, SystemClock};
use tracing::{debug, info, warn};

use crate::config::{QuillConfig, StorageBackend};
use crate::engine::QuillEngine;
use crate::error::EngineError;
use crate::transport::{NullTransport, Transport};

/// One author's node: local state plus a handle on the network.
pub struct QuillNode {
    identity: Arc<dyn Identity>,
    clock: Arc<dyn Clock>,
    log: Arc<ActionLog>,
    transport: Arc<dyn Transport>,
}

impl QuillNode {
    /// Create a node over an existing log, with the system clock and no
    /// peers.
    pub fn new(identity: Arc<dyn Identity>, log: Arc<ActionLog>) -> Self {
        Self {
            identity,
            clock: Arc::new(SystemClock::new()),
            log,
            transport: Arc::new(NullTransport),
        }
    }

    /// A node with in-memory storage.
    pub fn in_memory(
        identity: Arc<dyn Identity>,
        validation: &ValidationConfig,
    ) -> Result<Self, EngineError> {
        let log = ActionLog::open(
            ChainStore::in_memory(),
            Arc::new(MemoryStore::new()),
            ValidationPipeline::from_config(validation),
        )?;
        Ok(Self::new(identity, Arc::new(log)))
    }

    /// A node built from configuration.
    ///
    /// The `fjall` backend keeps actions under `<data_dir>/chain` and entry
    /// blobs under `<data_dir>/entries`.
    pub fn from_config(config: &QuillConfig, identity: Arc<dyn Identity>) -> anyhow::Result<Self> {
        let validation = config.validation()?;
        let pipeline = ValidationPipeline::from_config(&validation);

        let log = match config.storage.backend {
            StorageBackend::Memory => ActionLog::open(
                ChainStore::in_memory(),
                Arc::new(MemoryStore::new()),
                pipeline,
            )?,
            StorageBackend::Fjall => {
                let data_dir = &config.storage.data_dir;
                let store = ChainStore::open(data_dir.join("chain")).with_context(|| {
                    format!("failed to open chain store in {}", data_dir.display())
                })?;
                let content: Arc<dyn ContentStore> =
                    Arc::new(FileStore::new(data_dir.join("entries")).with_context(|| {
                        format!("failed to open entry store in {}", data_dir.display())
                    })?);
                ActionLog::open(store, content, pipeline)?
            }
        };

        info!(
            agent = %identity.agent_id(),
            backend = ?config.storage.backend,
            "quill node ready"
        );

        Ok(Self::new(identity, Arc::new(log)))
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach a replication transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// The local action log.
    pub fn log(&self) -> &Arc<ActionLog> {
        &self.log
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Sign `kind` on top of our chain head, admit it, then publish.
    async fn write(&self, kind: ActionKind, entry: Option<Entry>) -> Result<Record, EngineError> {
        let author = self.identity.agent_id();
        let identity = self.identity.clone();
        let clock = self.clock.clone();

        let record = self
            .log
            .commit(author, move |head| {
                let (seq, prev_action) = ChainHead::next(head.as_ref());
                let now = clock.now();
                let timestamp = head.map_or(now, |h| now.max(h.timestamp));
                let action = Action {
                    author,
                    seq,
                    timestamp,
                    prev_action,
                    kind,
                };
                Ok(Record::new(
                    SignedAction::sign(action, identity.as_ref())?,
                    entry,
                ))
            })
            .await?;

        info!(
            hash = %record.hash(),
            kind = record.action.kind().name(),
            seq = record.action.action.seq,
            "committed action"
        );

        self.publish(&record);
        Ok(record)
    }

    /// Hand a record to the transport without waiting for it.
    fn publish(&self, record: &Record) {
        let transport = self.transport.clone();
        let record = record.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.publish(&record).await {
                warn!(hash = %record.hash(), error = %e, "publish failed");
            }
        });
    }

    // ------------------------------------------------------------------
    // Replication ingest
    // ------------------------------------------------------------------

    /// Admit a record from a peer, pulling anything it depends on first.
    ///
    /// Returns `false` if the record was already known.
    pub async fn ingest(&self, record: &Record) -> Result<bool, EngineError> {
        if self.log.contains(&record.hash())? {
            return Ok(false);
        }
        for dep in record.dependencies() {
            self.pull(dep).await?;
        }
        self.receive(record).await
    }

    async fn receive(&self, record: &Record) -> Result<bool, EngineError> {
        match self.log.receive(record).await {
            Ok(new) => Ok(new),
            Err(e) => {
                warn!(hash = %record.hash(), error = %e, "rejected remote action");
                Err(e.into())
            }
        }
    }

    /// Make `hash` locally available, fetching it and its dependencies from
    /// the transport as needed. Dependencies are admitted before dependents.
    pub async fn pull(&self, hash: ActionHash) -> Result<(), EngineError> {
        let mut fetched: HashMap<ActionHash, Record> = HashMap::new();
        let mut expanded: HashSet<ActionHash> = HashSet::new();
        let mut stack = vec![hash];

        while let Some(&top) = stack.last() {
            if self.log.contains(&top)? {
                stack.pop();
                continue;
            }

            if !fetched.contains_key(&top) {
                let record = self
                    .transport
                    .fetch(top)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("action {top}")))?;
                if record.hash() != top {
                    return Err(quill_chain::ChainError::InvalidHash.into());
                }
                fetched.insert(top, record);
            }

            let mut missing = Vec::new();
            if expanded.insert(top) {
                for dep in fetched[&top].dependencies() {
                    if !self.log.contains(&dep)? {
                        missing.push(dep);
                    }
                }
            }

            if missing.is_empty() {
                stack.pop();
                if let Some(record) = fetched.remove(&top) {
                    self.receive(&record).await?;
                    debug!(hash = %top, "pulled action");
                }
            } else {
                stack.extend(missing);
            }
        }
        Ok(())
    }

    /// Publish our whole chain again, oldest first, waiting for each.
    ///
    /// Catch-up after a partition: records written while unreachable were
    /// never handed to the network. Returns the number published.
    pub async fn republish(&self) -> Result<usize, EngineError> {
        let chain = self.log.chain_of(&self.identity.agent_id())?;
        for hash in &chain {
            let record = self.log.record(hash).await?;
            self.transport.publish(&record).await?;
        }
        info!(actions = chain.len(), "republished chain");
        Ok(chain.len())
    }

    /// Pull `hash` if it is not known locally.
    async fn ensure(&self, hash: ActionHash) -> Result<(), EngineError> {
        if self.log.contains(&hash)? {
            return Ok(());
        }
        self.pull(hash).await
    }

    /// Try to make everything an entry refers to locally visible. Misses
    /// are left for referential integrity to report.
    async fn prefetch_references(&self, entry: &Entry) {
        for (hash, _) in entry.references() {
            if let Err(e) = self.ensure(hash).await {
                debug!(%hash, error = %e, "referenced action unavailable");
            }
        }
    }

    async fn records(&self, actions: Vec<SignedAction>) -> Result<Vec<Record>, EngineError> {
        let mut records = Vec::with_capacity(actions.len());
        for action in actions {
            records.push(self.log.record(&action.hash).await?);
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl QuillEngine for QuillNode {
    fn agent_id(&self) -> AgentId {
        self.identity.agent_id()
    }

    async fn create_entry(&self, entry: Entry) -> Result<Record, EngineError> {
        self.prefetch_references(&entry).await;
        let kind = ActionKind::Create {
            entry_type: entry.entry_type(),
            entry_hash: entry.hash().map_err(quill_chain::ChainError::from)?,
        };
        self.write(kind, Some(entry)).await
    }

    async fn get_entry(&self, hash: ActionHash) -> Result<Record, EngineError> {
        self.ensure(hash).await?;
        Ok(self.log.record(&hash).await?)
    }

    async fn get_latest(
        &self,
        hash: ActionHash,
        include_deleted: bool,
    ) -> Result<Record, EngineError> {
        self.ensure(hash).await?;
        let latest = self.log.latest(&hash, include_deleted)?;
        Ok(self.log.record(&latest.hash).await?)
    }

    async fn update_entry(
        &self,
        previous: ActionHash,
        entry: Entry,
    ) -> Result<Record, EngineError> {
        self.ensure(previous).await?;
        self.prefetch_references(&entry).await;
        let kind = ActionKind::Update {
            previous_action: previous,
            entry_type: entry.entry_type(),
            entry_hash: entry.hash().map_err(quill_chain::ChainError::from)?,
        };
        self.write(kind, Some(entry)).await
    }

    async fn delete_entry(&self, hash: ActionHash) -> Result<ActionHash, EngineError> {
        self.ensure(hash).await?;
        let record = self
            .write(
                ActionKind::Delete {
                    deleted_action: hash,
                },
                None,
            )
            .await?;
        Ok(record.hash())
    }

    async fn create_link(
        &self,
        base: Linkable,
        target: Linkable,
        tag: LinkTag,
    ) -> Result<ActionHash, EngineError> {
        for hash in [base.as_action(), target.as_action()].into_iter().flatten() {
            self.ensure(hash).await?;
        }
        let record = self
            .write(ActionKind::CreateLink { base, target, tag }, None)
            .await?;
        Ok(record.hash())
    }

    async fn delete_link(&self, link_action: ActionHash) -> Result<ActionHash, EngineError> {
        self.ensure(link_action).await?;
        let record = self
            .write(ActionKind::DeleteLink { link_action }, None)
            .await?;
        Ok(record.hash())
    }

    async fn get_links(
        &self,
        base: Linkable,
        tag: Option<LinkTag>,
    ) -> Result<Vec<Link>, EngineError> {
        Ok(self.log.links_from(&base, tag.as_ref())?)
    }

    async fn get_deleted_links(
        &self,
        base: Linkable,
        tag: Option<LinkTag>,
    ) -> Result<Vec<DeletedLink>, EngineError> {
        Ok(self.log.deleted_links_from(&base, tag.as_ref())?)
    }

    async fn get_all_revisions(&self, hash: ActionHash) -> Result<Vec<Record>, EngineError> {
        self.ensure(hash).await?;
        let revisions = self.log.all_revisions(&hash)?;
        self.records(revisions).await
    }

    async fn get_deletes(&self, hash: ActionHash) -> Result<Vec<SignedAction>, EngineError> {
        self.ensure(hash).await?;
        Ok(self.log.deletes_for(&hash)?)
    }

    async fn get_oldest_delete(&self, hash: ActionHash) -> Result<SignedAction, EngineError> {
        self.ensure(hash).await?;
        Ok(self.log.oldest_delete_for(&hash)?)
    }

    async fn agent_activity(&self, author: AgentId) -> Result<Vec<ActionHash>, EngineError> {
        Ok(self.log.chain_of(&author)?)
    }
}
