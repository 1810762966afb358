//! The action log: admission, storage and queries over every known chain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use quill_store::ContentStore;
use quill_types::{ActionHash, AgentId, Entry, EntryHash, LinkTag, Linkable, Timestamp};
use tracing::{debug, info, trace};

use crate::action::{Record, SignedAction};
use crate::error::{ChainError, Rule, ValidationError};
use crate::links::{DeletedLink, Link, LinkIndex};
use crate::revisions::{ChainView, RevisionIndex, RevisionResolver};
use crate::store::ChainStore;
use crate::validation::{Candidate, Origin, ValidationPipeline};

type Result<T> = std::result::Result<T, ChainError>;

/// The last action of an author's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
    pub hash: ActionHash,
    pub seq: u64,
    pub timestamp: Timestamp,
}

impl ChainHead {
    /// The `(seq, prev_action)` the next action must carry.
    pub fn next(head: Option<&ChainHead>) -> (u64, Option<ActionHash>) {
        match head {
            Some(h) => (h.seq + 1, Some(h.hash)),
            None => (0, None),
        }
    }
}

/// In-memory indexes, rebuilt from the chains at open.
#[derive(Default)]
struct LogIndex {
    heads: HashMap<AgentId, ChainHead>,
    revisions: RevisionIndex,
    links: LinkIndex,
}

impl LogIndex {
    fn apply(&mut self, action: &SignedAction) {
        self.heads.insert(
            action.author(),
            ChainHead {
                hash: action.hash,
                seq: action.action.seq,
                timestamp: action.timestamp(),
            },
        );
        self.revisions.record(action);
        self.links.record(action);
    }
}

/// Admitted actions plus the indexes that answer queries about them.
struct LogView<'a> {
    store: &'a ChainStore,
    index: &'a LogIndex,
}

impl ChainView for LogView<'_> {
    fn action(&self, hash: &ActionHash) -> Result<Option<SignedAction>> {
        self.store.get_action(hash)
    }

    fn chain_of(&self, author: &AgentId) -> Result<Vec<ActionHash>> {
        self.store.chain_of(author)
    }

    fn updates_of(&self, hash: &ActionHash) -> Vec<ActionHash> {
        self.index.revisions.updates_of(hash)
    }

    fn deletes_of(&self, hash: &ActionHash) -> Vec<ActionHash> {
        self.index.revisions.deletes_of(hash)
    }
}

/// Every author's chain, as known to this node.
///
/// Appends to one author's chain are serialized by a per-author lock;
/// different authors append concurrently. Reads never take the writer
/// locks and always observe whole actions.
pub struct ActionLog {
    store: ChainStore,
    content: Arc<dyn ContentStore>,
    pipeline: ValidationPipeline,
    index: RwLock<LogIndex>,
    writers: Mutex<HashMap<AgentId, Arc<tokio::sync::Mutex<()>>>>,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> ChainError {
    ChainError::Storage("action log lock poisoned".into())
}

impl ActionLog {
    /// Open a log over existing storage, rebuilding the indexes by
    /// replaying every committed chain slot.
    pub fn open(
        store: ChainStore,
        content: Arc<dyn ContentStore>,
        pipeline: ValidationPipeline,
    ) -> Result<Self> {
        let mut index = LogIndex::default();
        let slots = store.chain_slots()?;

        for (author, seq, hash) in &slots {
            let action = store.get_action(hash)?.ok_or_else(|| {
                ChainError::Storage(format!("chain slot {author}/{seq} names missing action {hash}"))
            })?;
            index.apply(&action);
        }

        info!(
            actions = slots.len(),
            authors = index.heads.len(),
            "action log opened"
        );

        Ok(Self {
            store,
            content,
            pipeline,
            index: RwLock::new(index),
            writers: Mutex::new(HashMap::new()),
        })
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, LogIndex>> {
        self.index.read().map_err(poisoned)
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, LogIndex>> {
        self.index.write().map_err(poisoned)
    }

    fn writer(&self, author: AgentId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut writers = self.writers.lock().map_err(poisoned)?;
        Ok(writers.entry(author).or_default().clone())
    }

    // ----- Writes -----

    /// The current head of `author`'s chain.
    pub fn head(&self, author: &AgentId) -> Result<Option<ChainHead>> {
        Ok(self.read_index()?.heads.get(author).copied())
    }

    /// Append a locally built record.
    ///
    /// Fails with [`ChainError::ChainFork`] if the record does not extend
    /// the author's current head; the caller should rebuild and retry.
    pub async fn append(&self, record: &Record) -> Result<ActionHash> {
        let writer = self.writer(record.action.author())?;
        let _guard = writer.lock().await;
        self.admit(record, Origin::Local).await
    }

    /// Build a record against the author's head and append it, holding the
    /// author's lock throughout so the head cannot move underneath.
    pub async fn commit<F>(&self, author: AgentId, build: F) -> Result<Record>
    where
        F: FnOnce(Option<ChainHead>) -> Result<Record> + Send,
    {
        let writer = self.writer(author)?;
        let _guard = writer.lock().await;
        let head = self.head(&author)?;
        let record = build(head)?;
        self.admit(&record, Origin::Local).await?;
        Ok(record)
    }

    /// Ingest a record from a peer.
    ///
    /// Returns `Ok(false)` if the action is already known. Remote records
    /// get their signature checked and go through the same rules as local
    /// ones, since every node re-validates what it stores.
    pub async fn receive(&self, record: &Record) -> Result<bool> {
        if self.store.has_action(&record.hash())? {
            return Ok(false);
        }
        if !record.action.verify_hash() {
            return Err(ChainError::InvalidHash);
        }
        if !record.action.verify_signature() {
            return Err(ChainError::InvalidSignature);
        }

        let writer = self.writer(record.action.author())?;
        let _guard = writer.lock().await;
        if self.store.has_action(&record.hash())? {
            return Ok(false);
        }
        self.admit(record, Origin::Remote).await?;
        Ok(true)
    }

    /// Check, validate and store. Caller holds the author's writer lock.
    async fn admit(&self, record: &Record, origin: Origin) -> Result<ActionHash> {
        let signed = &record.action;

        {
            let index = self.read_index()?;
            self.check_structure(record, &index, origin)?;
            let view = LogView {
                store: &self.store,
                index: &index,
            };
            let candidate = Candidate {
                action: signed,
                entry: record.entry.as_ref(),
                origin,
            };
            self.pipeline.run(&candidate, &view)?;
        }

        if let Some(entry) = &record.entry {
            self.content.put(Bytes::from(entry.encode()?)).await?;
        }
        self.store.put_action(signed)?;
        self.store
            .put_chain_slot(&signed.author(), signed.action.seq, &signed.hash)?;
        self.write_index()?.apply(signed);

        debug!(
            hash = %signed.hash,
            author = %signed.author(),
            seq = signed.action.seq,
            kind = signed.kind().name(),
            ?origin,
            "admitted action"
        );

        Ok(signed.hash)
    }

    /// Hash, entry and chain-continuity checks that precede the rules.
    fn check_structure(&self, record: &Record, index: &LogIndex, origin: Origin) -> Result<()> {
        let signed = &record.action;
        let action = &signed.action;

        if !signed.verify_hash() {
            return Err(ChainError::InvalidHash);
        }

        match (action.kind.entry_hash(), &record.entry) {
            (Some(declared), Some(entry)) => {
                let actual = entry.hash()?;
                if actual != declared {
                    return Err(ValidationError::new(
                        Rule::EntryMismatch,
                        format!("action declares entry {declared}, record carries {actual}"),
                    )
                    .into());
                }
                if action.kind.entry_type() != Some(entry.entry_type()) {
                    return Err(ValidationError::new(
                        Rule::EntryMismatch,
                        format!(
                            "action declares a {:?} entry, record carries a {}",
                            action.kind.entry_type(),
                            entry.entry_type()
                        ),
                    )
                    .into());
                }
            }
            (Some(declared), None) => {
                return Err(ValidationError::new(
                    Rule::EntryMismatch,
                    format!("entry {declared} missing from record"),
                )
                .into());
            }
            (None, Some(_)) => {
                return Err(ValidationError::new(
                    Rule::EntryMismatch,
                    format!("{} action carries an entry", action.kind.name()),
                )
                .into());
            }
            (None, None) => {}
        }

        let head = index.heads.get(&action.author);
        let (expected_seq, expected_prev) = ChainHead::next(head);
        if action.seq != expected_seq || action.prev_action != expected_prev {
            if origin == Origin::Remote
                && let Some(prev) = action.prev_action
                && !self.store.has_action(&prev)?
            {
                return Err(ChainError::MissingPredecessor {
                    author: action.author,
                    missing: prev,
                });
            }
            return Err(ChainError::ChainFork {
                author: action.author,
                expected: expected_prev,
                found: action.prev_action,
            });
        }

        if let Some(head) = head
            && action.timestamp < head.timestamp
        {
            return Err(ValidationError::new(
                Rule::ChainOrder,
                format!(
                    "timestamp {} is earlier than the previous action at {}",
                    action.timestamp, head.timestamp
                ),
            )
            .into());
        }

        trace!(hash = %signed.hash, "structure checks passed");
        Ok(())
    }

    // ----- Reads -----

    fn with_view<T>(&self, f: impl FnOnce(&LogView<'_>) -> Result<T>) -> Result<T> {
        let index = self.read_index()?;
        let view = LogView {
            store: &self.store,
            index: &index,
        };
        f(&view)
    }

    /// Whether the action has been admitted.
    pub fn contains(&self, hash: &ActionHash) -> Result<bool> {
        self.store.has_action(hash)
    }

    /// Fetch an admitted action.
    pub fn get(&self, hash: &ActionHash) -> Result<SignedAction> {
        self.store
            .get_action(hash)?
            .ok_or_else(|| ChainError::not_found(format!("action {hash}")))
    }

    /// Fetch an entry from the content store.
    pub async fn entry(&self, hash: &EntryHash) -> Result<Entry> {
        let bytes = self
            .content
            .get(*hash)
            .await?
            .ok_or_else(|| ChainError::not_found(format!("entry {hash}")))?;
        Ok(Entry::decode(&bytes)?)
    }

    /// Fetch an admitted action together with its entry.
    pub async fn record(&self, hash: &ActionHash) -> Result<Record> {
        let action = self.get(hash)?;
        let entry = match action.kind().entry_hash() {
            Some(entry_hash) => Some(self.entry(&entry_hash).await?),
            None => None,
        };
        Ok(Record::new(action, entry))
    }

    /// All action hashes of `author`'s chain, oldest first.
    pub fn chain_of(&self, author: &AgentId) -> Result<Vec<ActionHash>> {
        self.store.chain_of(author)
    }

    /// Every author with at least one action.
    pub fn authors(&self) -> Result<Vec<AgentId>> {
        let mut authors: Vec<AgentId> = self.read_index()?.heads.keys().copied().collect();
        authors.sort();
        Ok(authors)
    }

    /// Newest live revision reachable from `hash`.
    pub fn latest(&self, hash: &ActionHash, include_deleted: bool) -> Result<SignedAction> {
        self.with_view(|v| RevisionResolver::new(v).latest(hash, include_deleted))
    }

    /// Every revision from `hash` forward, oldest first.
    pub fn all_revisions(&self, hash: &ActionHash) -> Result<Vec<SignedAction>> {
        self.with_view(|v| RevisionResolver::new(v).all_revisions(hash))
    }

    /// Create action at the root of the revision tree containing `hash`.
    pub fn origin_of(&self, hash: &ActionHash) -> Result<SignedAction> {
        self.with_view(|v| RevisionResolver::new(v).origin_of(hash))
    }

    /// Deletes targeting `hash`, oldest first.
    pub fn deletes_for(&self, hash: &ActionHash) -> Result<Vec<SignedAction>> {
        self.with_view(|v| RevisionResolver::new(v).deletes_for(hash))
    }

    /// The earliest delete targeting `hash`.
    pub fn oldest_delete_for(&self, hash: &ActionHash) -> Result<SignedAction> {
        self.with_view(|v| RevisionResolver::new(v).oldest_delete_for(hash))
    }

    /// Live links from `base`, oldest first.
    pub fn links_from(&self, base: &Linkable, tag: Option<&LinkTag>) -> Result<Vec<Link>> {
        Ok(self.read_index()?.links.links_from(base, tag))
    }

    /// Deleted links from `base`, oldest first.
    pub fn deleted_links_from(
        &self,
        base: &Linkable,
        tag: Option<&LinkTag>,
    ) -> Result<Vec<DeletedLink>> {
        Ok(self.read_index()?.links.deleted_links_from(base, tag))
    }
}
