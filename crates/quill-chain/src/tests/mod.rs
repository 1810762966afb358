//! Tests for the chain crate.


use std::sync::Arc;

use quill_store::MemoryStore;
use quill_types::{ActionHash, Comment, Entry, LinkTag, Linkable, Post, Timestamp};

use crate::action::{Action, ActionKind, Record, SignedAction};
use crate::error::{ChainError, Rule};
use crate::identity::{AgentKey, Identity};
use crate::log::{ActionLog, ChainHead};
use crate::store::ChainStore;
use crate::validation::{ValidationConfig, ValidationPipeline};

type Result<T> = std::result::Result<T, ChainError>;

/// Deterministic author key from a seed.
fn test_key(seed: u8) -> AgentKey {
    AgentKey::from_seed([seed; 32])
}

/// In-memory log with no content or rate limits.
fn test_log() -> ActionLog {
    test_log_with(&ValidationConfig::default())
}

fn test_log_with(config: &ValidationConfig) -> ActionLog {
    ActionLog::open(
        ChainStore::in_memory(),
        Arc::new(MemoryStore::new()),
        ValidationPipeline::from_config(config),
    )
    .unwrap()
}

fn ts(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

fn post(key: &AgentKey, name: &str, content: &str) -> Entry {
    Post {
        name: name.into(),
        content: content.into(),
        author: key.agent_id(),
    }
    .into()
}

fn comment(key: &AgentKey, post_hash: ActionHash, content: &str) -> Entry {
    Comment {
        content: content.into(),
        post_hash,
        author: key.agent_id(),
    }
    .into()
}

/// Sign `kind` on top of `head`.
fn sign_on(
    key: &AgentKey,
    head: Option<&ChainHead>,
    timestamp: Timestamp,
    kind: ActionKind,
    entry: Option<Entry>,
) -> Record {
    let (seq, prev_action) = ChainHead::next(head);
    let action = Action {
        author: key.agent_id(),
        seq,
        timestamp,
        prev_action,
        kind,
    };
    Record::new(SignedAction::sign(action, key).unwrap(), entry)
}

/// Append `kind` to the key's chain at `timestamp`.
async fn append(
    log: &ActionLog,
    key: &AgentKey,
    timestamp: Timestamp,
    kind: ActionKind,
    entry: Option<Entry>,
) -> Result<Record> {
    log.commit(key.agent_id(), |head| {
        Ok(sign_on(key, head.as_ref(), timestamp, kind, entry))
    })
    .await
}

async fn create(log: &ActionLog, key: &AgentKey, timestamp: Timestamp, entry: Entry) -> Result<Record> {
    let kind = ActionKind::Create {
        entry_type: entry.entry_type(),
        entry_hash: entry.hash().unwrap(),
    };
    append(log, key, timestamp, kind, Some(entry)).await
}

async fn update(
    log: &ActionLog,
    key: &AgentKey,
    timestamp: Timestamp,
    previous_action: ActionHash,
    entry: Entry,
) -> Result<Record> {
    let kind = ActionKind::Update {
        previous_action,
        entry_type: entry.entry_type(),
        entry_hash: entry.hash().unwrap(),
    };
    append(log, key, timestamp, kind, Some(entry)).await
}

async fn delete(
    log: &ActionLog,
    key: &AgentKey,
    timestamp: Timestamp,
    deleted_action: ActionHash,
) -> Result<Record> {
    append(log, key, timestamp, ActionKind::Delete { deleted_action }, None).await
}

async fn link(
    log: &ActionLog,
    key: &AgentKey,
    timestamp: Timestamp,
    base: Linkable,
    target: Linkable,
    tag: &str,
) -> Result<Record> {
    let kind = ActionKind::CreateLink {
        base,
        target,
        tag: LinkTag::new(tag),
    };
    append(log, key, timestamp, kind, None).await
}

async fn unlink(
    log: &ActionLog,
    key: &AgentKey,
    timestamp: Timestamp,
    link_action: ActionHash,
) -> Result<Record> {
    append(log, key, timestamp, ActionKind::DeleteLink { link_action }, None).await
}

/// The rule behind a validation failure, panicking on any other outcome.
fn rejected_by<T: std::fmt::Debug>(result: Result<T>) -> Rule {
    match result {
        Err(ChainError::Validation(v)) => v.rule,
        other => panic!("expected a validation error, got {other:?}"),
    }
}
