//! Replication hand-off.
//!
//! The engine never talks to peers directly. After a write is durable it
//! publishes the record through a [`Transport`]; on a local miss it fetches.
//! Both are best-effort: publish failures are logged, fetch may return
//! nothing for data that has not propagated yet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use quill_chain::Record;
use quill_types::{ActionHash, AgentId};
use tokio::sync::RwLock;
use tracing::trace;

/// Errors from the replication transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer or network could not be reached.
    #[error("unreachable: {0}")]
    Unreachable(String),
}

/// Publish/fetch service consumed by the node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Make a locally admitted record available to peers.
    async fn publish(&self, record: &Record) -> Result<(), TransportError>;

    /// Look up a record by action hash. `None` if no peer has it (yet).
    async fn fetch(&self, hash: ActionHash) -> Result<Option<Record>, TransportError>;
}

/// Transport for a node with no peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn publish(&self, _record: &Record) -> Result<(), TransportError> {
        Ok(())
    }

    async fn fetch(&self, _hash: ActionHash) -> Result<Option<Record>, TransportError> {
        Ok(None)
    }
}

/// An in-process shared record space.
///
/// Every published record becomes fetchable by every attached transport.
/// Agents can be taken offline to simulate partitions.
#[derive(Default)]
pub struct MemoryNetwork {
    records: RwLock<HashMap<ActionHash, Record>>,
    /// Publish order, for replaying the network into a node.
    order: RwLock<Vec<ActionHash>>,
    offline: RwLock<HashSet<AgentId>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A transport for `agent` attached to this network.
    pub fn transport(self: &Arc<Self>, agent: AgentId) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
            agent,
        }
    }

    /// Cut `agent` off from the network, or reconnect it.
    pub async fn set_online(&self, agent: AgentId, online: bool) {
        let mut offline = self.offline.write().await;
        if online {
            offline.remove(&agent);
        } else {
            offline.insert(agent);
        }
    }

    /// Every published record, in publish order.
    pub async fn published(&self) -> Vec<Record> {
        let records = self.records.read().await;
        self.order
            .read()
            .await
            .iter()
            .filter_map(|h| records.get(h).cloned())
            .collect()
    }

    /// Number of distinct published records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn check_online(&self, agent: &AgentId) -> Result<(), TransportError> {
        if self.offline.read().await.contains(agent) {
            return Err(TransportError::Unreachable(format!("{agent} is offline")));
        }
        Ok(())
    }
}

/// One node's handle on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    agent: AgentId,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, record: &Record) -> Result<(), TransportError> {
        self.network.check_online(&self.agent).await?;
        let hash = record.hash();
        let mut records = self.network.records.write().await;
        if records.insert(hash, record.clone()).is_none() {
            self.network.order.write().await.push(hash);
        }
        trace!(%hash, "published record");
        Ok(())
    }

    async fn fetch(&self, hash: ActionHash) -> Result<Option<Record>, TransportError> {
        self.network.check_online(&self.agent).await?;
        Ok(self.network.records.read().await.get(&hash).cloned())
    }
}
