//! Shared test harness for quill integration tests.
//!
//! Provides [`TestNetwork`], N peers sharing one in-process
//! [`MemoryNetwork`] and one manual clock. Each peer is a full
//! [`QuillNode`] with its own action log, wrapped in a [`Blog`].
//! Replication is driven explicitly with [`TestNetwork::sync`], which
//! replays everything published so far into every peer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_chain::{AgentKey, Identity, ValidationConfig};
use quill_engine::{Blog, EngineError, MemoryNetwork, QuillEngine, QuillNode, blog, telemetry};
use quill_types::{ActionHash, AgentId, ManualClock, Timestamp};
use tracing::debug;

/// Start of every test clock.
pub const EPOCH: Timestamp = Timestamp::from_millis(1_700_000_000_000);

/// How long [`TestNetwork::settle`] waits for the publish queue to go quiet.
const SETTLE_POLLS: usize = 400;
const SETTLE_INTERVAL: Duration = Duration::from_millis(2);

/// Deterministic author key for peer seeds.
pub fn peer_key(seed: u8) -> Arc<AgentKey> {
    Arc::new(AgentKey::from_seed([seed; 32]))
}

/// One participant: a node and the blog on top of it.
pub struct Peer {
    node: Arc<QuillNode>,
    blog: Blog,
}

impl Peer {
    pub fn node(&self) -> &QuillNode {
        &self.node
    }

    pub fn blog(&self) -> &Blog {
        &self.blog
    }

    pub fn agent(&self) -> AgentId {
        self.node.agent_id()
    }
}

/// N peers on a shared network and clock.
pub struct TestNetwork {
    network: Arc<MemoryNetwork>,
    clock: Arc<ManualClock>,
    peers: Vec<Peer>,
    offline: Mutex<HashSet<usize>>,
}

impl TestNetwork {
    /// `n` peers with no content or rate limits.
    pub fn new(n: usize) -> Self {
        Self::with_validation(n, &ValidationConfig::default())
    }

    /// `n` peers that all enforce `validation` and the blog's link schemas.
    pub fn with_validation(n: usize, validation: &ValidationConfig) -> Self {
        assert!(n >= 1, "need at least one peer");
        assert!(n < u8::MAX as usize, "too many peers");
        telemetry::init("warn");
        let validation = &blog::with_link_schemas(validation.clone());

        let network = MemoryNetwork::new();
        let clock = Arc::new(ManualClock::new(EPOCH));

        let peers = (1..=n as u8)
            .map(|seed| {
                let key = peer_key(seed);
                let transport = Arc::new(network.transport(key.agent_id()));
                let node = QuillNode::in_memory(key, validation)
                    .expect("in-memory node")
                    .with_clock(clock.clone())
                    .with_transport(transport);
                let node = Arc::new(node);
                let blog = Blog::new(node.clone());
                Peer { node, blog }
            })
            .collect();

        Self {
            network,
            clock,
            peers,
            offline: Mutex::new(HashSet::new()),
        }
    }

    /// Peer `i`.
    pub fn peer(&self, i: usize) -> &Peer {
        &self.peers[i]
    }

    /// Shorthand for `peer(i).blog()`.
    pub fn blog(&self, i: usize) -> &Blog {
        self.peers[i].blog()
    }

    /// Shorthand for `peer(i).node()`.
    pub fn node(&self, i: usize) -> &QuillNode {
        self.peers[i].node()
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns `true` if there are no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// The shared network.
    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }

    /// The shared clock.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Move the shared clock forward.
    pub fn advance(&self, d: Duration) {
        self.clock.advance(d);
    }

    /// Move the shared clock forward one second, so consecutive writes get
    /// distinct timestamps.
    pub fn tick(&self) {
        self.advance(Duration::from_secs(1));
    }

    /// Cut peer `i` off from the network, or reconnect it.
    pub async fn set_online(&self, i: usize, online: bool) {
        {
            let mut offline = self.offline.lock().expect("offline set");
            if online {
                offline.remove(&i);
            } else {
                offline.insert(i);
            }
        }
        self.network.set_online(self.peers[i].agent(), online).await;
    }

    fn is_online(&self, i: usize) -> bool {
        !self.offline.lock().expect("offline set").contains(&i)
    }

    /// Wait until the background publish tasks stop adding records.
    pub async fn settle(&self) {
        let mut last = self.network.len().await;
        let mut quiet = 0;
        for _ in 0..SETTLE_POLLS {
            tokio::time::sleep(SETTLE_INTERVAL).await;
            let now = self.network.len().await;
            if now == last {
                quiet += 1;
                if quiet >= 5 {
                    return;
                }
            } else {
                quiet = 0;
                last = now;
            }
        }
    }

    /// Replay every published record into every online peer.
    ///
    /// Returns the number of records newly admitted across all peers.
    pub async fn sync(&self) -> Result<usize, EngineError> {
        self.settle().await;
        let published = self.network.published().await;

        let mut admitted = 0;
        for (i, peer) in self.peers.iter().enumerate() {
            if !self.is_online(i) {
                debug!(peer = i, "skipping offline peer");
                continue;
            }
            for record in &published {
                if peer.node.ingest(record).await? {
                    admitted += 1;
                }
            }
        }
        debug!(admitted, records = published.len(), "network synced");
        Ok(admitted)
    }

    /// The action hashes peer `viewer` knows for `author`'s chain.
    pub async fn activity(&self, viewer: usize, author: usize) -> Vec<ActionHash> {
        self.peers[viewer]
            .node
            .agent_activity(self.peers[author].agent())
            .await
            .expect("agent activity")
    }
}
