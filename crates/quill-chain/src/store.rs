//! Storage backend for action chains (Fjall disk or pure in-memory).
//!
//! Two keyspaces:
//! - `actions`: action hash → postcard-encoded [`SignedAction`]
//! - `chains`: author ‖ seq (big-endian) → action hash
//!
//! A chain slot is the commit point of an append: an action without a slot
//! is invisible after reopen and is simply rewritten by the next attempt.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use quill_types::{ActionHash, AgentId};
use tempfile::TempDir;

use crate::action::SignedAction;
use crate::error::ChainError;

type Result<T> = std::result::Result<T, ChainError>;

/// Inner backend: either Fjall-backed (disk) or pure in-memory.
enum Backend {
    Fjall {
        #[allow(dead_code)]
        db: Database,
        actions: Keyspace,
        chains: Keyspace,
        /// Keeps the directory of a temporary store alive.
        _tmp: Option<TempDir>,
    },
    Memory(Box<MemoryBackend>),
}

/// Pure in-memory storage.
struct MemoryBackend {
    /// hash → serialized SignedAction.
    actions: RwLock<HashMap<ActionHash, Vec<u8>>>,
    /// (author, seq) → action hash.
    chains: RwLock<BTreeMap<(AgentId, u64), ActionHash>>,
}

/// Durable home of every action this node has admitted.
pub struct ChainStore {
    backend: Backend,
}

fn storage_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::Storage(e.to_string())
}

fn chain_key(author: &AgentId, seq: u64) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..32].copy_from_slice(author.as_bytes());
    key[32..].copy_from_slice(&seq.to_be_bytes());
    key
}

fn parse_chain_slot(key: &[u8], value: &[u8]) -> Result<(AgentId, u64, ActionHash)> {
    if key.len() != 40 {
        return Err(storage_err(format!("chain key has {} bytes", key.len())));
    }
    let author: [u8; 32] = key[..32].try_into().map_err(storage_err)?;
    let seq: [u8; 8] = key[32..].try_into().map_err(storage_err)?;
    let hash: [u8; 32] = value.try_into().map_err(storage_err)?;
    Ok((
        AgentId::from(author),
        u64::from_be_bytes(seq),
        ActionHash::from(hash),
    ))
}

impl ChainStore {
    /// Open a persistent store at the given path (Fjall backend).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::builder(path).open().map_err(storage_err)?;
        let backend = Self::init_fjall(db, None)?;
        Ok(Self { backend })
    }

    /// Open a temporary store backed by Fjall (cleaned up on drop).
    pub fn open_temporary() -> Result<Self> {
        let tmp = tempfile::tempdir().map_err(storage_err)?;
        let db = Database::builder(tmp.path())
            .temporary(true)
            .open()
            .map_err(storage_err)?;
        let backend = Self::init_fjall(db, Some(tmp))?;
        Ok(Self { backend })
    }

    /// Create a pure in-memory store.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Box::new(MemoryBackend {
                actions: RwLock::new(HashMap::new()),
                chains: RwLock::new(BTreeMap::new()),
            })),
        }
    }

    fn init_fjall(db: Database, tmp: Option<TempDir>) -> Result<Backend> {
        let actions = db
            .keyspace("actions", KeyspaceCreateOptions::default)
            .map_err(storage_err)?;
        let chains = db
            .keyspace("chains", KeyspaceCreateOptions::default)
            .map_err(storage_err)?;
        Ok(Backend::Fjall {
            db,
            actions,
            chains,
            _tmp: tmp,
        })
    }

    // ----- Actions -----

    /// Store an action by its hash.
    pub fn put_action(&self, action: &SignedAction) -> Result<()> {
        let bytes = postcard::to_allocvec(action)?;

        match &self.backend {
            Backend::Fjall { actions, .. } => {
                actions
                    .insert(*action.hash.as_bytes(), bytes)
                    .map_err(storage_err)?;
            }
            Backend::Memory(m) => {
                m.actions
                    .write()
                    .map_err(storage_err)?
                    .insert(action.hash, bytes);
            }
        }
        Ok(())
    }

    /// Retrieve an action by hash.
    pub fn get_action(&self, hash: &ActionHash) -> Result<Option<SignedAction>> {
        let bytes = match &self.backend {
            Backend::Fjall { actions, .. } => actions
                .get(hash.as_bytes())
                .map_err(storage_err)?
                .map(|v| v.to_vec()),
            Backend::Memory(m) => m.actions.read().map_err(storage_err)?.get(hash).cloned(),
        };

        match bytes {
            Some(b) => Ok(Some(postcard::from_bytes(&b)?)),
            None => Ok(None),
        }
    }

    /// Check if an action exists.
    pub fn has_action(&self, hash: &ActionHash) -> Result<bool> {
        match &self.backend {
            Backend::Fjall { actions, .. } => Ok(actions
                .get(hash.as_bytes())
                .map_err(storage_err)?
                .is_some()),
            Backend::Memory(m) => Ok(m.actions.read().map_err(storage_err)?.contains_key(hash)),
        }
    }

    // ----- Chains -----

    /// Record `hash` as the action at position `seq` of `author`'s chain.
    pub fn put_chain_slot(&self, author: &AgentId, seq: u64, hash: &ActionHash) -> Result<()> {
        match &self.backend {
            Backend::Fjall { chains, .. } => {
                chains
                    .insert(chain_key(author, seq), *hash.as_bytes())
                    .map_err(storage_err)?;
            }
            Backend::Memory(m) => {
                m.chains
                    .write()
                    .map_err(storage_err)?
                    .insert((*author, seq), *hash);
            }
        }
        Ok(())
    }

    /// All action hashes of one author's chain, oldest first.
    pub fn chain_of(&self, author: &AgentId) -> Result<Vec<ActionHash>> {
        match &self.backend {
            Backend::Fjall { chains, .. } => {
                let mut result = Vec::new();

                for guard in chains.prefix(author.as_bytes()) {
                    let (k, v) = guard.into_inner().map_err(storage_err)?;
                    let (_, _, hash) = parse_chain_slot(&k, &v)?;
                    result.push(hash);
                }

                Ok(result)
            }
            Backend::Memory(m) => {
                let chains = m.chains.read().map_err(storage_err)?;
                Ok(chains
                    .range((*author, 0)..=(*author, u64::MAX))
                    .map(|(_, hash)| *hash)
                    .collect())
            }
        }
    }

    /// Every committed chain slot, grouped by author and ordered by seq.
    pub fn chain_slots(&self) -> Result<Vec<(AgentId, u64, ActionHash)>> {
        match &self.backend {
            Backend::Fjall { chains, .. } => {
                let mut result = Vec::new();

                for guard in chains.iter() {
                    let (k, v) = guard.into_inner().map_err(storage_err)?;
                    result.push(parse_chain_slot(&k, &v)?);
                }

                Ok(result)
            }
            Backend::Memory(m) => {
                let chains = m.chains.read().map_err(storage_err)?;
                Ok(chains
                    .iter()
                    .map(|((author, seq), hash)| (*author, *seq, *hash))
                    .collect())
            }
        }
    }
}
