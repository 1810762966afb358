//! Action types for the per-author chains.

use serde::{Deserialize, Serialize};
use quill_types::{ActionHash, AgentId, Entry, EntryHash, EntryType, LinkTag, Linkable, Timestamp};

use crate::error::ChainError;
use crate::identity::{Identity, verify_signature};

/// A single step in an author's chain.
///
/// Records what changed, who changed it and when, and points at the
/// author's previous action so the chain is tamper-evident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Author whose chain this action extends.
    pub author: AgentId,
    /// Position in the author's chain, starting at 0.
    pub seq: u64,
    /// Wall-clock time of creation.
    pub timestamp: Timestamp,
    /// Hash of the author's previous action (`None` for the first).
    pub prev_action: Option<ActionHash>,
    /// What the action does.
    pub kind: ActionKind,
}

/// The five kinds of state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Publish a new entry.
    Create {
        entry_type: EntryType,
        entry_hash: EntryHash,
    },
    /// Supersede a revision of an entry with a new one.
    Update {
        /// The create or update action being revised.
        previous_action: ActionHash,
        entry_type: EntryType,
        entry_hash: EntryHash,
    },
    /// Tombstone a create or update action.
    Delete { deleted_action: ActionHash },
    /// Add a tagged directed edge.
    CreateLink {
        base: Linkable,
        target: Linkable,
        tag: LinkTag,
    },
    /// Tombstone a link.
    DeleteLink { link_action: ActionHash },
}

impl ActionKind {
    /// Short name of the action kind, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::CreateLink { .. } => "create_link",
            Self::DeleteLink { .. } => "delete_link",
        }
    }

    /// The entry this action publishes, for creates and updates.
    pub fn entry_hash(&self) -> Option<EntryHash> {
        match self {
            Self::Create { entry_hash, .. } | Self::Update { entry_hash, .. } => Some(*entry_hash),
            _ => None,
        }
    }

    /// The type of the entry this action publishes, for creates and updates.
    pub fn entry_type(&self) -> Option<EntryType> {
        match self {
            Self::Create { entry_type, .. } | Self::Update { entry_type, .. } => Some(*entry_type),
            _ => None,
        }
    }
}

impl Action {
    /// blake3 hash of the postcard encoding.
    pub fn compute_hash(&self) -> Result<ActionHash, ChainError> {
        let bytes = postcard::to_allocvec(self)?;
        Ok(ActionHash::from_data(&bytes))
    }
}

/// An action together with its hash and the author's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAction {
    pub action: Action,
    /// blake3 hash of `action`.
    pub hash: ActionHash,
    /// ed25519 signature over the hash, by `action.author`.
    /// Stored as two 32-byte halves for serde compatibility.
    pub signature_r: [u8; 32],
    pub signature_s: [u8; 32],
}

impl SignedAction {
    /// Hash the action and sign the hash.
    ///
    /// The identity must be the action's author; a mismatched signer would
    /// produce an action no peer accepts.
    pub fn sign(action: Action, identity: &dyn Identity) -> Result<Self, ChainError> {
        if identity.agent_id() != action.author {
            return Err(ChainError::InvalidSignature);
        }
        let hash = action.compute_hash()?;
        let signature = identity.sign(hash.as_bytes());
        let mut signature_r = [0u8; 32];
        let mut signature_s = [0u8; 32];
        signature_r.copy_from_slice(&signature[..32]);
        signature_s.copy_from_slice(&signature[32..]);
        Ok(Self {
            action,
            hash,
            signature_r,
            signature_s,
        })
    }

    /// Verify that the stored hash matches the action's content.
    pub fn verify_hash(&self) -> bool {
        matches!(self.action.compute_hash(), Ok(h) if h == self.hash)
    }

    /// Reconstruct the 64-byte signature from its two halves.
    pub fn signature_bytes(&self) -> [u8; 64] {
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(&self.signature_r);
        sig[32..].copy_from_slice(&self.signature_s);
        sig
    }

    /// Verify the author's ed25519 signature over the hash.
    pub fn verify_signature(&self) -> bool {
        verify_signature(
            &self.action.author,
            self.hash.as_bytes(),
            &self.signature_bytes(),
        )
    }

    pub fn author(&self) -> AgentId {
        self.action.author
    }

    pub fn timestamp(&self) -> Timestamp {
        self.action.timestamp
    }

    pub fn kind(&self) -> &ActionKind {
        &self.action.kind
    }

    /// Ordering key used wherever several actions compete: oldest first,
    /// hash as the tiebreak.
    pub fn order_key(&self) -> (Timestamp, ActionHash) {
        (self.action.timestamp, self.hash)
    }
}

/// A signed action bundled with the entry it publishes.
///
/// This is the unit that is appended locally and handed to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub action: SignedAction,
    /// Present exactly when the action is a create or update.
    pub entry: Option<Entry>,
}

impl Record {
    pub fn new(action: SignedAction, entry: Option<Entry>) -> Self {
        Self { action, entry }
    }

    pub fn hash(&self) -> ActionHash {
        self.action.hash
    }

    /// Actions that must be admitted before this one can be: the author's
    /// previous action plus everything the action or its entry points at.
    pub fn dependencies(&self) -> Vec<ActionHash> {
        let mut deps: Vec<ActionHash> = self.action.action.prev_action.into_iter().collect();

        match self.action.kind() {
            ActionKind::Create { .. } => {}
            ActionKind::Update {
                previous_action, ..
            } => deps.push(*previous_action),
            ActionKind::Delete { deleted_action } => deps.push(*deleted_action),
            ActionKind::CreateLink { base, target, .. } => {
                deps.extend(base.as_action());
                deps.extend(target.as_action());
            }
            ActionKind::DeleteLink { link_action } => deps.push(*link_action),
        }

        if let Some(entry) = &self.entry {
            deps.extend(entry.references().into_iter().map(|(hash, _)| hash));
        }

        deps.sort();
        deps.dedup();
        deps
    }
}
