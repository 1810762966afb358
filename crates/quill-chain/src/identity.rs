//! Signing identities.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use quill_types::AgentId;

/// Something that can sign actions on behalf of an author.
///
/// The author's [`AgentId`] is the ed25519 public key, so any peer can
/// verify a signature from the action alone.
pub trait Identity: Send + Sync {
    /// The author this identity signs for.
    fn agent_id(&self) -> AgentId;

    /// Sign an arbitrary message.
    fn sign(&self, message: &[u8]) -> [u8; 64];
}

/// An ed25519 keypair.
pub struct AgentKey {
    signing_key: SigningKey,
}

impl AgentKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// The secret seed, for persisting the key.
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Identity for AgentKey {
    fn agent_id(&self) -> AgentId {
        AgentId::from(self.signing_key.verifying_key().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentKey")
            .field("agent_id", &self.agent_id())
            .finish_non_exhaustive()
    }
}

/// Check an ed25519 signature made by `agent`.
///
/// Returns `false` if the agent bytes are not a valid public key.
pub fn verify_signature(agent: &AgentId, message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(agent.as_bytes()) else {
        return false;
    };
    let signature = Signature::from_bytes(signature);
    verifying_key.verify(message, &signature).is_ok()
}
