//! Shared types and identifiers for quill.
//!
//! This crate defines the core vocabulary used across the workspace:
//! content-addressed identifiers ([`EntryHash`], [`ActionHash`], [`AnchorHash`]),
//! author identity ([`AgentId`]), link addressing ([`Linkable`], [`LinkTag`]),
//! time ([`Timestamp`], [`Clock`]) and the application entries
//! ([`Entry`], [`Post`], [`Comment`]).

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod clock;
mod entry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{Comment, Entry, EntryType, Post, UnknownEntryType};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Create an ID by hashing arbitrary data with BLAKE3.
            pub fn from_data(data: &[u8]) -> Self {
                Self(blake3::hash(data).into())
            }

            /// Return the raw 32-byte representation.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

define_id!(
    /// Content-addressed identifier for an entry: `blake3(serialized_entry)`.
    EntryHash
);

define_id!(
    /// Identifier for an action: `blake3` of its content, predecessor included.
    ActionHash
);

define_id!(
    /// Author identity: the bytes of the author's ed25519 verifying key.
    AgentId
);

define_id!(
    /// Well-known path hashed into a link base, e.g. `all_posts`.
    AnchorHash
);

impl AnchorHash {
    /// Hash a path string into an anchor.
    pub fn from_path(path: &str) -> Self {
        Self::from_data(path.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Anything a link can start from or point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Linkable {
    /// A record, addressed by one of its actions.
    Action(ActionHash),
    /// An author.
    Agent(AgentId),
    /// A well-known path.
    Anchor(AnchorHash),
}

impl Linkable {
    /// The action hash, if this address points at an action.
    pub fn as_action(&self) -> Option<ActionHash> {
        match self {
            Self::Action(hash) => Some(*hash),
            _ => None,
        }
    }
}

impl From<ActionHash> for Linkable {
    fn from(hash: ActionHash) -> Self {
        Self::Action(hash)
    }
}

impl From<AgentId> for Linkable {
    fn from(agent: AgentId) -> Self {
        Self::Agent(agent)
    }
}

impl From<AnchorHash> for Linkable {
    fn from(anchor: AnchorHash) -> Self {
        Self::Anchor(anchor)
    }
}

impl fmt::Display for Linkable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(h) => write!(f, "action:{h}"),
            Self::Agent(a) => write!(f, "agent:{a}"),
            Self::Anchor(a) => write!(f, "anchor:{a}"),
        }
    }
}

/// Label distinguishing the kinds of edges hanging off the same base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkTag(String);

impl LinkTag {
    /// Create a tag from any string.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Return the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from milliseconds since the epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Move back by `d`, clamping at the epoch.
    pub fn saturating_sub(self, d: Duration) -> Self {
        Self(self.0.saturating_sub(duration_millis(d)))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, d: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration_millis(d)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
