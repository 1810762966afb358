//! Application entries: the immutable payloads that actions point at.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ActionHash, AgentId, EntryHash};

/// Kind of an [`Entry`], recorded on every entry-creating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// A blog post.
    Post,
    /// A comment on a post.
    Comment,
}

impl EntryType {
    /// Lowercase name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown entry type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entry type: {0}")]
pub struct UnknownEntryType(pub String);

impl FromStr for EntryType {
    type Err = UnknownEntryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            other => Err(UnknownEntryType(other.to_string())),
        }
    }
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Title.
    pub name: String,
    /// Body text.
    pub content: String,
    /// Author claimed by the post itself.
    pub author: AgentId,
}

/// A comment attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment text.
    pub content: String,
    /// Create action of the post being commented on.
    pub post_hash: ActionHash,
    /// Author claimed by the comment itself.
    pub author: AgentId,
}

/// An immutable payload, identified by the hash of its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    Post(Post),
    Comment(Comment),
}

impl Entry {
    /// The kind of this entry.
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Post(_) => EntryType::Post,
            Self::Comment(_) => EntryType::Comment,
        }
    }

    /// The text field subject to length limits.
    pub fn content(&self) -> &str {
        match self {
            Self::Post(p) => &p.content,
            Self::Comment(c) => &c.content,
        }
    }

    /// The author named inside the payload.
    pub fn author(&self) -> AgentId {
        match self {
            Self::Post(p) => p.author,
            Self::Comment(c) => c.author,
        }
    }

    /// Records this entry points at, with the type each must have.
    pub fn references(&self) -> Vec<(ActionHash, EntryType)> {
        match self {
            Self::Post(_) => Vec::new(),
            Self::Comment(c) => vec![(c.post_hash, EntryType::Post)],
        }
    }

    /// Canonical postcard encoding.
    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Decode an entry from its canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Content hash of the canonical encoding.
    pub fn hash(&self) -> Result<EntryHash, postcard::Error> {
        Ok(EntryHash::from_data(&self.encode()?))
    }
}

impl From<Post> for Entry {
    fn from(post: Post) -> Self {
        Self::Post(post)
    }
}

impl From<Comment> for Entry {
    fn from(comment: Comment) -> Self {
        Self::Comment(comment)
    }
}
