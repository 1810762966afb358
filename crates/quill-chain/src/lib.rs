//! Append-only, hash-chained, per-author action logs.
//!
//! Every state change is an [`Action`] appended to its author's chain. Each
//! action references its predecessor by hash, so altering any ancestor
//! invalidates every descendant. Nothing is ever erased: updates supersede,
//! deletes shadow, and both are themselves new actions.
//!
//! Admission goes through the [`ActionLog`], which checks chain continuity,
//! runs the [`ValidationPipeline`] and then records the action together with
//! its entry. Reads are served by the [`RevisionResolver`] (update chains and
//! tombstones) and the [`LinkIndex`] (tagged edges with query-time liveness).

mod action;
mod error;
mod identity;
mod links;
mod log;
mod revisions;
mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use action::{Action, ActionKind, Record, SignedAction};
pub use error::{ChainError, Rule, ValidationError};
pub use identity::{AgentKey, Identity, verify_signature};
pub use links::{DeletedLink, Link, LinkIndex};
pub use log::{ActionLog, ChainHead};
pub use revisions::{ChainView, RevisionIndex, RevisionResolver};
pub use store::ChainStore;
pub use validation::{LinkEndpoint, LinkSchema, ValidationConfig, ValidationPipeline};
