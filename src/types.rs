//! Core identity types for the tokenweave engine.
//!
//! This module defines the stable identifiers used throughout the system:
//! places and transitions in a net topology, running instances, and individual
//! firings. Identities are deliberately small value types: the net owns the
//! full node data, everything else refers to nodes by id.
//!
//! # Examples
//!
//! ```rust
//! use tokenweave::types::{PlaceId, TransitionId, NodeRef};
//!
//! let p = PlaceId(1);
//! let t = TransitionId(1);
//! assert_eq!(p.to_string(), "p1");
//! assert_eq!(t.to_string(), "t1");
//! assert_ne!(NodeRef::Place(p), NodeRef::Transition(t));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a place in a net. Two places are equal iff their ids match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlaceId(pub u32);

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl From<u32> for PlaceId {
    fn from(id: u32) -> Self {
        PlaceId(id)
    }
}

/// Identity of a transition in a net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub u32);

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl From<u32> for TransitionId {
    fn from(id: u32) -> Self {
        TransitionId(id)
    }
}

/// Either endpoint of an arc, for mixed topology queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Place(PlaceId),
    Transition(TransitionId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Place(p) => write!(f, "{p}"),
            NodeRef::Transition(t) => write!(f, "{t}"),
        }
    }
}

impl From<PlaceId> for NodeRef {
    fn from(p: PlaceId) -> Self {
        NodeRef::Place(p)
    }
}

impl From<TransitionId> for NodeRef {
    fn from(t: TransitionId) -> Self {
        NodeRef::Transition(t)
    }
}

/// Identity of a net instance. The journal is single-writer per instance id,
/// so restarting with the same id resumes the same event history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a fresh random instance id.
    #[must_use]
    pub fn generate() -> Self {
        InstanceId(format!("instance-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        InstanceId(s.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        InstanceId(s)
    }
}

/// Unique identifier of a single firing.
///
/// One job id is minted per firing attempt that reaches the executor and is
/// surfaced to user code through the journal, so event-sourced user state can
/// be rebuilt idempotently.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Mint a fresh UUID-backed job id.
    #[must_use]
    pub fn new() -> Self {
        JobId(format!("job-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}
