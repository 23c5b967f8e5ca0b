//! The journaled event vocabulary, the sole source of truth for recovery.
//!
//! Every event carries the sequence number the instance holds *after* the
//! event is applied; the `Initialized` event carries 1, and the sequence of
//! any later event is its position in the journal.

use serde_json::Value;

use crate::marking::Marking;
use crate::transition::FailureStrategy;
use crate::types::{JobId, TransitionId};

/// A successful firing: tokens consumed and produced, plus the domain event
/// the user function emitted.
#[derive(Clone, Debug, PartialEq)]
pub struct FiredEvent {
    pub sequence: u64,
    pub transition: TransitionId,
    pub job: JobId,
    pub consumed: Marking,
    pub produced: Marking,
    pub event: Value,
}

/// A failed firing: the error message and the strategy decision that governs
/// future firings of the transition.
#[derive(Clone, Debug, PartialEq)]
pub struct FailedEvent {
    pub sequence: u64,
    pub transition: TransitionId,
    pub job: JobId,
    pub consumed: Marking,
    pub error: String,
    pub decision: FailureStrategy,
    pub attempt: u32,
}

/// Everything the journal ever records about an instance.
#[derive(Clone, Debug, PartialEq)]
pub enum InstanceEvent {
    Initialized {
        sequence: u64,
        marking: Marking,
        initial_state: Value,
    },
    TransitionFired(FiredEvent),
    TransitionFailed(FailedEvent),
}

impl InstanceEvent {
    /// The instance sequence number after applying this event.
    pub fn sequence(&self) -> u64 {
        match self {
            InstanceEvent::Initialized { sequence, .. } => *sequence,
            InstanceEvent::TransitionFired(fired) => fired.sequence,
            InstanceEvent::TransitionFailed(failed) => failed.sequence,
        }
    }
}
