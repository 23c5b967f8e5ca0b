//! The pure instance fold: `(state, event) → state`.
//!
//! This module performs no I/O and makes no scheduling decisions. Keeping the
//! fold pure is what makes replay determinism testable: recovering from a
//! journal is exactly [`InstanceState::replay`] over the recorded events.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::event::InstanceEvent;
use crate::marking::{Marking, MarkingError, MarkingLike};
use crate::transition::FailureStrategy;
use crate::types::{JobId, TransitionId};

/// Violations detected while folding events; any of these means the journal
/// does not describe a history this engine could have produced.
#[derive(Debug, Error, Diagnostic)]
pub enum StateError {
    #[error("event sequence gap: expected {expected}, journal holds {got}")]
    #[diagnostic(
        code(tokenweave::instance::sequence_gap),
        help("The journal is corrupt or events were applied out of order.")
    )]
    SequenceGap { expected: u64, got: u64 },

    #[error("initialization event at sequence {sequence} on an already-initialized instance")]
    #[diagnostic(code(tokenweave::instance::reinitialized))]
    Reinitialized { sequence: u64 },

    #[error("fired event consumes tokens the marking does not hold")]
    #[diagnostic(code(tokenweave::instance::marking_underflow))]
    Marking(#[from] MarkingError),
}

/// Failure bookkeeping for one transition, present only while the transition
/// is in a non-terminal failure state (cleared by the next successful firing).
#[derive(Clone, Debug, PartialEq)]
pub struct FailureRecord {
    pub attempt: u32,
    pub error: String,
    pub decision: FailureStrategy,
}

impl FailureRecord {
    /// Blocked or fatally failed: the transition will not fire again without
    /// external intervention.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.decision,
            FailureStrategy::BlockTransition | FailureStrategy::Fatal
        )
    }

    /// Waiting on a retry timer.
    pub fn is_retrying(&self) -> bool {
        matches!(self.decision, FailureStrategy::RetryWithDelay(_))
    }
}

/// The materialized instance state: the fold of all journaled events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceState {
    /// Count of journaled events; strictly increases by 1 per event.
    pub sequence: u64,
    /// Current token assignment.
    pub marking: Marking,
    /// Job ids of every firing in this instance's history.
    pub consumed_jobs: FxHashSet<JobId>,
    /// Per-transition failure records.
    pub failures: FxHashMap<TransitionId, FailureRecord>,
}

impl InstanceState {
    /// Apply one event. Sequence numbers must be gapless.
    pub fn apply(&mut self, event: &InstanceEvent) -> Result<(), StateError> {
        let expected = self.sequence + 1;
        let got = event.sequence();
        if got != expected {
            return Err(StateError::SequenceGap { expected, got });
        }
        match event {
            InstanceEvent::Initialized { marking, .. } => {
                if self.sequence != 0 {
                    return Err(StateError::Reinitialized { sequence: got });
                }
                self.marking = marking.clone();
                self.consumed_jobs.clear();
                self.failures.clear();
            }
            InstanceEvent::TransitionFired(fired) => {
                self.marking = self
                    .marking
                    .consume(&fired.consumed)?
                    .produce(&fired.produced);
                self.consumed_jobs.insert(fired.job.clone());
                self.failures.remove(&fired.transition);
            }
            InstanceEvent::TransitionFailed(failed) => {
                self.failures.insert(
                    failed.transition,
                    FailureRecord {
                        attempt: failed.attempt,
                        error: failed.error.clone(),
                        decision: failed.decision,
                    },
                );
            }
        }
        self.sequence = got;
        Ok(())
    }

    /// Fold a journal into a fresh state.
    pub fn replay<'a>(
        events: impl IntoIterator<Item = &'a InstanceEvent>,
    ) -> Result<Self, StateError> {
        let mut state = InstanceState::default();
        for event in events {
            state.apply(event)?;
        }
        Ok(state)
    }

    /// True once the `Initialized` event has been applied.
    pub fn is_initialized(&self) -> bool {
        self.sequence > 0
    }

    /// The failure record of `t`, if it has one.
    pub fn failure(&self, t: TransitionId) -> Option<&FailureRecord> {
        self.failures.get(&t)
    }
}
