/*!
Serde-friendly persisted shapes for journal backends.

Design goals:
- Keep explicit persisted structs decoupled from the in-memory
  representations, so the storage schema can stay stable while internals
  evolve.
- Keep conversion logic localized (`From` impls in both directions) so
  backend code stays lean and declarative.
- Deterministic encoding: markings serialize as place-sorted lists, sets as
  sorted lists, so equal states produce equal bytes.

This module intentionally performs NO I/O; it is pure data transformation.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::instance::{FailedEvent, FailureRecord, FiredEvent, InstanceEvent, InstanceState};
use crate::marking::Marking;
use crate::transition::FailureStrategy;
use crate::types::{JobId, PlaceId, TransitionId};

/// One place's resident tokens.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistedPlaceTokens {
    pub place: u32,
    pub tokens: Vec<Value>,
}

/// A marking as a place-sorted list of token sequences.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedMarking {
    pub places: Vec<PersistedPlaceTokens>,
}

impl From<&Marking> for PersistedMarking {
    fn from(marking: &Marking) -> Self {
        let mut places: Vec<PersistedPlaceTokens> = marking
            .iter()
            .map(|(place, tokens)| PersistedPlaceTokens {
                place: place.0,
                tokens: tokens.to_vec(),
            })
            .collect();
        places.sort_by_key(|entry| entry.place);
        PersistedMarking { places }
    }
}

impl From<PersistedMarking> for Marking {
    fn from(persisted: PersistedMarking) -> Self {
        persisted
            .places
            .into_iter()
            .map(|entry| (PlaceId(entry.place), entry.tokens))
            .collect()
    }
}

/// An exception-strategy decision in its stored form.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PersistedDecision {
    Block,
    Retry { delay_ms: u64 },
    Fatal,
}

impl From<FailureStrategy> for PersistedDecision {
    fn from(strategy: FailureStrategy) -> Self {
        match strategy {
            FailureStrategy::BlockTransition => PersistedDecision::Block,
            FailureStrategy::RetryWithDelay(delay_ms) => PersistedDecision::Retry { delay_ms },
            FailureStrategy::Fatal => PersistedDecision::Fatal,
        }
    }
}

impl From<PersistedDecision> for FailureStrategy {
    fn from(decision: PersistedDecision) -> Self {
        match decision {
            PersistedDecision::Block => FailureStrategy::BlockTransition,
            PersistedDecision::Retry { delay_ms } => FailureStrategy::RetryWithDelay(delay_ms),
            PersistedDecision::Fatal => FailureStrategy::Fatal,
        }
    }
}

/// A journaled event in its stored form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistedEvent {
    Initialized {
        sequence: u64,
        marking: PersistedMarking,
        initial_state: Value,
    },
    TransitionFired {
        sequence: u64,
        transition: u32,
        job: String,
        consumed: PersistedMarking,
        produced: PersistedMarking,
        event: Value,
    },
    TransitionFailed {
        sequence: u64,
        transition: u32,
        job: String,
        consumed: PersistedMarking,
        error: String,
        decision: PersistedDecision,
        attempt: u32,
    },
}

impl PersistedEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            PersistedEvent::Initialized { sequence, .. }
            | PersistedEvent::TransitionFired { sequence, .. }
            | PersistedEvent::TransitionFailed { sequence, .. } => *sequence,
        }
    }
}

impl From<&InstanceEvent> for PersistedEvent {
    fn from(event: &InstanceEvent) -> Self {
        match event {
            InstanceEvent::Initialized {
                sequence,
                marking,
                initial_state,
            } => PersistedEvent::Initialized {
                sequence: *sequence,
                marking: marking.into(),
                initial_state: initial_state.clone(),
            },
            InstanceEvent::TransitionFired(fired) => PersistedEvent::TransitionFired {
                sequence: fired.sequence,
                transition: fired.transition.0,
                job: fired.job.0.clone(),
                consumed: (&fired.consumed).into(),
                produced: (&fired.produced).into(),
                event: fired.event.clone(),
            },
            InstanceEvent::TransitionFailed(failed) => PersistedEvent::TransitionFailed {
                sequence: failed.sequence,
                transition: failed.transition.0,
                job: failed.job.0.clone(),
                consumed: (&failed.consumed).into(),
                error: failed.error.clone(),
                decision: failed.decision.into(),
                attempt: failed.attempt,
            },
        }
    }
}

impl From<PersistedEvent> for InstanceEvent {
    fn from(persisted: PersistedEvent) -> Self {
        match persisted {
            PersistedEvent::Initialized {
                sequence,
                marking,
                initial_state,
            } => InstanceEvent::Initialized {
                sequence,
                marking: marking.into(),
                initial_state,
            },
            PersistedEvent::TransitionFired {
                sequence,
                transition,
                job,
                consumed,
                produced,
                event,
            } => InstanceEvent::TransitionFired(FiredEvent {
                sequence,
                transition: TransitionId(transition),
                job: JobId(job),
                consumed: consumed.into(),
                produced: produced.into(),
                event,
            }),
            PersistedEvent::TransitionFailed {
                sequence,
                transition,
                job,
                consumed,
                error,
                decision,
                attempt,
            } => InstanceEvent::TransitionFailed(FailedEvent {
                sequence,
                transition: TransitionId(transition),
                job: JobId(job),
                consumed: consumed.into(),
                error,
                decision: decision.into(),
                attempt,
            }),
        }
    }
}

/// One transition's failure record in its stored form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistedFailure {
    pub transition: u32,
    pub attempt: u32,
    pub error: String,
    pub decision: PersistedDecision,
}

/// A full instance-state snapshot in its stored form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistedInstanceState {
    pub sequence: u64,
    pub marking: PersistedMarking,
    pub consumed_jobs: Vec<String>,
    pub failures: Vec<PersistedFailure>,
}

impl From<&InstanceState> for PersistedInstanceState {
    fn from(state: &InstanceState) -> Self {
        let mut consumed_jobs: Vec<String> =
            state.consumed_jobs.iter().map(|job| job.0.clone()).collect();
        consumed_jobs.sort();
        let mut failures: Vec<PersistedFailure> = state
            .failures
            .iter()
            .map(|(transition, record)| PersistedFailure {
                transition: transition.0,
                attempt: record.attempt,
                error: record.error.clone(),
                decision: record.decision.into(),
            })
            .collect();
        failures.sort_by_key(|failure| failure.transition);
        PersistedInstanceState {
            sequence: state.sequence,
            marking: (&state.marking).into(),
            consumed_jobs,
            failures,
        }
    }
}

impl From<PersistedInstanceState> for InstanceState {
    fn from(persisted: PersistedInstanceState) -> Self {
        InstanceState {
            sequence: persisted.sequence,
            marking: persisted.marking.into(),
            consumed_jobs: persisted
                .consumed_jobs
                .into_iter()
                .map(JobId)
                .collect(),
            failures: persisted
                .failures
                .into_iter()
                .map(|failure| {
                    (
                        TransitionId(failure.transition),
                        FailureRecord {
                            attempt: failure.attempt,
                            error: failure.error,
                            decision: failure.decision.into(),
                        },
                    )
                })
                .collect(),
        }
    }
}
