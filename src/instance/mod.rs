//! The instance: a running, event-sourced execution of one net.
//!
//! An instance owns the current marking and drives the net forward in time.
//! It is split the way event-sourced state machines want to be split:
//!
//! - [`event`]: the journaled event vocabulary,
//! - [`state`]: the pure fold `(state, event) -> state`,
//! - [`dispatcher`]: in-flight firings, token reservations, retry timers,
//! - [`actor`]: the single-mailbox command loop and its [`InstanceHandle`].

pub mod actor;
pub mod dispatcher;
pub mod event;
pub mod state;

pub use actor::{FireOutcome, InstanceError, InstanceHandle, NetInstance, ProcessState};
pub use event::{FailedEvent, FiredEvent, InstanceEvent};
pub use state::{FailureRecord, InstanceState, StateError};
