//! The instance actor: a single-mailbox state machine over one net.
//!
//! All commands, firing completions, and retry ticks are serialized through
//! one `tokio::sync::mpsc` mailbox, so state transitions are totally ordered
//! and no lock is ever held. User functions run on spawned worker tasks and
//! re-enter the mailbox as [`Msg::FiringDone`]. Every event is appended to
//! the journal *before* its effect becomes observable: before the state is
//! updated, before the requester gets a reply, and before follow-up firings
//! are scheduled.
//!
//! # Lifecycle
//!
//! [`NetInstance::spawn`] replays the journal (snapshot first, if the backend
//! keeps one), folds the events into an [`InstanceState`], starts the mailbox
//! loop, and (when the replayed history is initialized) runs one automatic
//! dispatch sweep. In-flight firings from a previous life are not resumed;
//! whatever is still enabled is simply re-launched.
//!
//! A journal failure stops the actor: pending requesters get an error reply
//! and the mailbox closes. Restarting with the same instance id replays the
//! journal up to the last durable event.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashSet;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, instrument, warn};

use super::dispatcher::{Dispatcher, FireReply};
use super::event::{FailedEvent, FiredEvent, InstanceEvent};
use super::state::{InstanceState, StateError};
use crate::executor::{run_firing, FiringOutcome};
use crate::journal::{Journal, JournalError};
use crate::marking::Marking;
use crate::net::PetriNet;
use crate::token_game::select_parameters;
use crate::transition::FailureStrategy;
use crate::types::{InstanceId, JobId, TransitionId};

const MAILBOX_CAPACITY: usize = 256;

/// Errors the command surface can return.
#[derive(Debug, Error, Diagnostic)]
pub enum InstanceError {
    #[error("instance is already initialized")]
    #[diagnostic(code(tokenweave::instance::already_initialized))]
    AlreadyInitialized,

    #[error("instance is not initialized")]
    #[diagnostic(
        code(tokenweave::instance::not_initialized),
        help("Send Initialize before firing transitions or reading state.")
    )]
    NotInitialized,

    #[error("net has no transition {0}")]
    #[diagnostic(code(tokenweave::instance::unknown_transition))]
    UnknownTransition(TransitionId),

    #[error(transparent)]
    #[diagnostic(code(tokenweave::instance::journal))]
    Journal(#[from] JournalError),

    #[error(transparent)]
    #[diagnostic(code(tokenweave::instance::state))]
    State(#[from] StateError),

    #[error("instance has stopped")]
    #[diagnostic(
        code(tokenweave::instance::stopped),
        help("The actor exited (shutdown or journal failure). Spawn it again to recover.")
    )]
    Stopped,
}

/// Reply to a fire request. `NotEnabled` is a normal reply, not an error:
/// nothing was journaled and the state did not change.
#[derive(Clone, Debug)]
pub enum FireOutcome {
    Fired(FiredEvent),
    Failed(FailedEvent),
    NotEnabled {
        transition: TransitionId,
        reason: String,
    },
}

/// Snapshot of the externally visible instance state.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessState {
    pub sequence: u64,
    pub marking: Marking,
    pub consumed_jobs: FxHashSet<JobId>,
}

pub(crate) enum Msg {
    Initialize {
        marking: Marking,
        initial_state: Value,
        reply: oneshot::Sender<Result<(), InstanceError>>,
    },
    Fire {
        transition: TransitionId,
        payload: Option<Value>,
        reply: FireReply,
    },
    GetState {
        reply: oneshot::Sender<Result<ProcessState, InstanceError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Result<(), InstanceError>>,
    },
    FiringDone {
        outcome: FiringOutcome,
        attempt: u32,
    },
    RetryDue {
        transition: TransitionId,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running instance. Cheap to clone; all clones talk to the same
/// mailbox. The actor keeps running while any handle, in-flight firing, or
/// pending retry timer is alive.
#[derive(Clone)]
pub struct InstanceHandle {
    tx: mpsc::Sender<Msg>,
    instance_id: InstanceId,
}

impl InstanceHandle {
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Move the instance from Uninitialized to Running with the given marking
    /// and opaque initial user state. Valid exactly once per journal history.
    #[instrument(skip(self, marking, initial_state), fields(instance = %self.instance_id), err)]
    pub async fn initialize(
        &self,
        marking: Marking,
        initial_state: Value,
    ) -> Result<(), InstanceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Msg::Initialize {
                marking,
                initial_state,
                reply: reply_tx,
            })
            .await
            .map_err(|_| InstanceError::Stopped)?;
        reply_rx.await.map_err(|_| InstanceError::Stopped)?
    }

    /// Request one firing of `transition`. Resolves after the resulting event
    /// has been journaled (or immediately with `NotEnabled`).
    #[instrument(skip(self, payload), fields(instance = %self.instance_id), err)]
    pub async fn fire(
        &self,
        transition: TransitionId,
        payload: Option<Value>,
    ) -> Result<FireOutcome, InstanceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Msg::Fire {
                transition,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| InstanceError::Stopped)?;
        reply_rx.await.map_err(|_| InstanceError::Stopped)?
    }

    /// Read the externally visible state.
    pub async fn get_state(&self) -> Result<ProcessState, InstanceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Msg::GetState { reply: reply_tx })
            .await
            .map_err(|_| InstanceError::Stopped)?;
        reply_rx.await.map_err(|_| InstanceError::Stopped)?
    }

    /// Ask the journal to snapshot the current state (a no-op for backends
    /// without snapshot support).
    pub async fn snapshot(&self) -> Result<(), InstanceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Msg::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| InstanceError::Stopped)?;
        reply_rx.await.map_err(|_| InstanceError::Stopped)?
    }

    /// Stop the actor. In-flight firings are abandoned and their events are
    /// never journaled; pending retry timers are discarded.
    pub async fn shutdown(self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Msg::Shutdown { reply: reply_tx }).await.is_ok() {
            let _ = reply_rx.await;
        }
    }
}

/// Factory for running instances.
pub struct NetInstance;

impl NetInstance {
    /// Recover (or freshly start) the instance `instance_id` over `net`,
    /// backed by `journal`, and return a handle to it.
    #[instrument(skip(net, journal), err)]
    pub async fn spawn(
        net: Arc<PetriNet>,
        instance_id: InstanceId,
        journal: Arc<dyn Journal>,
    ) -> Result<InstanceHandle, InstanceError> {
        let mut state = journal
            .load_snapshot(&instance_id)
            .await?
            .unwrap_or_default();
        let tail = journal.replay(&instance_id, state.sequence + 1).await?;
        for event in &tail {
            state.apply(event)?;
        }
        debug!(
            instance = %instance_id,
            sequence = state.sequence,
            replayed = tail.len(),
            "instance state recovered"
        );

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let core = Core {
            net,
            instance_id: instance_id.clone(),
            journal,
            state,
            dispatcher: Dispatcher::default(),
            tx: tx.downgrade(),
        };
        tokio::spawn(core.run(rx));
        Ok(InstanceHandle { tx, instance_id })
    }

    /// [`spawn`](Self::spawn) with the journal and instance id taken from a
    /// [`RuntimeConfig`](crate::runtime_config::RuntimeConfig).
    pub async fn spawn_with_config(
        net: Arc<PetriNet>,
        config: crate::runtime_config::RuntimeConfig,
    ) -> Result<InstanceHandle, InstanceError> {
        let journal = config.build_journal().await?;
        let instance_id = config
            .instance_id
            .clone()
            .map(InstanceId)
            .unwrap_or_else(InstanceId::generate);
        Self::spawn(net, instance_id, journal).await
    }
}

struct Core {
    net: Arc<PetriNet>,
    instance_id: InstanceId,
    journal: Arc<dyn Journal>,
    state: InstanceState,
    dispatcher: Dispatcher,
    // Weak so the actor does not keep itself alive; firing and timer tasks
    // upgrade it for the duration of their send.
    tx: mpsc::WeakSender<Msg>,
}

impl Core {
    async fn run(mut self, mut rx: mpsc::Receiver<Msg>) {
        // Recovery completion counts as a state change: re-arm retry timers
        // from replayed failure records, then sweep once.
        if self.state.is_initialized() {
            self.rearm_retries();
            self.dispatch_automatic();
        }
        while let Some(msg) = rx.recv().await {
            let keep_going = match msg {
                Msg::Initialize {
                    marking,
                    initial_state,
                    reply,
                } => self.handle_initialize(marking, initial_state, reply).await,
                Msg::Fire {
                    transition,
                    payload,
                    reply,
                } => self.handle_fire(transition, payload, reply),
                Msg::GetState { reply } => {
                    let _ = reply.send(self.process_state());
                    true
                }
                Msg::Snapshot { reply } => {
                    let result = if self.state.is_initialized() {
                        self.journal
                            .save_snapshot(&self.instance_id, &self.state)
                            .await
                            .map_err(InstanceError::Journal)
                    } else {
                        Err(InstanceError::NotInitialized)
                    };
                    let _ = reply.send(result);
                    true
                }
                Msg::FiringDone { outcome, attempt } => {
                    self.handle_firing_done(outcome, attempt).await
                }
                Msg::RetryDue { transition } => self.handle_retry_due(transition),
                Msg::Shutdown { reply } => {
                    self.dispatcher.abort_all();
                    let _ = reply.send(());
                    false
                }
            };
            if !keep_going {
                break;
            }
        }
        self.dispatcher.abort_all();
        debug!(instance = %self.instance_id, "instance actor stopped");
    }

    fn process_state(&self) -> Result<ProcessState, InstanceError> {
        if !self.state.is_initialized() {
            return Err(InstanceError::NotInitialized);
        }
        Ok(ProcessState {
            sequence: self.state.sequence,
            marking: self.state.marking.clone(),
            consumed_jobs: self.state.consumed_jobs.clone(),
        })
    }

    async fn handle_initialize(
        &mut self,
        marking: Marking,
        initial_state: Value,
        reply: oneshot::Sender<Result<(), InstanceError>>,
    ) -> bool {
        if self.state.is_initialized() {
            let _ = reply.send(Err(InstanceError::AlreadyInitialized));
            return true;
        }
        let event = InstanceEvent::Initialized {
            sequence: self.state.sequence + 1,
            marking,
            initial_state,
        };
        match self.commit(&event).await {
            Ok(()) => {
                let _ = reply.send(Ok(()));
                self.dispatch_automatic();
                true
            }
            Err(err) => {
                let _ = reply.send(Err(err));
                false
            }
        }
    }

    fn handle_fire(
        &mut self,
        transition: TransitionId,
        payload: Option<Value>,
        reply: FireReply,
    ) -> bool {
        if !self.state.is_initialized() {
            let _ = reply.send(Err(InstanceError::NotInitialized));
            return true;
        }
        if self.net.transition(transition).is_none() {
            let _ = reply.send(Err(InstanceError::UnknownTransition(transition)));
            return true;
        }
        if self
            .state
            .failure(transition)
            .is_some_and(|record| record.is_terminal())
        {
            let _ = reply.send(Ok(FireOutcome::NotEnabled {
                transition,
                reason: "has failed previously".to_string(),
            }));
            return true;
        }
        if self.dispatcher.is_in_flight(transition) {
            let _ = reply.send(Ok(FireOutcome::NotEnabled {
                transition,
                reason: "firing already in flight".to_string(),
            }));
            return true;
        }
        let available = self.dispatcher.available(&self.state.marking);
        let Some(selection) = select_parameters(&self.net, &available, transition) else {
            let _ = reply.send(Ok(FireOutcome::NotEnabled {
                transition,
                reason: "not enough tokens".to_string(),
            }));
            return true;
        };
        // A manual fire of a retrying transition continues its attempt count
        // and supersedes the pending timer.
        let attempt = self
            .state
            .failure(transition)
            .map(|record| record.attempt + 1)
            .unwrap_or(1);
        self.dispatcher.cancel_retry(transition);
        self.launch(transition, selection, payload, Some(reply), attempt);
        true
    }

    async fn handle_firing_done(&mut self, outcome: FiringOutcome, attempt: u32) -> bool {
        match outcome {
            FiringOutcome::Completed {
                transition,
                job,
                consumed,
                produced,
                event,
            } => {
                let fired = FiredEvent {
                    sequence: self.state.sequence + 1,
                    transition,
                    job,
                    consumed,
                    produced,
                    event,
                };
                let event = InstanceEvent::TransitionFired(fired.clone());
                let committed = self.commit(&event).await;
                let firing = self.dispatcher.finish(transition);
                match committed {
                    Ok(()) => {
                        if let Some(reply) = firing.and_then(|f| f.reply) {
                            let _ = reply.send(Ok(FireOutcome::Fired(fired)));
                        }
                        self.dispatch_automatic();
                        true
                    }
                    Err(err) => {
                        if let Some(reply) = firing.and_then(|f| f.reply) {
                            let _ = reply.send(Err(err));
                        }
                        false
                    }
                }
            }
            FiringOutcome::Failed {
                transition,
                job,
                consumed,
                error,
            } => {
                let decision = self
                    .net
                    .handler(transition)
                    .map(|handler| handler.on_exception(&error, attempt))
                    .unwrap_or(FailureStrategy::Fatal);
                let failed = FailedEvent {
                    sequence: self.state.sequence + 1,
                    transition,
                    job,
                    consumed,
                    error: error.to_string(),
                    decision,
                    attempt,
                };
                let event = InstanceEvent::TransitionFailed(failed.clone());
                let committed = self.commit(&event).await;
                let firing = self.dispatcher.finish(transition);
                match committed {
                    Ok(()) => {
                        if let Some(reply) = firing.and_then(|f| f.reply) {
                            let _ = reply.send(Ok(FireOutcome::Failed(failed)));
                        }
                        if let FailureStrategy::RetryWithDelay(delay_ms) = decision {
                            self.dispatcher
                                .schedule_retry(transition, delay_ms, self.tx.clone());
                        }
                        self.dispatch_automatic();
                        true
                    }
                    Err(err) => {
                        if let Some(reply) = firing.and_then(|f| f.reply) {
                            let _ = reply.send(Err(err));
                        }
                        false
                    }
                }
            }
        }
    }

    fn handle_retry_due(&mut self, transition: TransitionId) -> bool {
        self.dispatcher.clear_retry(transition);
        let Some(record) = self.state.failure(transition) else {
            return true;
        };
        if !record.is_retrying() || self.dispatcher.is_in_flight(transition) {
            return true;
        }
        let attempt = record.attempt + 1;
        let available = self.dispatcher.available(&self.state.marking);
        match select_parameters(&self.net, &available, transition) {
            Some(selection) => {
                self.launch(transition, selection, None, None, attempt);
            }
            None => {
                // No longer enabled: the timer is discarded, the failure
                // record stays.
                debug!(
                    instance = %self.instance_id,
                    transition = %transition,
                    "retry discarded, transition no longer enabled"
                );
            }
        }
        true
    }

    /// Journal `event` and fold it into the state. Nothing about the event is
    /// observable unless this returns `Ok`.
    async fn commit(&mut self, event: &InstanceEvent) -> Result<(), InstanceError> {
        if let Err(err) = self
            .journal
            .append(&self.instance_id, std::slice::from_ref(event))
            .await
        {
            error!(instance = %self.instance_id, error = %err, "journal append failed, stopping");
            return Err(InstanceError::Journal(err));
        }
        if let Err(err) = self.state.apply(event) {
            error!(instance = %self.instance_id, error = %err, "journaled event failed to apply");
            return Err(InstanceError::State(err));
        }
        Ok(())
    }

    /// Re-arm timers for transitions whose replayed failure record is still
    /// retrying. The tick handler re-checks enablement, so timers for
    /// transitions that are no longer enabled get discarded there.
    fn rearm_retries(&mut self) {
        let retrying: Vec<(TransitionId, u64)> = self
            .state
            .failures
            .iter()
            .filter_map(|(transition, record)| match record.decision {
                FailureStrategy::RetryWithDelay(delay_ms) => Some((*transition, delay_ms)),
                _ => None,
            })
            .collect();
        for (transition, delay_ms) in retrying {
            self.dispatcher
                .schedule_retry(transition, delay_ms, self.tx.clone());
        }
    }

    /// Launch every automatic transition that is enabled against the
    /// reservation-adjusted marking, carries no failure record, and is not
    /// already in flight. Transitions with a retrying record are owned by
    /// their timer and skipped here.
    fn dispatch_automatic(&mut self) {
        let mut candidates: Vec<TransitionId> = self.net.transition_ids().collect();
        candidates.sort_unstable();
        for transition in candidates {
            let Some(def) = self.net.transition(transition) else {
                continue;
            };
            if !def.automated
                || self.state.failure(transition).is_some()
                || self.dispatcher.is_in_flight(transition)
            {
                continue;
            }
            // Recomputed per launch so reservations from this sweep are seen.
            let available = self.dispatcher.available(&self.state.marking);
            if let Some(selection) = select_parameters(&self.net, &available, transition) {
                self.launch(transition, selection, None, None, 1);
            }
        }
    }

    fn launch(
        &mut self,
        transition: TransitionId,
        selection: Marking,
        payload: Option<Value>,
        reply: Option<FireReply>,
        attempt: u32,
    ) {
        let Some(tx) = self.tx.upgrade() else {
            warn!(instance = %self.instance_id, "mailbox gone, firing not launched");
            return;
        };
        let job = JobId::new();
        let net = Arc::clone(&self.net);
        let consumed = selection.clone();
        let task_job = job.clone();
        let task = tokio::spawn(async move {
            let outcome = run_firing(net, transition, consumed, payload, task_job, attempt).await;
            let _ = tx.send(Msg::FiringDone { outcome, attempt }).await;
        });
        debug!(
            instance = %self.instance_id,
            transition = %transition,
            job = %job,
            attempt,
            "firing launched"
        );
        self.dispatcher
            .begin(transition, job, attempt, selection, reply, task);
    }
}
