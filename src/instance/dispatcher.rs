//! Scheduler bookkeeping: in-flight firings, token reservations, retry timers.
//!
//! The dispatcher enforces two rules the actor leans on:
//!
//! - at most one in-flight firing per transition (the firing's reply channel
//!   and task handle live here until the completion event is journaled), and
//! - tokens selected for an in-flight firing are *reserved*: the marking is
//!   untouched until the event lands, but new launches only see the marking
//!   minus all live reservations, so concurrent firings of transitions that
//!   share input places are never handed the same tokens.
//!
//! Retry timers are plain sleep tasks that post a tick back into the actor's
//! mailbox; the actor re-checks enablement when the tick arrives and discards
//! stale timers.

use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::actor::{FireOutcome, InstanceError, Msg};
use crate::marking::{Marking, MarkingLike};
use crate::types::{JobId, TransitionId};

pub(crate) type FireReply = oneshot::Sender<Result<FireOutcome, InstanceError>>;

pub(crate) struct InFlightFiring {
    pub job: JobId,
    pub attempt: u32,
    pub reserved: Marking,
    pub reply: Option<FireReply>,
    pub task: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct Dispatcher {
    in_flight: FxHashMap<TransitionId, InFlightFiring>,
    retry_timers: FxHashMap<TransitionId, JoinHandle<()>>,
}

impl Dispatcher {
    pub(crate) fn is_in_flight(&self, t: TransitionId) -> bool {
        self.in_flight.contains_key(&t)
    }

    /// The marking new launches may select from: the current marking minus
    /// every live reservation.
    pub(crate) fn available(&self, marking: &Marking) -> Marking {
        let mut available = marking.clone();
        for firing in self.in_flight.values() {
            match available.consume(&firing.reserved) {
                Ok(rest) => available = rest,
                // Reservations are always selected from the available marking,
                // so this arm is unreachable unless bookkeeping broke.
                Err(err) => debug!(error = %err, "reservation not covered by marking"),
            }
        }
        available
    }

    /// Record a launched firing and reserve its tokens.
    pub(crate) fn begin(
        &mut self,
        t: TransitionId,
        job: JobId,
        attempt: u32,
        reserved: Marking,
        reply: Option<FireReply>,
        task: JoinHandle<()>,
    ) {
        self.in_flight.insert(
            t,
            InFlightFiring {
                job,
                attempt,
                reserved,
                reply,
                task,
            },
        );
    }

    /// Remove the in-flight record (and its reservation) for `t`.
    pub(crate) fn finish(&mut self, t: TransitionId) -> Option<InFlightFiring> {
        self.in_flight.remove(&t)
    }

    /// Arm a retry timer for `t`, replacing any pending one.
    pub(crate) fn schedule_retry(
        &mut self,
        t: TransitionId,
        delay_ms: u64,
        tx: mpsc::WeakSender<Msg>,
    ) {
        self.cancel_retry(t);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Msg::RetryDue { transition: t }).await;
            }
        });
        self.retry_timers.insert(t, handle);
    }

    /// Drop the pending retry timer for `t`, aborting it if still sleeping.
    pub(crate) fn cancel_retry(&mut self, t: TransitionId) {
        if let Some(handle) = self.retry_timers.remove(&t) {
            handle.abort();
        }
    }

    /// Forget the timer bookkeeping after its tick arrived.
    pub(crate) fn clear_retry(&mut self, t: TransitionId) {
        self.retry_timers.remove(&t);
    }

    /// Abandon everything: in-flight firings and pending timers. Their events
    /// will never be journaled.
    pub(crate) fn abort_all(&mut self) {
        for (_, firing) in self.in_flight.drain() {
            firing.task.abort();
            if let Some(reply) = firing.reply {
                let _ = reply.send(Err(InstanceError::Stopped));
            }
        }
        for (_, handle) in self.retry_timers.drain() {
            handle.abort();
        }
    }
}
