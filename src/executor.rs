//! The firing executor: one isolated invocation of a user transition.
//!
//! Given a transition and the tokens selected for it, the executor assembles
//! the selector-keyed input, invokes the user function on its own task (so a
//! panic is contained and reported like any other failure), routes the output
//! fields through the transition's output arcs, and hands the outcome back as
//! a plain value. The executor never touches a marking that anyone else can
//! see: the instance applies the consume/produce only after the outcome has
//! been journaled.

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::marking::Marking;
use crate::net::PetriNet;
use crate::transition::{FiringContext, FiringInput, TransitionError};
use crate::types::{JobId, PlaceId, TransitionId};

/// Result of one firing attempt.
#[derive(Debug)]
pub enum FiringOutcome {
    /// The user function returned; output tokens were routed successfully.
    Completed {
        transition: TransitionId,
        job: JobId,
        consumed: Marking,
        produced: Marking,
        event: Value,
    },
    /// The user function failed (error, output routing problem, or panic).
    /// The consumed selection is reported so the failure can be journaled;
    /// the tokens themselves were never removed from the marking.
    Failed {
        transition: TransitionId,
        job: JobId,
        consumed: Marking,
        error: TransitionError,
    },
}

impl FiringOutcome {
    pub fn transition(&self) -> TransitionId {
        match self {
            FiringOutcome::Completed { transition, .. }
            | FiringOutcome::Failed { transition, .. } => *transition,
        }
    }
}

/// Run one firing of `t` over the selected `consumed` tokens.
pub async fn run_firing(
    net: Arc<PetriNet>,
    t: TransitionId,
    consumed: Marking,
    payload: Option<Value>,
    job: JobId,
    attempt: u32,
) -> FiringOutcome {
    let Some(handler) = net.handler(t) else {
        return FiringOutcome::Failed {
            transition: t,
            job,
            consumed,
            error: TransitionError::MissingInput {
                what: "transition handler",
            },
        };
    };

    let input = assemble_input(&net, t, &consumed, payload);
    let ctx = FiringContext {
        transition: t,
        job: job.clone(),
        attempt,
    };

    // The user function runs on its own task so a panic surfaces as a join
    // error instead of tearing down the instance.
    let invocation = tokio::spawn(async move { handler.fire(input, ctx).await });
    let result = match invocation.await {
        Ok(result) => result,
        Err(join_err) => Err(TransitionError::Panicked(panic_message(join_err))),
    };

    let output = match result {
        Ok(output) => output,
        Err(error) => {
            return FiringOutcome::Failed {
                transition: t,
                job,
                consumed,
                error,
            }
        }
    };

    match route_output(&net, t, &output.fields) {
        Ok(produced) => FiringOutcome::Completed {
            transition: t,
            job,
            consumed,
            produced,
            event: output.event,
        },
        Err(error) => FiringOutcome::Failed {
            transition: t,
            job,
            consumed,
            error,
        },
    }
}

/// Pair each input arc's consumed tokens with its field selector. Walks the
/// arcs in the same order as token selection did, so repeated arcs from one
/// place see the same token split.
fn assemble_input(
    net: &PetriNet,
    t: TransitionId,
    consumed: &Marking,
    payload: Option<Value>,
) -> FiringInput {
    let mut taken: FxHashMap<PlaceId, usize> = FxHashMap::default();
    let mut input = FiringInput {
        payload,
        ..Default::default()
    };
    for (place, arc) in net.input_arcs(t) {
        let offset = taken.entry(*place).or_insert(0);
        let tokens = consumed.tokens(*place);
        let end = (*offset + arc.weight as usize).min(tokens.len());
        input
            .fields
            .entry(arc.selector.clone())
            .or_default()
            .extend(tokens[*offset..end].iter().cloned());
        *offset = end;
    }
    input
}

/// Route output fields into places: each output arc drains exactly its weight
/// in tokens from its selector's vector.
fn route_output(
    net: &PetriNet,
    t: TransitionId,
    fields: &FxHashMap<String, Vec<Value>>,
) -> Result<Marking, TransitionError> {
    let mut drained: FxHashMap<&str, usize> = FxHashMap::default();
    let mut produced = Marking::new();
    for (place, arc) in net.output_arcs(t) {
        let tokens = fields
            .get(&arc.selector)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let offset = drained.entry(arc.selector.as_str()).or_insert(0);
        let needed = arc.weight as usize;
        if tokens.len() < *offset + needed {
            return Err(TransitionError::OutputArity {
                selector: arc.selector.clone(),
                needed: u64::from(arc.weight),
                got: tokens.len(),
            });
        }
        produced = produced.with_tokens(*place, tokens[*offset..*offset + needed].to_vec());
        *offset += needed;
    }
    Ok(produced)
}

fn panic_message(join_err: tokio::task::JoinError) -> String {
    if join_err.is_panic() {
        match join_err.into_panic().downcast::<String>() {
            Ok(msg) => *msg,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(msg) => (*msg).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        }
    } else {
        "firing task cancelled".to_string()
    }
}
