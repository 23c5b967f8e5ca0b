use std::sync::Arc;

use serde_json::json;
use tokenweave::instance::{FireOutcome, InstanceError, NetInstance};
use tokenweave::journal::InMemoryJournal;
use tokenweave::marking::Marking;
use tokenweave::transition::FailureStrategy;
use tokenweave::types::{InstanceId, PlaceId, TransitionId};

mod common;
use common::*;

#[tokio::test]
async fn initialize_exactly_once() {
    let journal = Arc::new(InMemoryJournal::new());
    let handle = NetInstance::spawn(chain_net(false), InstanceId::from("init-once"), journal)
        .await
        .unwrap();

    handle
        .initialize(unit_marking(1), json!({}))
        .await
        .unwrap();
    let err = handle
        .initialize(unit_marking(1), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, InstanceError::AlreadyInitialized));
}

#[tokio::test]
async fn commands_before_initialize_are_rejected() {
    let journal = Arc::new(InMemoryJournal::new());
    let handle = NetInstance::spawn(chain_net(false), InstanceId::from("uninit"), journal)
        .await
        .unwrap();

    assert!(matches!(
        handle.get_state().await.unwrap_err(),
        InstanceError::NotInitialized
    ));
    assert!(matches!(
        handle.fire(TransitionId(1), None).await.unwrap_err(),
        InstanceError::NotInitialized
    ));
}

#[tokio::test]
async fn manual_fire_moves_tokens_and_records_job() {
    let journal = Arc::new(InMemoryJournal::new());
    let handle = NetInstance::spawn(chain_net(false), InstanceId::from("manual"), journal)
        .await
        .unwrap();
    handle
        .initialize(unit_marking(1), json!({}))
        .await
        .unwrap();

    let outcome = handle.fire(TransitionId(1), None).await.unwrap();
    let fired = match outcome {
        FireOutcome::Fired(fired) => fired,
        other => panic!("expected fired outcome, got {other:?}"),
    };
    assert_eq!(fired.sequence, 2);
    assert_eq!(fired.consumed.tokens(PlaceId(1)), &[json!(null)]);
    assert_eq!(fired.produced.tokens(PlaceId(2)), &[json!(null)]);
    assert_eq!(fired.event, json!({ "Added": 1 }));

    let state = handle.get_state().await.unwrap();
    assert_eq!(state.sequence, 2);
    assert!(state.marking.tokens(PlaceId(1)).is_empty());
    assert_eq!(state.marking.tokens(PlaceId(2)), &[json!(null)]);
    assert!(state.consumed_jobs.contains(&fired.job));
}

#[tokio::test]
async fn fatal_failure_then_rejection() {
    let journal = Arc::new(InMemoryJournal::new());
    let instance_id = InstanceId::from("fatal");
    let handle = NetInstance::spawn(
        two_place_net(AlwaysFails),
        instance_id.clone(),
        Arc::clone(&journal) as Arc<dyn tokenweave::journal::Journal>,
    )
    .await
    .unwrap();
    handle
        .initialize(unit_marking(1), json!({}))
        .await
        .unwrap();

    let outcome = handle.fire(TransitionId(1), None).await.unwrap();
    match outcome {
        FireOutcome::Failed(failed) => {
            assert_eq!(failed.transition, TransitionId(1));
            assert_eq!(failed.attempt, 1);
            assert_eq!(failed.decision, FailureStrategy::Fatal);
            assert!(failed.error.contains("intentional failure"));
        }
        other => panic!("expected failed outcome, got {other:?}"),
    }

    // The failure consumed nothing: the token is still in p1.
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.sequence, 2);
    assert_eq!(state.marking.tokens(PlaceId(1)), &[json!(null)]);
    assert!(state.consumed_jobs.is_empty());

    // A fatally failed transition will not fire again.
    let outcome = handle.fire(TransitionId(1), None).await.unwrap();
    match outcome {
        FireOutcome::NotEnabled { reason, .. } => {
            assert_eq!(reason, "has failed previously");
        }
        other => panic!("expected not-enabled outcome, got {other:?}"),
    }
    assert_eq!(journal.len(&instance_id), 2);
}

#[tokio::test]
async fn insufficient_tokens_are_rejected_without_journaling() {
    let journal = Arc::new(InMemoryJournal::new());
    let instance_id = InstanceId::from("starved");
    let handle = NetInstance::spawn(
        chain_net(false),
        instance_id.clone(),
        Arc::clone(&journal) as Arc<dyn tokenweave::journal::Journal>,
    )
    .await
    .unwrap();
    handle
        .initialize(unit_marking(1), json!({}))
        .await
        .unwrap();

    // t2 consumes from p2, which is empty.
    let outcome = handle.fire(TransitionId(2), None).await.unwrap();
    match outcome {
        FireOutcome::NotEnabled { transition, reason } => {
            assert_eq!(transition, TransitionId(2));
            assert_eq!(reason, "not enough tokens");
        }
        other => panic!("expected not-enabled outcome, got {other:?}"),
    }

    // Only the Initialized event was journaled.
    assert_eq!(journal.len(&instance_id), 1);
    assert_eq!(handle.get_state().await.unwrap().sequence, 1);
}

#[tokio::test]
async fn unknown_transition_is_a_command_error() {
    let journal = Arc::new(InMemoryJournal::new());
    let handle = NetInstance::spawn(chain_net(false), InstanceId::from("unknown"), journal)
        .await
        .unwrap();
    handle
        .initialize(unit_marking(1), json!({}))
        .await
        .unwrap();

    let err = handle.fire(TransitionId(99), None).await.unwrap_err();
    assert!(matches!(
        err,
        InstanceError::UnknownTransition(TransitionId(99))
    ));
}

#[tokio::test]
async fn initial_marking_is_reported_back() {
    let journal = Arc::new(InMemoryJournal::new());
    let handle = NetInstance::spawn(chain_net(false), InstanceId::from("report"), journal)
        .await
        .unwrap();

    let marking = Marking::new()
        .with_tokens(PlaceId(1), vec![json!(1), json!(2)])
        .with_token(PlaceId(2), json!(null));
    handle.initialize(marking.clone(), json!([])).await.unwrap();

    let state = handle.get_state().await.unwrap();
    assert_eq!(state.sequence, 1);
    assert_eq!(state.marking, marking);
    assert!(state.consumed_jobs.is_empty());
}
