use std::sync::Arc;

use serde_json::json;
use tokenweave::instance::{InstanceState, NetInstance};
use tokenweave::journal::{InMemoryJournal, Journal};
use tokenweave::types::{InstanceId, PlaceId, TransitionId};

mod common;
use common::*;

#[tokio::test]
async fn restart_replays_the_full_history() {
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());
    let instance_id = InstanceId::from("restart");
    let net = chain_net(true);

    // First life: initialize, fire t1, let the automatic t2 follow.
    let handle = NetInstance::spawn(Arc::clone(&net), instance_id.clone(), Arc::clone(&journal))
        .await
        .unwrap();
    handle.initialize(unit_marking(1), json!([])).await.unwrap();
    handle.fire(TransitionId(1), None).await.unwrap();
    let before = wait_for_sequence(&handle, 3, 2_000).await;
    handle.shutdown().await;

    // Second life: same journal, same id.
    let handle = NetInstance::spawn(net, instance_id, journal).await.unwrap();
    let after = handle.get_state().await.unwrap();
    assert_eq!(after.sequence, 3);
    assert_eq!(after.marking.tokens(PlaceId(3)), &[json!(null)]);
    assert!(after.marking.tokens(PlaceId(1)).is_empty());
    assert!(after.marking.tokens(PlaceId(2)).is_empty());
    assert_eq!(after.consumed_jobs.len(), 2);
    assert_eq!(after, before);
}

#[tokio::test]
async fn replaying_a_journal_twice_is_deterministic() {
    let journal = Arc::new(InMemoryJournal::new());
    let instance_id = InstanceId::from("determinism");
    let handle = NetInstance::spawn(
        chain_net(true),
        instance_id.clone(),
        Arc::clone(&journal) as Arc<dyn Journal>,
    )
    .await
    .unwrap();
    handle.initialize(unit_marking(1), json!([])).await.unwrap();
    handle.fire(TransitionId(1), None).await.unwrap();
    wait_for_sequence(&handle, 3, 2_000).await;
    handle.shutdown().await;

    let events = journal.replay(&instance_id, 1).await.unwrap();
    let once = InstanceState::replay(events.iter()).unwrap();
    let twice = InstanceState::replay(events.iter()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.sequence, 3);
}

#[tokio::test]
async fn failure_records_survive_recovery() {
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());
    let instance_id = InstanceId::from("failed-recovery");
    let net = two_place_net(AlwaysFails);

    let handle = NetInstance::spawn(Arc::clone(&net), instance_id.clone(), Arc::clone(&journal))
        .await
        .unwrap();
    handle
        .initialize(unit_marking(1), json!({}))
        .await
        .unwrap();
    handle.fire(TransitionId(1), None).await.unwrap();
    handle.shutdown().await;

    // After recovery the fatal record still gates the transition.
    let handle = NetInstance::spawn(net, instance_id, journal).await.unwrap();
    let outcome = handle.fire(TransitionId(1), None).await.unwrap();
    match outcome {
        tokenweave::instance::FireOutcome::NotEnabled { reason, .. } => {
            assert_eq!(reason, "has failed previously");
        }
        other => panic!("expected not-enabled outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn snapshot_shortcuts_replay() {
    let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());
    let instance_id = InstanceId::from("snapshot");
    let net = chain_net(false);

    let handle = NetInstance::spawn(Arc::clone(&net), instance_id.clone(), Arc::clone(&journal))
        .await
        .unwrap();
    handle.initialize(unit_marking(1), json!([])).await.unwrap();
    handle.fire(TransitionId(1), None).await.unwrap();
    handle.snapshot().await.unwrap();
    let before = handle.get_state().await.unwrap();
    handle.shutdown().await;

    let handle = NetInstance::spawn(net, instance_id, journal).await.unwrap();
    let after = handle.get_state().await.unwrap();
    assert_eq!(after, before);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_journal_survives_reconnection() {
    use tokenweave::journal::SqliteJournal;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("recovery.db");
    std::fs::File::create(&db_path).unwrap();
    let db_url = format!("sqlite://{}", db_path.display());

    let instance_id = InstanceId::from("sqlite-recovery");
    let net = chain_net(true);

    let journal: Arc<dyn Journal> = Arc::new(SqliteJournal::connect(&db_url).await.unwrap());
    let handle = NetInstance::spawn(Arc::clone(&net), instance_id.clone(), journal)
        .await
        .unwrap();
    handle.initialize(unit_marking(1), json!([])).await.unwrap();
    handle.fire(TransitionId(1), None).await.unwrap();
    let before = wait_for_sequence(&handle, 3, 2_000).await;
    handle.shutdown().await;

    // A brand-new pool over the same file sees the same history.
    let journal: Arc<dyn Journal> = Arc::new(SqliteJournal::connect(&db_url).await.unwrap());
    let handle = NetInstance::spawn(net, instance_id, journal).await.unwrap();
    let after = handle.get_state().await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.marking.tokens(PlaceId(3)), &[json!(null)]);
}
