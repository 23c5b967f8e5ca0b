//! Volatile in-memory journal for tests and development.
//!
//! Share the same `Arc<InMemoryJournal>` across instance spawns to simulate a
//! crash/restart cycle: the store outlives the actor, so a fresh spawn with
//! the same instance id replays the recorded history.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

use super::{Journal, JournalError};
use crate::instance::{InstanceEvent, InstanceState};
use crate::types::InstanceId;

#[derive(Default)]
struct Store {
    events: FxHashMap<InstanceId, Vec<InstanceEvent>>,
    snapshots: FxHashMap<InstanceId, InstanceState>,
}

/// In-memory [`Journal`] implementation.
#[derive(Default)]
pub struct InMemoryJournal {
    store: Mutex<Store>,
}

impl InMemoryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events recorded for `instance`.
    pub fn len(&self, instance: &InstanceId) -> usize {
        self.store
            .lock()
            .expect("journal store poisoned")
            .events
            .get(instance)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, instance: &InstanceId) -> bool {
        self.len(instance) == 0
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(
        &self,
        instance: &InstanceId,
        events: &[InstanceEvent],
    ) -> Result<(), JournalError> {
        let mut store = self.store.lock().expect("journal store poisoned");
        let log = store.events.entry(instance.clone()).or_default();
        for event in events {
            let expected = log.last().map(|last| last.sequence() + 1).unwrap_or(1);
            if event.sequence() != expected {
                return Err(JournalError::SequenceConflict {
                    instance: instance.clone(),
                    sequence: event.sequence(),
                });
            }
            log.push(event.clone());
        }
        Ok(())
    }

    async fn replay(
        &self,
        instance: &InstanceId,
        from_sequence: u64,
    ) -> Result<Vec<InstanceEvent>, JournalError> {
        let store = self.store.lock().expect("journal store poisoned");
        Ok(store
            .events
            .get(instance)
            .map(|log| {
                log.iter()
                    .filter(|event| event.sequence() >= from_sequence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_snapshot(
        &self,
        instance: &InstanceId,
        state: &InstanceState,
    ) -> Result<(), JournalError> {
        let mut store = self.store.lock().expect("journal store poisoned");
        store.snapshots.insert(instance.clone(), state.clone());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        instance: &InstanceId,
    ) -> Result<Option<InstanceState>, JournalError> {
        let store = self.store.lock().expect("journal store poisoned");
        Ok(store.snapshots.get(instance).cloned())
    }
}
