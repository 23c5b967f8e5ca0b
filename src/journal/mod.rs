//! The persistence driver: an opaque, append-only event journal per instance.
//!
//! The engine only ever relies on the small contract below: appends are
//! atomic and ordered, replay returns events in sequence order, and snapshots
//! are an optional fast-path (backends without them fall back to full
//! replay). The journal is shared across process restarts but single-writer
//! per instance id.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::instance::{InstanceEvent, InstanceState};
use crate::types::InstanceId;

pub mod memory;
pub mod persistence;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryJournal;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteJournal;

/// Errors surfaced by journal backends. Any of these is fatal to the running
/// instance; the actor stops and recovery happens on the next spawn.
#[derive(Debug, Error, Diagnostic)]
pub enum JournalError {
    #[error("journal backend error: {message}")]
    #[diagnostic(code(tokenweave::journal::backend))]
    Backend { message: String },

    #[error("journal (de)serialization failed: {source}")]
    #[diagnostic(
        code(tokenweave::journal::serde),
        help("The stored event shape does not match this crate version.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("instance {instance} already holds an event at sequence {sequence}")]
    #[diagnostic(
        code(tokenweave::journal::sequence_conflict),
        help("The journal is single-writer per instance id; check for a second writer.")
    )]
    SequenceConflict { instance: InstanceId, sequence: u64 },
}

impl From<serde_json::Error> for JournalError {
    fn from(source: serde_json::Error) -> Self {
        JournalError::Serde { source }
    }
}

/// Abstract append-only event log with optional snapshot support.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Atomically append `events` (already carrying their sequence numbers)
    /// to the instance's log, in order.
    async fn append(
        &self,
        instance: &InstanceId,
        events: &[InstanceEvent],
    ) -> Result<(), JournalError>;

    /// Events of the instance with `sequence >= from_sequence`, in order.
    async fn replay(
        &self,
        instance: &InstanceId,
        from_sequence: u64,
    ) -> Result<Vec<InstanceEvent>, JournalError>;

    /// Persist a state snapshot. Backends without snapshot support keep the
    /// default no-op.
    async fn save_snapshot(
        &self,
        _instance: &InstanceId,
        _state: &InstanceState,
    ) -> Result<(), JournalError> {
        Ok(())
    }

    /// Load the latest snapshot, if the backend keeps one.
    async fn load_snapshot(
        &self,
        _instance: &InstanceId,
    ) -> Result<Option<InstanceState>, JournalError> {
        Ok(None)
    }
}
