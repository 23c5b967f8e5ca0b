/*!
SQLite journal backend.

Durable [`Journal`] implementation over an sqlx `SqlitePool`. Events are
stored one row per sequence number; the snapshot table keeps at most one row
per instance.

## Schema

- `journal.instance_id` / `journal.sequence`: primary key; the single-writer
  rule per instance id makes the key a conflict detector, not a lock.
- `journal.event_json`: the serde-persisted event (see
  [`super::persistence`]).
- `snapshots.state_json`: the latest persisted instance state.
- `created_at` columns carry RFC3339 timestamps for external maintenance;
  the engine never reads them.

The schema is created idempotently on [`SqliteJournal::connect`].
*/

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::persistence::{PersistedEvent, PersistedInstanceState};
use super::{Journal, JournalError};
use crate::instance::{InstanceEvent, InstanceState};
use crate::types::InstanceId;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS journal (
    instance_id TEXT NOT NULL,
    sequence    INTEGER NOT NULL,
    event_json  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (instance_id, sequence)
);
CREATE TABLE IF NOT EXISTS snapshots (
    instance_id TEXT PRIMARY KEY,
    sequence    INTEGER NOT NULL,
    state_json  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
"#;

/// SQLite-backed journal.
pub struct SqliteJournal {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteJournal").finish()
    }
}

fn backend_err(context: &str, err: impl std::fmt::Display) -> JournalError {
    JournalError::Backend {
        message: format!("{context}: {err}"),
    }
}

impl SqliteJournal {
    /// Connect to (or create) a SQLite database at `database_url` and ensure
    /// the schema exists. Example URL: `"sqlite://tokenweave.db"`.
    #[must_use = "journal must be used to persist events"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, JournalError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| backend_err("connect error", e))?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| backend_err("schema creation", e))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Journal for SqliteJournal {
    #[instrument(skip(self, events), fields(instance = %instance, count = events.len()), err)]
    async fn append(
        &self,
        instance: &InstanceId,
        events: &[InstanceEvent],
    ) -> Result<(), JournalError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend_err("tx begin", e))?;

        for event in events {
            let persisted = PersistedEvent::from(event);
            let event_json = serde_json::to_string(&persisted)?;
            let result = sqlx::query(
                r#"
                INSERT INTO journal (instance_id, sequence, event_json, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(instance.as_str())
            .bind(event.sequence() as i64)
            .bind(event_json)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await;

            if let Err(err) = result {
                let unique_violation = err
                    .as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false);
                return Err(if unique_violation {
                    JournalError::SequenceConflict {
                        instance: instance.clone(),
                        sequence: event.sequence(),
                    }
                } else {
                    backend_err("insert event", err)
                });
            }
        }

        tx.commit().await.map_err(|e| backend_err("tx commit", e))
    }

    #[instrument(skip(self), fields(instance = %instance), err)]
    async fn replay(
        &self,
        instance: &InstanceId,
        from_sequence: u64,
    ) -> Result<Vec<InstanceEvent>, JournalError> {
        let rows = sqlx::query(
            r#"
            SELECT event_json FROM journal
            WHERE instance_id = ?1 AND sequence >= ?2
            ORDER BY sequence ASC
            "#,
        )
        .bind(instance.as_str())
        .bind(from_sequence as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend_err("select events", e))?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_json: String = row
                .try_get("event_json")
                .map_err(|e| backend_err("read event_json", e))?;
            let persisted: PersistedEvent = serde_json::from_str(&event_json)?;
            events.push(InstanceEvent::from(persisted));
        }
        Ok(events)
    }

    #[instrument(skip(self, state), fields(instance = %instance, sequence = state.sequence), err)]
    async fn save_snapshot(
        &self,
        instance: &InstanceId,
        state: &InstanceState,
    ) -> Result<(), JournalError> {
        let persisted = PersistedInstanceState::from(state);
        let state_json = serde_json::to_string(&persisted)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO snapshots (instance_id, sequence, state_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(instance.as_str())
        .bind(state.sequence as i64)
        .bind(state_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("save snapshot", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(instance = %instance), err)]
    async fn load_snapshot(
        &self,
        instance: &InstanceId,
    ) -> Result<Option<InstanceState>, JournalError> {
        let row = sqlx::query(
            r#"
            SELECT state_json FROM snapshots WHERE instance_id = ?1
            "#,
        )
        .bind(instance.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend_err("select snapshot", e))?;

        match row {
            None => Ok(None),
            Some(row) => {
                let state_json: String = row
                    .try_get("state_json")
                    .map_err(|e| backend_err("read state_json", e))?;
                let persisted: PersistedInstanceState = serde_json::from_str(&state_json)?;
                Ok(Some(InstanceState::from(persisted)))
            }
        }
    }
}
