//! Runtime configuration: instance identity and journal selection.

use std::sync::Arc;

use crate::journal::{InMemoryJournal, Journal, JournalError};
use crate::types::InstanceId;

/// Which journal backend an instance persists through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalType {
    /// Volatile store; history dies with the process.
    InMemory,
    /// Durable SQLite store (requires the default `sqlite` feature).
    Sqlite,
}

/// Configuration consumed by
/// [`NetInstance::spawn_with_config`](crate::instance::NetInstance::spawn_with_config).
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Instance identity; a random one is generated when absent.
    pub instance_id: Option<String>,
    /// Journal backend; defaults to [`JournalType::InMemory`].
    pub journal: Option<JournalType>,
    /// SQLite database file name, resolved against the environment when
    /// absent.
    pub sqlite_db_name: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instance_id: Some(InstanceId::generate().0),
            journal: Some(JournalType::InMemory),
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("SQLITE_DB_NAME").unwrap_or_else(|_| "tokenweave.db".to_string()))
    }

    pub fn new(
        instance_id: Option<String>,
        journal: Option<JournalType>,
        sqlite_db_name: Option<String>,
    ) -> Self {
        Self {
            instance_id,
            journal,
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
        }
    }

    /// Build the configured journal backend.
    ///
    /// For SQLite, the database URL is taken from `TOKENWEAVE_SQLITE_URL` when
    /// set, otherwise assembled as `sqlite://{sqlite_db_name}`; the underlying
    /// file (and its parent directories) are created up front so a fresh
    /// checkout works without manual setup.
    pub async fn build_journal(&self) -> Result<Arc<dyn Journal>, JournalError> {
        match self.journal.clone().unwrap_or(JournalType::InMemory) {
            JournalType::InMemory => Ok(Arc::new(InMemoryJournal::new())),
            #[cfg(feature = "sqlite")]
            JournalType::Sqlite => {
                let db_url = std::env::var("TOKENWEAVE_SQLITE_URL")
                    .ok()
                    .or_else(|| {
                        self.sqlite_db_name
                            .as_ref()
                            .map(|name| format!("sqlite://{name}"))
                    })
                    .unwrap_or_else(|| "sqlite://tokenweave.db".to_string());
                if let Some(path) = db_url.strip_prefix("sqlite://") {
                    let path = path.trim();
                    if !path.is_empty() {
                        let p = std::path::Path::new(path);
                        if let Some(parent) = p.parent() {
                            let _ = std::fs::create_dir_all(parent);
                        }
                        if !p.exists() {
                            // Ignore the result; connect reports real problems.
                            let _ = std::fs::File::create_new(p);
                        }
                    }
                }
                let journal = crate::journal::SqliteJournal::connect(&db_url).await?;
                Ok(Arc::new(journal))
            }
            #[cfg(not(feature = "sqlite"))]
            JournalType::Sqlite => Err(JournalError::Backend {
                message: "built without the `sqlite` feature".to_string(),
            }),
        }
    }
}
