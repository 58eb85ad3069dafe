use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use strata_models::artifact::ARTIFACT_TABLE_DDL;
use strata_models::{Artifact, ArtifactKind};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::ArtifactStore;

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO artifacts \
     (run_id, kind, name, question, body, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// SQLite-backed artifact store.
///
/// Keeps every run side by side, keyed by `(run_id, kind, name)`.
/// `rusqlite::Connection` is not `Sync`, so it sits behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file. Creates the schema and enables WAL.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(ARTIFACT_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(ARTIFACT_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }

    /// All artifacts written for a run, ordered by kind then name.
    pub fn artifacts_for_run(&self, run_id: Uuid) -> Result<Vec<Artifact>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT run_id, kind, name, question, body, created_at \
             FROM artifacts WHERE run_id = ?1 ORDER BY kind, name",
        )?;

        let rows = stmt
            .query_map(params![run_id.to_string()], |row| {
                let run_id: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let created_at: DateTime<Utc> = row.get(5)?;
                Ok(Artifact {
                    run_id: Uuid::parse_str(&run_id).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                    })?,
                    kind: ArtifactKind::parse(&kind).ok_or_else(|| {
                        rusqlite::Error::InvalidColumnType(1, kind.clone(), Type::Text)
                    })?,
                    name: row.get(2)?,
                    question: row.get(3)?,
                    body: row.get(4)?,
                    created_at,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Count all stored artifacts.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: usize = conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl ArtifactStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn persist(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            UPSERT_SQL,
            params![
                artifact.run_id.to_string(),
                artifact.kind.as_str(),
                artifact.name,
                artifact.question,
                artifact.body,
                artifact.created_at,
            ],
        )?;
        debug!(kind = %artifact.kind, name = %artifact.name, "Stored artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(run_id: Uuid, kind: ArtifactKind, name: &str, body: &str) -> Artifact {
        Artifact::new(run_id, kind, name, "Should I buy VCB?", body)
    }

    #[test]
    fn persist_and_count() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .persist(&artifact(Uuid::new_v4(), ArtifactKind::ExpertAnalysis, "market_analyst", "a"))
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn persist_replaces_same_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        let run_id = Uuid::new_v4();
        store
            .persist(&artifact(run_id, ArtifactKind::FinalReport, "final", "draft"))
            .unwrap();
        store
            .persist(&artifact(run_id, ArtifactKind::FinalReport, "final", "refined"))
            .unwrap();

        let rows = store.artifacts_for_run(run_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, "refined");
    }

    #[test]
    fn runs_are_kept_apart() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for row in [
            artifact(first, ArtifactKind::ExpertAnalysis, "market_analyst", "a"),
            artifact(first, ArtifactKind::GroupSummary, "Market Analysis", "s"),
            artifact(second, ArtifactKind::ExpertAnalysis, "market_analyst", "b"),
        ] {
            store.persist(&row).unwrap();
        }

        assert_eq!(store.count().unwrap(), 3);
        let rows = store.artifacts_for_run(first).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, ArtifactKind::ExpertAnalysis);
        assert_eq!(rows[0].run_id, first);
        assert_eq!(rows[1].name, "Market Analysis");
    }

    #[test]
    fn wal_mode_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        store
            .persist(&artifact(Uuid::new_v4(), ArtifactKind::FinalReport, "final", "r"))
            .unwrap();

        let conn = store.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
