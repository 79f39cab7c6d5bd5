//! SQLite-backed implementation of the SyncLogRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use quorum_core::SyncLogRepository;
use quorum_domain::{Result, SyncLogEntry, SyncType};
use rusqlite::{Row, ToSql};
use tracing::instrument;

use super::manager::DbManager;
use crate::errors::InfraError;

const LOG_COLUMNS: &str = "id, user_id, sync_type, processed, created, updated,
        deleted, success, error, started_at, finished_at";

/// SQLite implementation of SyncLogRepository
pub struct SqliteSyncLogRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncLogRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_log_row(row: &Row<'_>) -> rusqlite::Result<SyncLogEntry> {
    let sync_type: String = row.get(2)?;

    Ok(SyncLogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        sync_type: SyncType::parse(&sync_type).unwrap_or(SyncType::Manual),
        processed: row.get::<_, i64>(3)?.max(0) as usize,
        created: row.get::<_, i64>(4)?.max(0) as usize,
        updated: row.get::<_, i64>(5)?.max(0) as usize,
        deleted: row.get::<_, i64>(6)?.max(0) as usize,
        success: row.get(7)?,
        error: row.get(8)?,
        started_at: row.get(9)?,
        finished_at: row.get(10)?,
    })
}

#[async_trait]
impl SyncLogRepository for SqliteSyncLogRepository {
    #[instrument(skip(self, entry), fields(user_id = %entry.user_id, sync_type = entry.sync_type.as_str()))]
    async fn append(&self, entry: &SyncLogEntry) -> Result<()> {
        let conn = self.db.get_connection()?;

        conn.execute(
            "INSERT INTO sync_logs (
                id, user_id, sync_type, processed, created, updated,
                deleted, success, error, started_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            [
                &entry.id as &dyn ToSql,
                &entry.user_id,
                &entry.sync_type.as_str(),
                &(entry.processed as i64),
                &(entry.created as i64),
                &(entry.updated as i64),
                &(entry.deleted as i64),
                &entry.success,
                &entry.error,
                &entry.started_at,
                &entry.finished_at,
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest_for_user(&self, user_id: &str) -> Result<Option<SyncLogEntry>> {
        let conn = self.db.get_connection()?;

        let result = conn.query_row(
            &format!(
                "SELECT {LOG_COLUMNS} FROM sync_logs
                 WHERE user_id = ?1
                 ORDER BY finished_at DESC, id DESC
                 LIMIT 1"
            ),
            [&user_id],
            map_log_row,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let conn = self.db.get_connection()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM sync_logs
                 WHERE user_id = ?1
                 ORDER BY finished_at DESC, id DESC
                 LIMIT ?2"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map([&user_id as &dyn ToSql, &(limit as i64)].as_ref(), map_log_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn setup() -> (Arc<DbManager>, TempDir) {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(DbManager::new(temp.path().join("test.db"), 2).unwrap());
        db.run_migrations().unwrap();
        (db, temp)
    }

    fn entry(user_id: &str, finished_at: i64, success: bool) -> SyncLogEntry {
        SyncLogEntry {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            sync_type: SyncType::Incremental,
            processed: 3,
            created: 2,
            updated: 1,
            deleted: 0,
            success,
            error: (!success).then(|| "provider unavailable".to_string()),
            started_at: finished_at - 2,
            finished_at,
        }
    }

    #[tokio::test]
    async fn append_and_read_back_latest() {
        let (db, _temp) = setup();
        let repo = SqliteSyncLogRepository::new(db);

        repo.append(&entry("u1", 100, true)).await.unwrap();
        repo.append(&entry("u1", 200, false)).await.unwrap();

        let latest = repo.latest_for_user("u1").await.unwrap().unwrap();
        assert_eq!(latest.finished_at, 200);
        assert!(!latest.success);
        assert_eq!(latest.error.as_deref(), Some("provider unavailable"));

        assert!(repo.latest_for_user("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_respects_limit_and_order() {
        let (db, _temp) = setup();
        let repo = SqliteSyncLogRepository::new(db);

        for ts in [100, 200, 300] {
            repo.append(&entry("u1", ts, true)).await.unwrap();
        }

        let recent = repo.recent_for_user("u1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].finished_at, 300);
        assert_eq!(recent[1].finished_at, 200);
    }
}
