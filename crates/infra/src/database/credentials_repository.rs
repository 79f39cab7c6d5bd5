//! SQLite-backed implementation of the CredentialsRepository port.
//!
//! Stores one refresh grant per user. Secrets never appear in log fields.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use quorum_core::CredentialsRepository;
use quorum_domain::{CalendarCredentials, Result};
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite implementation of CredentialsRepository
pub struct SqliteCredentialsRepository {
    db: Arc<DbManager>,
}

impl SqliteCredentialsRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_credentials_row(row: &Row<'_>) -> rusqlite::Result<CalendarCredentials> {
    Ok(CalendarCredentials {
        user_id: row.get(0)?,
        owner_email: row.get(1)?,
        refresh_token: row.get(2)?,
        access_token: row.get(3)?,
        expires_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[async_trait]
impl CredentialsRepository for SqliteCredentialsRepository {
    #[instrument(skip(self))]
    async fn get(&self, user_id: &str) -> Result<Option<CalendarCredentials>> {
        let conn = self.db.get_connection()?;

        let result = conn.query_row(
            "SELECT user_id, owner_email, refresh_token, access_token, expires_at, updated_at
             FROM calendar_credentials
             WHERE user_id = ?1",
            [&user_id],
            map_credentials_row,
        );

        match result {
            Ok(credentials) => Ok(Some(credentials)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self, credentials), fields(user_id = %credentials.user_id))]
    async fn upsert(&self, credentials: &CalendarCredentials) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO calendar_credentials (
                user_id, owner_email, refresh_token, access_token, expires_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                owner_email = excluded.owner_email,
                refresh_token = excluded.refresh_token,
                access_token = excluded.access_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            [
                &credentials.user_id as &dyn ToSql,
                &credentials.owner_email,
                &credentials.refresh_token,
                &credentials.access_token,
                &credentials.expires_at,
                &now,
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(user_id = %credentials.user_id, "stored calendar credentials");
        Ok(())
    }

    #[instrument(skip(self, access_token))]
    async fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expires_at: i64,
    ) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "UPDATE calendar_credentials
                 SET access_token = ?1, expires_at = ?2, updated_at = ?3
                 WHERE user_id = ?4",
            [&access_token as &dyn ToSql, &expires_at, &now, &user_id].as_ref(),
        )
        .map_err(InfraError::from)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, user_id: &str) -> Result<()> {
        let conn = self.db.get_connection()?;
        conn.execute("DELETE FROM calendar_credentials WHERE user_id = ?1", [&user_id])
            .map_err(InfraError::from)?;
        debug!(user_id, "deleted calendar credentials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (Arc<DbManager>, TempDir) {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(DbManager::new(temp.path().join("test.db"), 2).unwrap());
        db.run_migrations().unwrap();
        (db, temp)
    }

    #[tokio::test]
    async fn upsert_replaces_existing_grant() {
        let (db, _temp) = setup();
        let repo = SqliteCredentialsRepository::new(db);

        let grant = CalendarCredentials {
            user_id: "u1".to_string(),
            owner_email: "me@example.com".to_string(),
            refresh_token: "refresh-1".to_string(),
            access_token: None,
            expires_at: None,
            updated_at: 0,
        };
        repo.upsert(&grant).await.unwrap();

        let replaced = CalendarCredentials { refresh_token: "refresh-2".to_string(), ..grant };
        repo.upsert(&replaced).await.unwrap();

        let stored = repo.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn access_token_update_is_scoped() {
        let (db, _temp) = setup();
        let repo = SqliteCredentialsRepository::new(db);

        repo.upsert(&CalendarCredentials {
            user_id: "u1".to_string(),
            owner_email: "me@example.com".to_string(),
            refresh_token: "refresh-1".to_string(),
            access_token: None,
            expires_at: None,
            updated_at: 0,
        })
        .await
        .unwrap();

        repo.update_access_token("u1", "access-1", 12_345).await.unwrap();

        let stored = repo.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("access-1"));
        assert_eq!(stored.expires_at, Some(12_345));
        assert_eq!(stored.refresh_token, "refresh-1");

        assert!(repo.get("u2").await.unwrap().is_none());
    }
}
