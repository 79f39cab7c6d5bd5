//! SQLite-backed implementation of the SyncStateRepository port.
//!
//! One row per (user, calendar) keyed by the table's primary key, so watch
//! creation is an idempotent upsert and "at most one active watch" holds by
//! uniqueness rather than locking.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use quorum_core::SyncStateRepository;
use quorum_domain::{Result, WatchSubscription};
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::InfraError;

const WATCH_COLUMNS: &str = "user_id, calendar_id, subscription_id, resource_id,
        expiration_ts, sync_token, is_active, updated_at";

/// SQLite implementation of SyncStateRepository
pub struct SqliteSyncStateRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncStateRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_watch_row(row: &Row<'_>) -> rusqlite::Result<WatchSubscription> {
    Ok(WatchSubscription {
        user_id: row.get(0)?,
        calendar_id: row.get(1)?,
        subscription_id: row.get(2)?,
        resource_id: row.get(3)?,
        expiration_ts: row.get(4)?,
        sync_token: row.get(5)?,
        is_active: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[async_trait]
impl SyncStateRepository for SqliteSyncStateRepository {
    #[instrument(skip(self))]
    async fn get(&self, user_id: &str, calendar_id: &str) -> Result<Option<WatchSubscription>> {
        let conn = self.db.get_connection()?;

        let result = conn.query_row(
            &format!(
                "SELECT {WATCH_COLUMNS} FROM watch_subscriptions
                 WHERE user_id = ?1 AND calendar_id = ?2"
            ),
            [&user_id as &dyn ToSql, &calendar_id].as_ref(),
            map_watch_row,
        );

        match result {
            Ok(watch) => Ok(Some(watch)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self, watch), fields(user_id = %watch.user_id))]
    async fn upsert_watch(&self, watch: &WatchSubscription) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        // COALESCE keeps an existing cursor when the caller passes none
        conn.execute(
            "INSERT INTO watch_subscriptions (
                user_id, calendar_id, subscription_id, resource_id,
                expiration_ts, sync_token, is_active, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, calendar_id) DO UPDATE SET
                subscription_id = excluded.subscription_id,
                resource_id = excluded.resource_id,
                expiration_ts = excluded.expiration_ts,
                sync_token = COALESCE(excluded.sync_token, watch_subscriptions.sync_token),
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
            [
                &watch.user_id as &dyn ToSql,
                &watch.calendar_id,
                &watch.subscription_id,
                &watch.resource_id,
                &watch.expiration_ts,
                &watch.sync_token,
                &watch.is_active,
                &now,
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(user_id = %watch.user_id, calendar_id = %watch.calendar_id, "upserted watch row");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn deactivate_watch(&self, user_id: &str, calendar_id: &str) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "UPDATE watch_subscriptions
                 SET is_active = 0, updated_at = ?1
                 WHERE user_id = ?2 AND calendar_id = ?3",
            [&now as &dyn ToSql, &user_id, &calendar_id].as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(user_id, calendar_id, "deactivated watch");
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn set_sync_token(&self, user_id: &str, calendar_id: &str, token: &str) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO watch_subscriptions (user_id, calendar_id, sync_token, is_active, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4)
             ON CONFLICT(user_id, calendar_id) DO UPDATE SET
                sync_token = excluded.sync_token,
                updated_at = excluded.updated_at",
            [&user_id as &dyn ToSql, &calendar_id, &token, &now].as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(user_id, "updated sync token");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_sync_token(&self, user_id: &str, calendar_id: &str) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "UPDATE watch_subscriptions
                 SET sync_token = NULL, updated_at = ?1
                 WHERE user_id = ?2 AND calendar_id = ?3",
            [&now as &dyn ToSql, &user_id, &calendar_id].as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(user_id, "cleared sync token");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user_by_resource(&self, resource_id: &str) -> Result<Option<String>> {
        let conn = self.db.get_connection()?;

        let result = conn.query_row(
            "SELECT user_id FROM watch_subscriptions
             WHERE resource_id = ?1 AND is_active = 1
             LIMIT 1",
            [&resource_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(user_id) => Ok(Some(user_id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn active_watches(&self) -> Result<Vec<WatchSubscription>> {
        let conn = self.db.get_connection()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {WATCH_COLUMNS} FROM watch_subscriptions
                 WHERE is_active = 1
                 ORDER BY expiration_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map([], map_watch_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }
}
