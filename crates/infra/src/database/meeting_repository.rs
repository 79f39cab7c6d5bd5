//! SQLite-backed implementation of the MeetingRepository port.
//!
//! `update_remote_fields` deliberately lists only remote-owned columns in its
//! UPDATE, so a reconciliation pass cannot overwrite `bot_status`, `bot_id`,
//! or `bot_config_json` on an existing row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use quorum_core::MeetingRepository;
use quorum_domain::{BotStatus, CandidateMeeting, EventStatus, Meeting, Result};
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::InfraError;

const MEETING_COLUMNS: &str = "id, user_id, project_id, remote_event_id, title, description,
        meeting_url, start_ts, end_ts, event_status, bot_status, bot_id,
        bot_config_json, created_at, updated_at";

/// SQLite implementation of MeetingRepository
pub struct SqliteMeetingRepository {
    db: Arc<DbManager>,
}

impl SqliteMeetingRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_meeting_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    let event_status: String = row.get(9)?;
    let bot_status: String = row.get(10)?;

    Ok(Meeting {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        remote_event_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        meeting_url: row.get(6)?,
        start_ts: row.get(7)?,
        end_ts: row.get(8)?,
        // Unknown stored values degrade to the defaults rather than poisoning
        // the whole query
        event_status: EventStatus::parse(&event_status).unwrap_or(EventStatus::NeedsAction),
        bot_status: BotStatus::parse(&bot_status).unwrap_or(BotStatus::Pending),
        bot_id: row.get(11)?,
        bot_config_json: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

#[async_trait]
impl MeetingRepository for SqliteMeetingRepository {
    #[instrument(skip(self))]
    async fn find_by_remote_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
    ) -> Result<Option<Meeting>> {
        let conn = self.db.get_connection()?;

        let result = conn.query_row(
            &format!(
                "SELECT {MEETING_COLUMNS} FROM meetings
                 WHERE user_id = ?1 AND remote_event_id = ?2"
            ),
            [&user_id as &dyn ToSql, &remote_event_id].as_ref(),
            map_meeting_row,
        );

        match result {
            Ok(meeting) => Ok(Some(meeting)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self, meeting), fields(meeting_id = %meeting.id))]
    async fn insert(&self, meeting: &Meeting) -> Result<()> {
        let conn = self.db.get_connection()?;

        conn.execute(
            "INSERT INTO meetings (
                id, user_id, project_id, remote_event_id, title, description,
                meeting_url, start_ts, end_ts, event_status, bot_status, bot_id,
                bot_config_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            [
                &meeting.id as &dyn ToSql,
                &meeting.user_id,
                &meeting.project_id,
                &meeting.remote_event_id,
                &meeting.title,
                &meeting.description,
                &meeting.meeting_url,
                &meeting.start_ts,
                &meeting.end_ts,
                &meeting.event_status.as_str(),
                &meeting.bot_status.as_str(),
                &meeting.bot_id,
                &meeting.bot_config_json,
                &meeting.created_at,
                &meeting.updated_at,
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(meeting_id = %meeting.id, "inserted meeting");
        Ok(())
    }

    #[instrument(skip(self, candidate))]
    async fn update_remote_fields(&self, id: &str, candidate: &CandidateMeeting) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        // Remote-owned columns only; bot_* stays untouched
        conn.execute(
            "UPDATE meetings SET
                title = ?1,
                description = ?2,
                meeting_url = ?3,
                start_ts = ?4,
                end_ts = ?5,
                event_status = ?6,
                updated_at = ?7
             WHERE id = ?8",
            [
                &candidate.title as &dyn ToSql,
                &candidate.description,
                &candidate.meeting_url,
                &candidate.start_ts,
                &candidate.end_ts,
                &candidate.event_status.as_str(),
                &now,
                &id,
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn soft_cancel(&self, id: &str) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "UPDATE meetings SET
                event_status = ?1,
                bot_status = ?2,
                updated_at = ?3
             WHERE id = ?4",
            [
                &EventStatus::Declined.as_str() as &dyn ToSql,
                &BotStatus::Failed.as_str(),
                &now,
                &id,
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(meeting_id = %id, "soft-cancelled meeting");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.db.get_connection()?;
        conn.execute("DELETE FROM meetings WHERE id = ?1", [&id])
            .map_err(InfraError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Meeting>> {
        let conn = self.db.get_connection()?;

        let result = conn.query_row(
            &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1"),
            [&id],
            map_meeting_row,
        );

        match result {
            Ok(meeting) => Ok(Some(meeting)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_synced(&self, user_id: &str) -> Result<Vec<Meeting>> {
        let conn = self.db.get_connection()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MEETING_COLUMNS} FROM meetings
                 WHERE user_id = ?1 AND remote_event_id IS NOT NULL
                 ORDER BY start_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map([&user_id], map_meeting_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }

    #[instrument(skip(self, config_json))]
    async fn set_bot(&self, id: &str, bot_id: &str, config_json: Option<&str>) -> Result<()> {
        let conn = self.db.get_connection()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "UPDATE meetings SET
                bot_id = ?1,
                bot_status = ?2,
                bot_config_json = ?3,
                updated_at = ?4
             WHERE id = ?5",
            [
                &bot_id as &dyn ToSql,
                &BotStatus::BotScheduled.as_str(),
                &config_json,
                &now,
                &id,
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(meeting_id = %id, bot_id, "bot scheduled on meeting");
        Ok(())
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

    fn meeting(user_id: &str, remote_event_id: &str) -> Meeting {
        let now = Utc::now().timestamp();
        Meeting {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            project_id: None,
            remote_event_id: Some(remote_event_id.to_string()),
            title: "Standup".to_string(),
            description: None,
            meeting_url: Some("https://meet.google.com/abc-defg-hij".to_string()),
            start_ts: now,
            end_ts: now + 1800,
            event_status: EventStatus::Accepted,
            bot_status: BotStatus::Pending,
            bot_id: None,
            bot_config_json: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_remote_event() {
        let (db, _temp) = setup();
        let repo = SqliteMeetingRepository::new(db);

        repo.insert(&meeting("u1", "evt-1")).await.unwrap();

        let found = repo.find_by_remote_event("u1", "evt-1").await.unwrap().unwrap();
        assert_eq!(found.title, "Standup");
        assert_eq!(found.bot_status, BotStatus::Pending);

        // Scoped to the owning user
        assert!(repo.find_by_remote_event("u2", "evt-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_remote_event_is_rejected() {
        let (db, _temp) = setup();
        let repo = SqliteMeetingRepository::new(db);

        repo.insert(&meeting("u1", "evt-1")).await.unwrap();
        let err = repo.insert(&meeting("u1", "evt-1")).await.unwrap_err();
        assert!(matches!(err, quorum_domain::QuorumError::Database(_)));
    }

    #[tokio::test]
    async fn update_remote_fields_preserves_bot_columns() {
        let (db, _temp) = setup();
        let repo = SqliteMeetingRepository::new(db);

        let mut row = meeting("u1", "evt-1");
        row.bot_status = BotStatus::Transcribing;
        row.bot_id = Some("bot-9".to_string());
        row.bot_config_json = Some(r#"{"language":"en"}"#.to_string());
        repo.insert(&row).await.unwrap();

        let candidate = CandidateMeeting {
            remote_event_id: "evt-1".to_string(),
            title: "Renamed".to_string(),
            description: Some("moved".to_string()),
            meeting_url: "https://meet.google.com/new-link".to_string(),
            start_ts: row.start_ts + 3600,
            end_ts: row.end_ts + 3600,
            event_status: EventStatus::Tentative,
        };
        repo.update_remote_fields(&row.id, &candidate).await.unwrap();

        let updated = repo.get(&row.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.event_status, EventStatus::Tentative);
        assert_eq!(updated.bot_status, BotStatus::Transcribing);
        assert_eq!(updated.bot_id.as_deref(), Some("bot-9"));
        assert_eq!(updated.bot_config_json.as_deref(), Some(r#"{"language":"en"}"#));
    }

    #[tokio::test]
    async fn soft_cancel_sets_terminal_states() {
        let (db, _temp) = setup();
        let repo = SqliteMeetingRepository::new(db);

        let row = meeting("u1", "evt-1");
        repo.insert(&row).await.unwrap();
        repo.soft_cancel(&row.id).await.unwrap();

        let cancelled = repo.get(&row.id).await.unwrap().unwrap();
        assert_eq!(cancelled.event_status, EventStatus::Declined);
        assert_eq!(cancelled.bot_status, BotStatus::Failed);
    }

    #[tokio::test]
    async fn list_synced_skips_local_only_meetings() {
        let (db, _temp) = setup();
        let repo = SqliteMeetingRepository::new(db);

        repo.insert(&meeting("u1", "evt-1")).await.unwrap();
        let mut local = meeting("u1", "unused");
        local.remote_event_id = None;
        repo.insert(&local).await.unwrap();

        let synced = repo.list_synced("u1").await.unwrap();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].remote_event_id.as_deref(), Some("evt-1"));
    }

    #[tokio::test]
    async fn set_bot_marks_meeting_scheduled() {
        let (db, _temp) = setup();
        let repo = SqliteMeetingRepository::new(db);

        let row = meeting("u1", "evt-1");
        repo.insert(&row).await.unwrap();
        repo.set_bot(&row.id, "bot-42", Some(r#"{"bot_name":"Scribe"}"#)).await.unwrap();

        let updated = repo.get(&row.id).await.unwrap().unwrap();
        assert_eq!(updated.bot_status, BotStatus::BotScheduled);
        assert_eq!(updated.bot_id.as_deref(), Some("bot-42"));
    }
}
