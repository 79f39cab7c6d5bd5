//! Merge of remote candidates into the local meeting store.
//!
//! Remote-owned fields (title, times, url, attendee status) flow freely from
//! the provider; bot-owned fields (`bot_status`, `bot_id`, configuration)
//! are written once at creation and never touched again by this module. When
//! a remote event disappears, the record is deleted only if no recording is
//! in flight; otherwise it is soft-cancelled so captured transcript state
//! survives.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use quorum_domain::{BotStatus, CandidateMeeting, Meeting, Result, SyncResult};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::ports::MeetingRepository;

/// Merges candidate batches and deletions into the meeting store.
///
/// Reconciliation for a given user is logically single-writer; callers hold
/// the per-user lock around `reconcile`. The merge itself is idempotent, so
/// replaying a window after a failed batch is safe.
pub struct Reconciler {
    meetings: Arc<dyn MeetingRepository>,
}

impl Reconciler {
    pub fn new(meetings: Arc<dyn MeetingRepository>) -> Self {
        Self { meetings }
    }

    /// Apply one batch of candidates and tombstones.
    ///
    /// `full_window_ids` carries the complete remote-id set of a full-window
    /// pull and enables the orphan sweep; incremental pulls pass `None`
    /// because a partial id set cannot safely imply deletion.
    ///
    /// Per-item persistence failures are recorded in `SyncResult::errors`
    /// and skipped; an error returned from this method means the batch was
    /// aborted and the stored cursor must not advance.
    #[instrument(skip_all, fields(user_id, candidates = candidates.len(), deletions = deletions.len()))]
    pub async fn reconcile(
        &self,
        user_id: &str,
        candidates: &[CandidateMeeting],
        deletions: &[String],
        full_window_ids: Option<&HashSet<String>>,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::default();

        for candidate in candidates {
            if let Err(err) = self.apply_candidate(user_id, candidate, &mut result).await {
                warn!(
                    remote_event_id = %candidate.remote_event_id,
                    error = %err,
                    "failed to persist candidate, continuing batch"
                );
                result.errors.push(format!("{}: {err}", candidate.remote_event_id));
            }
        }

        for remote_event_id in deletions {
            if let Err(err) = self.apply_deletion(user_id, remote_event_id, &mut result).await {
                warn!(
                    remote_event_id = %remote_event_id,
                    error = %err,
                    "failed to apply deletion, continuing batch"
                );
                result.errors.push(format!("{remote_event_id}: {err}"));
            }
        }

        if let Some(remote_ids) = full_window_ids {
            self.sweep_orphans(user_id, remote_ids, &mut result).await?;
        }

        result.processed = candidates.len() + deletions.len();
        Ok(result)
    }

    async fn apply_candidate(
        &self,
        user_id: &str,
        candidate: &CandidateMeeting,
        result: &mut SyncResult,
    ) -> Result<()> {
        match self.meetings.find_by_remote_event(user_id, &candidate.remote_event_id).await? {
            Some(existing) => {
                self.meetings.update_remote_fields(&existing.id, candidate).await?;
                result.updated += 1;
            }
            None => {
                let now = Utc::now().timestamp();
                let meeting = Meeting {
                    id: Uuid::now_v7().to_string(),
                    user_id: user_id.to_string(),
                    project_id: None,
                    remote_event_id: Some(candidate.remote_event_id.clone()),
                    title: candidate.title.clone(),
                    description: candidate.description.clone(),
                    meeting_url: Some(candidate.meeting_url.clone()),
                    start_ts: candidate.start_ts,
                    end_ts: candidate.end_ts,
                    event_status: candidate.event_status,
                    bot_status: BotStatus::Pending,
                    bot_id: None,
                    bot_config_json: None,
                    created_at: now,
                    updated_at: now,
                };
                self.meetings.insert(&meeting).await?;
                result.created += 1;
            }
        }
        Ok(())
    }

    /// Remove or soft-cancel the meeting behind a vanished remote event.
    async fn apply_deletion(
        &self,
        user_id: &str,
        remote_event_id: &str,
        result: &mut SyncResult,
    ) -> Result<()> {
        let Some(existing) = self.meetings.find_by_remote_event(user_id, remote_event_id).await?
        else {
            // Tombstone for an event we never stored (no URL, or already gone)
            return Ok(());
        };

        self.remove_or_cancel(&existing, result).await
    }

    /// After a full-window pull, any stored meeting whose remote id was not
    /// in the fetched set is an implicit deletion.
    async fn sweep_orphans(
        &self,
        user_id: &str,
        remote_ids: &HashSet<String>,
        result: &mut SyncResult,
    ) -> Result<()> {
        for meeting in self.meetings.list_synced(user_id).await? {
            let Some(remote_event_id) = meeting.remote_event_id.as_deref() else {
                continue;
            };
            if remote_ids.contains(remote_event_id) {
                continue;
            }

            debug!(meeting_id = %meeting.id, remote_event_id, "orphaned meeting");
            if let Err(err) = self.remove_or_cancel(&meeting, result).await {
                warn!(meeting_id = %meeting.id, error = %err, "orphan cleanup failed");
                result.errors.push(format!("{remote_event_id}: {err}"));
            }
        }
        Ok(())
    }

    async fn remove_or_cancel(&self, meeting: &Meeting, result: &mut SyncResult) -> Result<()> {
        if meeting.bot_status.is_active_recording() {
            // A bot is in the meeting; keep the row so transcript state
            // already captured is not destroyed.
            self.meetings.soft_cancel(&meeting.id).await?;
        } else {
            self.meetings.delete(&meeting.id).await?;
        }
        result.deleted += 1;
        Ok(())
    }
}
