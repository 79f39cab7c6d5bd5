//! Sync worker
//!
//! Orchestrates one synchronization pass for a user: delta fetch →
//! candidate extraction → reconcile → cursor advance → audit log. The
//! stored cursor only moves after the reconcile has been persisted, so a
//! failed batch replays the same window on the next tick (at-least-once;
//! the merge is idempotent).
//!
//! Reconciliation for a user is serialized through a per-user async mutex:
//! concurrent triggers queue behind the in-flight pass instead of
//! interleaving merges. Other users are unaffected.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use quorum_core::{
    extract, CredentialProvider, DeltaFetcher, Reconciler, SyncLogRepository, SyncStateRepository,
};
use quorum_domain::{Result, SyncLogEntry, SyncResult, SyncType};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::observability::redact_user;

const DEFAULT_CALENDAR_ID: &str = "primary";

/// Per-user calendar sync worker.
pub struct SyncWorker {
    fetcher: DeltaFetcher,
    reconciler: Reconciler,
    credentials: Arc<dyn CredentialProvider>,
    sync_state: Arc<dyn SyncStateRepository>,
    sync_log: Arc<dyn SyncLogRepository>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
    calendar_id: String,
}

impl SyncWorker {
    pub fn new(
        fetcher: DeltaFetcher,
        reconciler: Reconciler,
        credentials: Arc<dyn CredentialProvider>,
        sync_state: Arc<dyn SyncStateRepository>,
        sync_log: Arc<dyn SyncLogRepository>,
    ) -> Self {
        Self {
            fetcher,
            reconciler,
            credentials,
            sync_state,
            sync_log,
            user_locks: DashMap::new(),
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Perform one synchronization pass for the user.
    ///
    /// `sync_type` records what initiated the pass; a pass that turns out to
    /// be a full-window pull is logged as `initial` regardless, since that is
    /// what it did.
    #[instrument(skip(self), fields(user = %redact_user(user_id), sync_type = sync_type.as_str()))]
    pub async fn perform_sync(&self, user_id: &str, sync_type: SyncType) -> Result<SyncResult> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let started_at = Utc::now().timestamp();
        let outcome = self.sync_locked(user_id).await;

        match outcome {
            Ok((result, next_token, full_window)) => {
                if let Some(token) = next_token.as_deref() {
                    self.sync_state.set_sync_token(user_id, &self.calendar_id, token).await?;
                } else {
                    debug!("no cursor returned, leaving stored token unchanged");
                }

                let logged_type = if full_window && sync_type == SyncType::Incremental {
                    SyncType::Initial
                } else {
                    sync_type
                };
                self.append_log(user_id, logged_type, &result, None, started_at).await;

                info!(
                    processed = result.processed,
                    created = result.created,
                    updated = result.updated,
                    deleted = result.deleted,
                    item_errors = result.errors.len(),
                    "sync completed"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "sync failed");
                self.append_log(
                    user_id,
                    sync_type,
                    &SyncResult::default(),
                    Some(err.to_string()),
                    started_at,
                )
                .await;
                Err(err)
            }
        }
    }

    /// The serialized section: fetch, extract, merge.
    async fn sync_locked(
        &self,
        user_id: &str,
    ) -> Result<(SyncResult, Option<String>, bool)> {
        let owner_email = self.credentials.owner_email(user_id).await?;

        let page = self.fetcher.fetch(user_id, &self.calendar_id).await?;
        let raw_count = page.events.len() + page.deletions.len();

        let candidates: Vec<_> =
            page.events.iter().filter_map(|event| extract(event, &owner_email)).collect();

        // The sweep needs every fetched id, including events that produced
        // no candidate
        let full_window_ids: Option<HashSet<String>> = page
            .full_window
            .then(|| page.events.iter().map(|event| event.id.clone()).collect());

        let mut result = self
            .reconciler
            .reconcile(user_id, &candidates, &page.deletions, full_window_ids.as_ref())
            .await?;

        // Processed counts raw remote items, not just extractable ones
        result.processed = raw_count;

        Ok((result, page.next_token, page.full_window))
    }

    /// Audit log write. Failures here are logged, not propagated: the sync
    /// itself already succeeded or failed on its own terms.
    async fn append_log(
        &self,
        user_id: &str,
        sync_type: SyncType,
        result: &SyncResult,
        error: Option<String>,
        started_at: i64,
    ) {
        let entry = SyncLogEntry {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            sync_type,
            processed: result.processed,
            created: result.created,
            updated: result.updated,
            deleted: result.deleted,
            success: error.is_none(),
            error,
            started_at,
            finished_at: Utc::now().timestamp(),
        };

        if let Err(log_err) = self.sync_log.append(&entry).await {
            warn!(error = %log_err, "failed to append sync log entry");
        }
    }
}
