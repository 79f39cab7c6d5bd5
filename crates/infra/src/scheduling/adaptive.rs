//! Adaptive per-user sync scheduling.
//!
//! One actor per active user, owned by an explicit registry with start/stop
//! lifecycle: no ambient process-wide state. Each actor runs a timer loop
//! whose interval is re-selected from the polling policy after every signal
//! and every completed sync.
//!
//! Trigger semantics:
//! - `app_load` / `calendar_view` → immediate sync; coalesced when an
//!   equivalent trigger is already pending
//! - `meeting_create` → debounced sync, batching rapid-fire edits
//! - `general` → interval re-evaluation only
//! - webhook cues enqueue an incremental sync and count as activity
//!
//! Stopping a user cancels the timer and any pending debounce task but lets
//! an in-flight reconcile finish, avoiding partial writes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use quorum_core::{classify_change_frequency, select_interval};
use quorum_domain::{
    ActivitySignal, Result, SchedulerConfig, SyncResult, SyncType, UserActivityState,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::observability::redact_user;
use crate::sync::SyncWorker;

/// Executes one sync pass. Split out as a trait so the scheduler can be
/// exercised without the full worker stack.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    async fn perform_sync(&self, user_id: &str, sync_type: SyncType) -> Result<SyncResult>;
}

#[async_trait]
impl SyncExecutor for SyncWorker {
    async fn perform_sync(&self, user_id: &str, sync_type: SyncType) -> Result<SyncResult> {
        SyncWorker::perform_sync(self, user_id, sync_type).await
    }
}

struct UserSyncHandle {
    state: Arc<Mutex<UserActivityState>>,
    trigger_tx: mpsc::Sender<SyncType>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

/// Registry of per-user sync actors.
pub struct AdaptiveSyncScheduler {
    executor: Arc<dyn SyncExecutor>,
    config: SchedulerConfig,
    users: DashMap<String, Arc<UserSyncHandle>>,
}

impl AdaptiveSyncScheduler {
    pub fn new(executor: Arc<dyn SyncExecutor>, config: SchedulerConfig) -> Self {
        Self { executor, config, users: DashMap::new() }
    }

    /// Look up the user's actor, starting one on first contact.
    fn ensure_user(&self, user_id: &str) -> Arc<UserSyncHandle> {
        if let Some(handle) = self.users.get(user_id) {
            return handle.clone();
        }

        let handle = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| self.spawn_user(user_id))
            .clone();
        handle
    }

    fn spawn_user(&self, user_id: &str) -> Arc<UserSyncHandle> {
        // Capacity 1: a second equivalent trigger while one is pending is
        // coalesced, not queued
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let state = Arc::new(Mutex::new(UserActivityState::default()));

        let task = tokio::spawn(Self::run_loop(
            user_id.to_string(),
            Arc::clone(&self.executor),
            self.config.clone(),
            Arc::clone(&state),
            trigger_rx,
            cancel.clone(),
        ));

        info!(user = %redact_user(user_id), "started sync actor");

        Arc::new(UserSyncHandle {
            state,
            trigger_tx,
            cancel,
            task: Mutex::new(Some(task)),
            debounce: Mutex::new(None),
        })
    }

    /// Feed an activity signal into the user's actor, starting it on first
    /// contact.
    #[instrument(skip(self), fields(user = %redact_user(user_id), ?signal))]
    pub async fn record_activity(&self, user_id: &str, signal: ActivitySignal) {
        let handle = self.ensure_user(user_id);

        {
            let mut state = handle.state.lock().await;
            let now = Utc::now();
            state.touch(now);
            state.current_interval = select_interval(&state, &self.config, now);
        }

        match signal {
            ActivitySignal::AppLoad | ActivitySignal::CalendarView => {
                Self::send_coalesced(&handle.trigger_tx, SyncType::Incremental, user_id);
            }
            ActivitySignal::MeetingCreate => {
                self.schedule_debounced(user_id, &handle).await;
            }
            ActivitySignal::General => {
                // Interval was re-evaluated above; nothing to trigger
            }
        }
    }

    /// Webhook cue: enqueue an incremental sync, counted as activity.
    #[instrument(skip(self), fields(user = %redact_user(user_id)))]
    pub async fn trigger_webhook(&self, user_id: &str) {
        let handle = self.ensure_user(user_id);

        {
            let mut state = handle.state.lock().await;
            let now = Utc::now();
            state.touch(now);
            state.current_interval = select_interval(&state, &self.config, now);
        }

        Self::send_coalesced(&handle.trigger_tx, SyncType::Webhook, user_id);
    }

    /// Snapshot of the user's scheduler state, if an actor is running.
    pub async fn user_state(&self, user_id: &str) -> Option<UserActivityState> {
        let handle = self.users.get(user_id)?.clone();
        let snapshot = handle.state.lock().await.clone();
        Some(snapshot)
    }

    /// Stop the user's actor: cancel timer and debounce, let an in-flight
    /// sync finish, then drop the registry entry.
    #[instrument(skip(self), fields(user = %redact_user(user_id)))]
    pub async fn stop_user(&self, user_id: &str) {
        let Some((_, handle)) = self.users.remove(user_id) else {
            return;
        };

        handle.cancel.cancel();
        if let Some(debounce) = handle.debounce.lock().await.take() {
            debounce.abort();
        }

        if let Some(task) = handle.task.lock().await.take() {
            // The loop exits after any in-flight sync completes; bound the
            // wait so shutdown cannot hang on a stuck provider call
            if tokio::time::timeout(Duration::from_secs(30), task).await.is_err() {
                warn!(user = %redact_user(user_id), "sync actor did not stop in time, detaching");
            }
        }

        info!(user = %redact_user(user_id), "stopped sync actor");
    }

    /// Stop every actor (process shutdown).
    pub async fn shutdown(&self) {
        let user_ids: Vec<String> = self.users.iter().map(|e| e.key().clone()).collect();
        for user_id in user_ids {
            self.stop_user(&user_id).await;
        }
    }

    fn send_coalesced(tx: &mpsc::Sender<SyncType>, sync_type: SyncType, user_id: &str) {
        match tx.try_send(sync_type) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(user = %redact_user(user_id), "sync already pending, trigger coalesced");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(user = %redact_user(user_id), "sync actor gone, trigger dropped");
            }
        }
    }

    async fn schedule_debounced(&self, user_id: &str, handle: &Arc<UserSyncHandle>) {
        let mut debounce = handle.debounce.lock().await;

        // Restart the window on every edit
        if let Some(previous) = debounce.take() {
            previous.abort();
        }

        let tx = handle.trigger_tx.clone();
        let delay = Duration::from_secs(self.config.debounce_secs);
        let user = user_id.to_string();
        *debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Self::send_coalesced(&tx, SyncType::Incremental, &user);
        }));
    }

    async fn run_loop(
        user_id: String,
        executor: Arc<dyn SyncExecutor>,
        config: SchedulerConfig,
        state: Arc<Mutex<UserActivityState>>,
        mut trigger_rx: mpsc::Receiver<SyncType>,
        cancel: CancellationToken,
    ) {
        loop {
            let interval = {
                let state = state.lock().await;
                state.current_interval.duration(&config)
            };

            // Cancellation is only observed between syncs; an in-flight pass
            // below runs to completion
            let trigger = tokio::select! {
                _ = cancel.cancelled() => break,
                trigger = trigger_rx.recv() => trigger,
                _ = tokio::time::sleep(interval) => Some(SyncType::Incremental),
            };
            let Some(sync_type) = trigger else {
                break;
            };

            match executor.perform_sync(&user_id, sync_type).await {
                Ok(result) => {
                    let mut state = state.lock().await;
                    let now = Utc::now();
                    state.last_sync_at = Some(now);
                    state.change_frequency = classify_change_frequency(result.changed_services());
                    state.current_interval = select_interval(&state, &config, now);
                    debug!(
                        user = %redact_user(&user_id),
                        ?state.change_frequency,
                        ?state.current_interval,
                        "sync pass complete, cadence re-evaluated"
                    );
                }
                Err(err) => {
                    // Transient failures ride the next tick; terminal ones
                    // (not connected) still shouldn't hot-loop the actor
                    warn!(user = %redact_user(&user_id), error = %err, "scheduled sync failed");
                }
            }
        }

        debug!(user = %redact_user(&user_id), "sync actor loop exited");
    }
}
