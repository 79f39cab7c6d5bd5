//! Watch renewal scheduler.
//!
//! Cron-driven sweep over all active watch subscriptions, renewing any whose
//! expiry has entered the renewal threshold. Join handles are tracked,
//! cancellation is explicit, and every asynchronous operation is wrapped in
//! a timeout.

use std::sync::Arc;
use std::time::Duration;

use quorum_core::SyncStateRepository;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::redact_user;
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::watch::{RenewOutcome, WatchLifecycleManager};

/// Configuration for the renewal scheduler.
#[derive(Debug, Clone)]
pub struct WatchRenewalSchedulerConfig {
    /// Cron expression describing the sweep schedule.
    pub cron_expression: String,
    /// Timeout applied to a single sweep execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for WatchRenewalSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 0 * * * *".into(), // hourly
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Watch renewal scheduler with explicit lifecycle management.
pub struct WatchRenewalScheduler {
    scheduler: Option<JobScheduler>,
    config: WatchRenewalSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    watch_manager: Arc<WatchLifecycleManager>,
    sync_state: Arc<dyn SyncStateRepository>,
}

impl WatchRenewalScheduler {
    pub fn new(
        config: WatchRenewalSchedulerConfig,
        watch_manager: Arc<WatchLifecycleManager>,
        sync_state: Arc<dyn SyncStateRepository>,
    ) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            watch_manager,
            sync_state,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { duration: start_timeout })?;

        start_result.map_err(|source| SchedulerError::StartFailed(source.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("watch renewal monitor cancelled");
        });
        self.monitor_handle = Some(handle);

        info!("watch renewal scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|_| SchedulerError::Timeout { duration: stop_timeout })?;

        stop_result.map_err(|source| SchedulerError::StopFailed(source.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration: join_timeout })??;
        }

        info!("watch renewal scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed(source.to_string()))?;

        let cron_expr = self.config.cron_expression.clone();
        let job_timeout = self.config.job_timeout;
        let watch_manager = Arc::clone(&self.watch_manager);
        let sync_state = Arc::clone(&self.sync_state);

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let watch_manager = Arc::clone(&watch_manager);
            let sync_state = Arc::clone(&sync_state);

            Box::pin(async move {
                match tokio::time::timeout(
                    job_timeout,
                    Self::sweep(watch_manager, sync_state),
                )
                .await
                {
                    Ok(Ok(renewed)) => {
                        debug!(renewed, "watch renewal sweep finished");
                    }
                    Ok(Err(err)) => {
                        error!(error = %err, "watch renewal sweep failed");
                    }
                    Err(_) => {
                        warn!(timeout_secs = job_timeout.as_secs(), "watch renewal sweep timed out");
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        debug!(cron = %self.config.cron_expression, "registered watch renewal job");
        Ok(scheduler)
    }

    /// Renew every active watch inside the threshold. Per-user failures are
    /// logged and do not stop the sweep.
    async fn sweep(
        watch_manager: Arc<WatchLifecycleManager>,
        sync_state: Arc<dyn SyncStateRepository>,
    ) -> quorum_domain::Result<usize> {
        let watches = sync_state.active_watches().await?;
        if watches.is_empty() {
            debug!("no active watches to renew");
            return Ok(0);
        }

        let mut renewed = 0;
        let mut errors = 0;

        for watch in &watches {
            match watch_manager.renew(&watch.user_id, &watch.calendar_id).await {
                Ok(RenewOutcome::Renewed) => renewed += 1,
                Ok(RenewOutcome::Unchanged) => {}
                Err(err) => {
                    errors += 1;
                    warn!(
                        user = %redact_user(&watch.user_id),
                        error = %err,
                        "watch renewal failed, will retry next sweep"
                    );
                }
            }
        }

        info!(total = watches.len(), renewed, errors, "watch renewal sweep completed");
        Ok(renewed)
    }
}

impl Drop for WatchRenewalScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("WatchRenewalScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
