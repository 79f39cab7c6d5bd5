//! Application context (dependency injection)
//!
//! Builds the full service graph from configuration: pool → repositories →
//! provider clients → worker → schedulers. Everything downstream receives
//! `Arc<AppContext>`.

use std::sync::Arc;

use quorum_core::{
    BotGateway, CredentialProvider, CredentialsRepository, DeltaFetcher, MeetingRepository,
    Reconciler, SyncLogRepository, SyncStateRepository,
};
use quorum_domain::{Config, Result};
use quorum_infra::auth::CredentialService;
use quorum_infra::bot::select_gateway;
use quorum_infra::calendar::GoogleCalendarApi;
use quorum_infra::database::{
    DbManager, SqliteCredentialsRepository, SqliteMeetingRepository, SqliteSyncLogRepository,
    SqliteSyncStateRepository,
};
use quorum_infra::scheduling::AdaptiveSyncScheduler;
use quorum_infra::sync::SyncWorker;
use quorum_infra::watch::WatchLifecycleManager;
use tracing::info;

/// Shared application state.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub meetings: Arc<dyn MeetingRepository>,
    pub sync_state: Arc<dyn SyncStateRepository>,
    pub sync_log: Arc<dyn SyncLogRepository>,
    pub credentials_repo: Arc<dyn CredentialsRepository>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub worker: Arc<SyncWorker>,
    pub scheduler: Arc<AdaptiveSyncScheduler>,
    pub watch_manager: Arc<WatchLifecycleManager>,
    pub bot_gateway: Arc<dyn BotGateway>,
}

impl AppContext {
    /// Build the context, opening the database and probing the bot provider.
    pub async fn initialize(config: Config) -> Result<Arc<Self>> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let meetings: Arc<dyn MeetingRepository> =
            Arc::new(SqliteMeetingRepository::new(Arc::clone(&db)));
        let sync_state: Arc<dyn SyncStateRepository> =
            Arc::new(SqliteSyncStateRepository::new(Arc::clone(&db)));
        let sync_log: Arc<dyn SyncLogRepository> =
            Arc::new(SqliteSyncLogRepository::new(Arc::clone(&db)));
        let credentials_repo: Arc<dyn CredentialsRepository> =
            Arc::new(SqliteCredentialsRepository::new(Arc::clone(&db)));

        let credentials: Arc<dyn CredentialProvider> = Arc::new(CredentialService::new(
            Arc::clone(&credentials_repo),
            config.provider.clone(),
        )?);

        let api = Arc::new(GoogleCalendarApi::new(&config.provider)?);

        let fetcher = DeltaFetcher::new(
            Arc::clone(&api) as _,
            Arc::clone(&credentials),
            Arc::clone(&sync_state),
            config.sync.clone(),
        );
        let reconciler = Reconciler::new(Arc::clone(&meetings));

        let worker = Arc::new(SyncWorker::new(
            fetcher,
            reconciler,
            Arc::clone(&credentials),
            Arc::clone(&sync_state),
            Arc::clone(&sync_log),
        ));

        let scheduler =
            Arc::new(AdaptiveSyncScheduler::new(Arc::clone(&worker) as _, config.scheduler.clone()));

        let watch_manager = Arc::new(WatchLifecycleManager::new(
            api,
            Arc::clone(&credentials),
            Arc::clone(&sync_state),
            config.sync.clone(),
            config.provider.webhook_address.clone(),
        ));

        let bot_gateway = select_gateway(&config.bot).await;

        info!("application context initialised");

        Ok(Arc::new(Self {
            config,
            db,
            meetings,
            sync_state,
            sync_log,
            credentials_repo,
            credentials,
            worker,
            scheduler,
            watch_manager,
            bot_gateway,
        }))
    }
}
