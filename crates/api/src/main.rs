//! Quorum entry point: configuration, context wiring, background
//! schedulers, HTTP server with graceful shutdown.

use quorum_api::{router, AppContext};
use quorum_infra::scheduling::{WatchRenewalScheduler, WatchRenewalSchedulerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = quorum_infra::config::load()?;
    let bind_addr = config.bind_addr.clone();
    let renewal_cron = config.sync.renewal_cron.clone();

    let ctx = AppContext::initialize(config).await?;

    let mut renewal = WatchRenewalScheduler::new(
        WatchRenewalSchedulerConfig { cron_expression: renewal_cron, ..Default::default() },
        ctx.watch_manager.clone(),
        ctx.sync_state.clone(),
    );
    renewal.start().await?;

    let app = router(ctx.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Let in-flight reconciles finish before exit
    ctx.scheduler.shutdown().await;
    if let Err(err) = renewal.stop().await {
        tracing::warn!(error = %err, "watch renewal scheduler did not stop cleanly");
    }

    info!("shutdown complete");
    Ok(())
}
