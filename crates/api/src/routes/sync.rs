//! Manual trigger API: sync now, sync status, activity signals, watch
//! lifecycle. These return the same result shapes as the internal calls.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use quorum_domain::{ActivitySignal, SyncLogEntry, SyncResult, SyncType, WatchSubscription};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::AppContext;
use crate::error::ApiError;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Result<StatusCode, ApiError> {
    ctx.db.health_check()?;
    Ok(StatusCode::OK)
}

/// Synchronous "sync now" for operator/debug use.
pub async fn sync_now(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> Result<Json<SyncResult>, ApiError> {
    let result = ctx.worker.perform_sync(&user_id, SyncType::Manual).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub last_sync: Option<SyncLogEntry>,
    pub watch: Option<WatchSubscription>,
    pub connected: bool,
}

pub async fn sync_status(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let last_sync = ctx.sync_log.latest_for_user(&user_id).await?;
    let watch = ctx.sync_state.get(&user_id, "primary").await?;
    let connected = ctx.credentials_repo.get(&user_id).await?.is_some();

    Ok(Json(SyncStatusResponse { last_sync, watch, connected }))
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub signal: ActivitySignal,
}

/// Activity signal ingestion feeding the adaptive scheduler.
pub async fn record_activity(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
    Json(request): Json<ActivityRequest>,
) -> StatusCode {
    ctx.scheduler.record_activity(&user_id, request.signal).await;
    StatusCode::ACCEPTED
}

pub async fn watch_setup(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> Result<Json<WatchSubscription>, ApiError> {
    let watch = ctx.watch_manager.setup(&user_id, "primary").await?;
    Ok(Json(watch))
}

#[derive(Debug, Serialize)]
pub struct RenewResponse {
    pub renewed: bool,
}

pub async fn watch_renew(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> Result<Json<RenewResponse>, ApiError> {
    let outcome = ctx.watch_manager.renew(&user_id, "primary").await?;
    Ok(Json(RenewResponse {
        renewed: outcome == quorum_infra::watch::RenewOutcome::Renewed,
    }))
}

pub async fn watch_stop(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.watch_manager.stop(&user_id, "primary").await?;
    // The user signed off push notifications; wind the actor down too
    ctx.scheduler.stop_user(&user_id).await;
    info!("watch stopped via API");
    Ok(StatusCode::NO_CONTENT)
}
