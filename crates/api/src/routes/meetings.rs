//! Bot scheduling endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use quorum_domain::{BotJobConfig, QuorumError};
use serde::Serialize;

use crate::context::AppContext;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ScheduleBotResponse {
    pub bot_id: String,
}

/// Deploy a transcription bot to a meeting. Sets `bot_status` to
/// `bot_scheduled`; every later transition arrives from the bot provider.
pub async fn schedule_bot(
    State(ctx): State<Arc<AppContext>>,
    Path(meeting_id): Path<String>,
    Json(config): Json<BotJobConfig>,
) -> Result<Json<ScheduleBotResponse>, ApiError> {
    let meeting = ctx
        .meetings
        .get(&meeting_id)
        .await?
        .ok_or_else(|| QuorumError::NotFound(format!("meeting {meeting_id}")))?;

    let meeting_url = meeting.meeting_url.ok_or_else(|| {
        QuorumError::InvalidInput(format!("meeting {meeting_id} has no meeting URL"))
    })?;

    let bot_id = ctx.bot_gateway.schedule_bot(&meeting_url, &config).await?;

    let config_json = serde_json::to_string(&config)
        .map_err(|e| QuorumError::Internal(format!("failed to serialise bot config: {e}")))?;
    ctx.meetings.set_bot(&meeting_id, &bot_id, Some(&config_json)).await?;

    Ok(Json(ScheduleBotResponse { bot_id }))
}
