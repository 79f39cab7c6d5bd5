//! Webhook receiver for provider push notifications.
//!
//! Push notifications carry no event payload, only a cue to pull: the
//! channel/resource headers identify the watch, and the owning user is
//! resolved from the stored subscription row. The handler always returns
//! 200 so the provider does not retry; unresolvable cues are logged and
//! dropped.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, info, warn};

use crate::context::AppContext;

const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
const RESOURCE_ID_HEADER: &str = "x-goog-resource-id";
const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";

pub async fn receive(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> StatusCode {
    let channel_id = header_value(&headers, CHANNEL_ID_HEADER);
    let resource_id = header_value(&headers, RESOURCE_ID_HEADER);
    let resource_state = header_value(&headers, RESOURCE_STATE_HEADER);

    let Some(resource_id) = resource_id else {
        warn!("push notification without resource id, ignoring");
        return StatusCode::OK;
    };

    // The provider sends a "sync" ping when the channel is created; nothing
    // has changed yet
    if resource_state.as_deref() == Some("sync") {
        debug!(channel_id, "watch channel confirmed");
        return StatusCode::OK;
    }

    match ctx.sync_state.find_user_by_resource(&resource_id).await {
        Ok(Some(user_id)) => {
            info!(channel_id, "push notification received, enqueueing incremental sync");
            ctx.scheduler.trigger_webhook(&user_id).await;
        }
        Ok(None) => {
            warn!(channel_id, "push notification for unknown resource, ignoring");
        }
        Err(err) => {
            warn!(error = %err, "failed to resolve push notification owner");
        }
    }

    StatusCode::OK
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(String::from)
}
