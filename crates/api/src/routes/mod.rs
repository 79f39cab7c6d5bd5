//! HTTP routes

pub mod meetings;
pub mod sync;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::context::AppContext;

/// Assemble the full application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(sync::health))
        .route("/webhooks/calendar", post(webhook::receive))
        .route("/users/{user_id}/sync", post(sync::sync_now))
        .route("/users/{user_id}/sync/status", get(sync::sync_status))
        .route("/users/{user_id}/activity", post(sync::record_activity))
        .route("/users/{user_id}/watch", post(sync::watch_setup).delete(sync::watch_stop))
        .route("/users/{user_id}/watch/renew", post(sync::watch_renew))
        .route("/meetings/{meeting_id}/bot", post(meetings::schedule_bot))
        .with_state(ctx)
}
