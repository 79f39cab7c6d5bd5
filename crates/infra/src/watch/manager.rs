//! Watch subscription lifecycle: create, renew, tear down.
//!
//! Provider channels expire on their own (typically after 7 days), so
//! teardown is best-effort everywhere: a failed provider stop is logged and
//! the local row is deactivated regardless, preventing a stuck-ACTIVE row
//! paired with a dead subscription.

use std::sync::Arc;

use chrono::Utc;
use quorum_core::{CalendarApi, CredentialProvider, SyncStateRepository};
use quorum_domain::{QuorumError, Result, SyncConfig, WatchSubscription};
use tracing::{debug, info, instrument, warn};

use crate::observability::redact_user;

/// Result of a renewal check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    /// Expiry is far enough out; nothing was done.
    Unchanged,
    /// The subscription was re-created with a fresh expiry.
    Renewed,
}

/// Manages provider watch channels and their local rows.
pub struct WatchLifecycleManager {
    api: Arc<dyn CalendarApi>,
    credentials: Arc<dyn CredentialProvider>,
    sync_state: Arc<dyn SyncStateRepository>,
    config: SyncConfig,
    webhook_address: String,
}

impl WatchLifecycleManager {
    pub fn new(
        api: Arc<dyn CalendarApi>,
        credentials: Arc<dyn CredentialProvider>,
        sync_state: Arc<dyn SyncStateRepository>,
        config: SyncConfig,
        webhook_address: String,
    ) -> Self {
        Self { api, credentials, sync_state, config, webhook_address }
    }

    /// Create (or re-create) the watch channel for `(user, calendar)`.
    ///
    /// Idempotent: the row is upserted on the (user, calendar) key, so two
    /// setups never leave two active rows. Any cursor already stored on the
    /// row is carried forward.
    #[instrument(skip(self), fields(user_id, calendar_id))]
    pub async fn setup(&self, user_id: &str, calendar_id: &str) -> Result<WatchSubscription> {
        let channel = match self.create_channel(user_id, calendar_id).await {
            Err(QuorumError::AuthExpired(reason)) => {
                debug!(reason, "token rejected during watch setup, refreshing once");
                self.credentials.force_refresh(user_id).await?;
                self.create_channel(user_id, calendar_id).await?
            }
            other => other?,
        };

        let watch = WatchSubscription {
            user_id: user_id.to_string(),
            calendar_id: calendar_id.to_string(),
            subscription_id: Some(channel.subscription_id),
            resource_id: Some(channel.resource_id),
            expiration_ts: Some(channel.expiration_ts),
            // None keeps whatever cursor the row already holds
            sync_token: None,
            is_active: true,
            updated_at: Utc::now().timestamp(),
        };
        self.sync_state.upsert_watch(&watch).await?;

        info!(
            user = %redact_user(user_id),
            expiration_ts = channel.expiration_ts,
            "watch subscription active"
        );
        Ok(watch)
    }

    /// Renew the watch when its expiry is inside the renewal threshold.
    #[instrument(skip(self), fields(user_id, calendar_id))]
    pub async fn renew(&self, user_id: &str, calendar_id: &str) -> Result<RenewOutcome> {
        let Some(state) = self.sync_state.get(user_id, calendar_id).await? else {
            return Err(QuorumError::NotFound(format!(
                "no watch state for {}",
                redact_user(user_id)
            )));
        };

        let threshold = self.config.renewal_threshold_hours * 3600;
        let now = Utc::now().timestamp();
        if state.is_active && state.expiration_ts.is_some_and(|exp| exp - now > threshold) {
            debug!(user = %redact_user(user_id), "watch expiry outside threshold, skipping renewal");
            return Ok(RenewOutcome::Unchanged);
        }

        // Stop the old channel first, best-effort
        if let (Some(subscription_id), Some(resource_id)) =
            (state.subscription_id.as_deref(), state.resource_id.as_deref())
        {
            self.stop_channel(user_id, subscription_id, resource_id).await;
        }

        self.setup(user_id, calendar_id).await?;
        Ok(RenewOutcome::Renewed)
    }

    /// Tear down the watch: best-effort provider stop, unconditional local
    /// deactivation.
    #[instrument(skip(self), fields(user_id, calendar_id))]
    pub async fn stop(&self, user_id: &str, calendar_id: &str) -> Result<()> {
        if let Some(state) = self.sync_state.get(user_id, calendar_id).await? {
            if let (Some(subscription_id), Some(resource_id)) =
                (state.subscription_id.as_deref(), state.resource_id.as_deref())
            {
                self.stop_channel(user_id, subscription_id, resource_id).await;
            }
        }

        self.sync_state.deactivate_watch(user_id, calendar_id).await?;
        info!(user = %redact_user(user_id), "watch subscription stopped");
        Ok(())
    }

    async fn create_channel(
        &self,
        user_id: &str,
        calendar_id: &str,
    ) -> Result<quorum_core::WatchChannel> {
        let token = self.credentials.valid_token(user_id).await?;
        self.api
            .create_watch(&token, calendar_id, &self.webhook_address, self.config.watch_ttl_hours)
            .await
    }

    async fn stop_channel(&self, user_id: &str, subscription_id: &str, resource_id: &str) {
        let token = match self.credentials.valid_token(user_id).await {
            Ok(token) => token,
            Err(err) => {
                warn!(user = %redact_user(user_id), error = %err, "no token for watch stop, provider will expire it");
                return;
            }
        };

        if let Err(err) = self.api.stop_watch(&token, subscription_id, resource_id).await {
            warn!(
                user = %redact_user(user_id),
                subscription_id,
                error = %err,
                "provider-side watch stop failed, provider will expire it"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use quorum_core::{EventPage, WatchChannel, WindowRange};

    use super::*;

    #[derive(Default)]
    struct FakeApi {
        create_calls: AtomicUsize,
        stop_calls: AtomicUsize,
        fail_stop: bool,
    }

    #[async_trait]
    impl CalendarApi for FakeApi {
        async fn list_window(
            &self,
            _t: &str,
            _c: &str,
            _r: WindowRange,
            _p: Option<&str>,
        ) -> Result<EventPage> {
            unreachable!("not exercised")
        }

        async fn list_delta(
            &self,
            _t: &str,
            _c: &str,
            _s: &str,
            _p: Option<&str>,
        ) -> Result<EventPage> {
            unreachable!("not exercised")
        }

        async fn mint_cursor(&self, _t: &str, _c: &str) -> Result<String> {
            unreachable!("not exercised")
        }

        async fn create_watch(
            &self,
            _t: &str,
            _c: &str,
            _a: &str,
            ttl_hours: i64,
        ) -> Result<WatchChannel> {
            let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(WatchChannel {
                subscription_id: format!("sub-{n}"),
                resource_id: format!("res-{n}"),
                expiration_ts: Utc::now().timestamp() + ttl_hours * 3600,
            })
        }

        async fn stop_watch(&self, _t: &str, _s: &str, _r: &str) -> Result<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                Err(QuorumError::Provider("stop failed".into()))
            } else {
                Ok(())
            }
        }
    }

    struct FakeCredentials;

    #[async_trait]
    impl CredentialProvider for FakeCredentials {
        async fn valid_token(&self, _user_id: &str) -> Result<String> {
            Ok("token".to_string())
        }

        async fn force_refresh(&self, _user_id: &str) -> Result<String> {
            Ok("token-fresh".to_string())
        }

        async fn owner_email(&self, _user_id: &str) -> Result<String> {
            Ok("me@example.com".to_string())
        }
    }

    #[derive(Default)]
    struct MemorySyncState {
        rows: Mutex<HashMap<(String, String), WatchSubscription>>,
    }

    #[async_trait]
    impl SyncStateRepository for MemorySyncState {
        async fn get(&self, user_id: &str, calendar_id: &str) -> Result<Option<WatchSubscription>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(&(user_id.to_string(), calendar_id.to_string()))
                .cloned())
        }

        async fn upsert_watch(&self, watch: &WatchSubscription) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let key = (watch.user_id.clone(), watch.calendar_id.clone());
            let carried = watch
                .sync_token
                .clone()
                .or_else(|| rows.get(&key).and_then(|w| w.sync_token.clone()));
            rows.insert(key, WatchSubscription { sync_token: carried, ..watch.clone() });
            Ok(())
        }

        async fn deactivate_watch(&self, user_id: &str, calendar_id: &str) -> Result<()> {
            if let Some(row) = self
                .rows
                .lock()
                .unwrap()
                .get_mut(&(user_id.to_string(), calendar_id.to_string()))
            {
                row.is_active = false;
            }
            Ok(())
        }

        async fn set_sync_token(
            &self,
            _user_id: &str,
            _calendar_id: &str,
            _token: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn clear_sync_token(&self, _user_id: &str, _calendar_id: &str) -> Result<()> {
            Ok(())
        }

        async fn find_user_by_resource(&self, _resource_id: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn active_watches(&self) -> Result<Vec<WatchSubscription>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|w| w.is_active)
                .cloned()
                .collect())
        }
    }

    fn manager(
        api: Arc<FakeApi>,
        state: Arc<MemorySyncState>,
        renewal_threshold_hours: i64,
    ) -> WatchLifecycleManager {
        WatchLifecycleManager::new(
            api,
            Arc::new(FakeCredentials),
            state,
            SyncConfig { renewal_threshold_hours, ..Default::default() },
            "https://example.com/webhooks/calendar".to_string(),
        )
    }

    #[tokio::test]
    async fn repeated_setup_keeps_single_active_watch() {
        let api = Arc::new(FakeApi::default());
        let state = Arc::new(MemorySyncState::default());
        let manager = manager(Arc::clone(&api), Arc::clone(&state), 24);

        manager.setup("u1", "primary").await.unwrap();
        manager.setup("u1", "primary").await.unwrap();

        let active = state.active_watches().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].subscription_id.as_deref(), Some("sub-2"));
    }

    #[tokio::test]
    async fn setup_preserves_stored_cursor() {
        let api = Arc::new(FakeApi::default());
        let state = Arc::new(MemorySyncState::default());
        state
            .upsert_watch(&WatchSubscription {
                user_id: "u1".to_string(),
                calendar_id: "primary".to_string(),
                subscription_id: None,
                resource_id: None,
                expiration_ts: None,
                sync_token: Some("cursor-1".to_string()),
                is_active: false,
                updated_at: 0,
            })
            .await
            .unwrap();
        let manager = manager(api, Arc::clone(&state), 24);

        manager.setup("u1", "primary").await.unwrap();

        let stored = state.get("u1", "primary").await.unwrap().unwrap();
        assert_eq!(stored.sync_token.as_deref(), Some("cursor-1"));
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn renew_is_noop_outside_threshold() {
        let api = Arc::new(FakeApi::default());
        let state = Arc::new(MemorySyncState::default());
        let manager = manager(Arc::clone(&api), state, 24);

        // Fresh setup expires in 168h, far outside the 24h threshold
        manager.setup("u1", "primary").await.unwrap();
        let outcome = manager.renew("u1", "primary").await.unwrap();

        assert_eq!(outcome, RenewOutcome::Unchanged);
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn renew_inside_threshold_stops_and_recreates() {
        let api = Arc::new(FakeApi::default());
        let state = Arc::new(MemorySyncState::default());
        state
            .upsert_watch(&WatchSubscription {
                user_id: "u1".to_string(),
                calendar_id: "primary".to_string(),
                subscription_id: Some("sub-old".to_string()),
                resource_id: Some("res-old".to_string()),
                // Expires in one hour
                expiration_ts: Some(Utc::now().timestamp() + 3600),
                sync_token: Some("cursor-1".to_string()),
                is_active: true,
                updated_at: 0,
            })
            .await
            .unwrap();
        let manager = manager(Arc::clone(&api), Arc::clone(&state), 24);

        let outcome = manager.renew("u1", "primary").await.unwrap();

        assert_eq!(outcome, RenewOutcome::Renewed);
        assert_eq!(api.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 1);

        let stored = state.get("u1", "primary").await.unwrap().unwrap();
        assert_eq!(stored.subscription_id.as_deref(), Some("sub-1"));
        assert_eq!(stored.sync_token.as_deref(), Some("cursor-1"));
    }

    #[tokio::test]
    async fn renew_survives_failed_provider_stop() {
        let api = Arc::new(FakeApi { fail_stop: true, ..Default::default() });
        let state = Arc::new(MemorySyncState::default());
        state
            .upsert_watch(&WatchSubscription {
                user_id: "u1".to_string(),
                calendar_id: "primary".to_string(),
                subscription_id: Some("sub-old".to_string()),
                resource_id: Some("res-old".to_string()),
                expiration_ts: Some(Utc::now().timestamp() + 60),
                sync_token: None,
                is_active: true,
                updated_at: 0,
            })
            .await
            .unwrap();
        let manager = manager(api, Arc::clone(&state), 24);

        let outcome = manager.renew("u1", "primary").await.unwrap();
        assert_eq!(outcome, RenewOutcome::Renewed);
    }

    #[tokio::test]
    async fn stop_deactivates_locally_even_when_provider_fails() {
        let api = Arc::new(FakeApi { fail_stop: true, ..Default::default() });
        let state = Arc::new(MemorySyncState::default());
        let manager = manager(api, Arc::clone(&state), 24);

        manager.setup("u1", "primary").await.unwrap();
        manager.stop("u1", "primary").await.unwrap();

        let stored = state.get("u1", "primary").await.unwrap().unwrap();
        assert!(!stored.is_active);
    }
}
