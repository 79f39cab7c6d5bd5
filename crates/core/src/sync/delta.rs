//! Token-based incremental fetch with cursor self-healing.
//!
//! With no stored cursor the fetcher performs a bounded full-window pull and
//! still ends up holding a cursor for the next incremental call, minting one
//! via a probe request when the provider withholds it from ordered list
//! calls. An invalid cursor (provider 410) falls back to a full resync; a
//! rejected access token gets exactly one forced refresh before the attempt
//! is surfaced as failed.

use std::sync::Arc;

use chrono::{Duration, Utc};
use quorum_domain::{DeltaPage, QuorumError, Result, SyncConfig};
use tracing::{debug, instrument, warn};

use super::ports::{CalendarApi, CredentialProvider, EventPage, SyncStateRepository, WindowRange};

/// Fetches one merged page-set of remote changes for a user.
pub struct DeltaFetcher {
    api: Arc<dyn CalendarApi>,
    credentials: Arc<dyn CredentialProvider>,
    sync_state: Arc<dyn SyncStateRepository>,
    config: SyncConfig,
}

impl DeltaFetcher {
    pub fn new(
        api: Arc<dyn CalendarApi>,
        credentials: Arc<dyn CredentialProvider>,
        sync_state: Arc<dyn SyncStateRepository>,
        config: SyncConfig,
    ) -> Self {
        Self { api, credentials, sync_state, config }
    }

    /// Pull all pending changes for `(user, calendar)`.
    ///
    /// The returned page carries the cursor to persist after a successful
    /// reconcile; this method never advances stored state itself except to
    /// clear a cursor the provider has declared dead.
    #[instrument(skip(self), fields(user_id, calendar_id))]
    pub async fn fetch(&self, user_id: &str, calendar_id: &str) -> Result<DeltaPage> {
        let stored_token = self
            .sync_state
            .get(user_id, calendar_id)
            .await?
            .and_then(|state| state.sync_token);

        match self.attempt(user_id, calendar_id, stored_token.as_deref()).await {
            Err(QuorumError::CursorInvalid) if stored_token.is_some() => {
                warn!(user_id, "sync cursor rejected by provider, falling back to full resync");
                self.sync_state.clear_sync_token(user_id, calendar_id).await?;
                self.attempt(user_id, calendar_id, None).await
            }
            other => other,
        }
    }

    /// One fetch attempt with a fixed cursor decision, following pagination
    /// and allowing a single re-authentication.
    async fn attempt(
        &self,
        user_id: &str,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<DeltaPage> {
        let token = self.credentials.valid_token(user_id).await?;

        match self.paged_fetch(&token, calendar_id, sync_token).await {
            Err(QuorumError::AuthExpired(reason)) => {
                debug!(user_id, reason, "access token rejected mid-fetch, refreshing once");
                let token = self.credentials.force_refresh(user_id).await?;
                self.paged_fetch(&token, calendar_id, sync_token).await
            }
            other => other,
        }
    }

    async fn paged_fetch(
        &self,
        access_token: &str,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<DeltaPage> {
        let full_window = sync_token.is_none();
        let range = self.window_range();

        let mut merged = DeltaPage { full_window, ..Default::default() };
        let mut page_token: Option<String> = None;

        loop {
            let page: EventPage = match sync_token {
                Some(cursor) => {
                    self.api
                        .list_delta(access_token, calendar_id, cursor, page_token.as_deref())
                        .await?
                }
                None => {
                    self.api
                        .list_window(access_token, calendar_id, range, page_token.as_deref())
                        .await?
                }
            };

            merged.events.extend(page.events);
            merged.deletions.extend(page.deletions);
            if page.next_sync_token.is_some() {
                merged.next_token = page.next_sync_token;
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        // Ordered window lists don't return a cursor; mint one so the next
        // pass can go incremental.
        if merged.next_token.is_none() {
            debug!(calendar_id, "no cursor returned by list call, minting via probe");
            merged.next_token = Some(self.api.mint_cursor(access_token, calendar_id).await?);
        }

        Ok(merged)
    }

    fn window_range(&self) -> WindowRange {
        let now = Utc::now();
        WindowRange {
            time_min: now - Duration::days(self.config.lookback_days),
            time_max: now + Duration::days(self.config.lookahead_days),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use quorum_domain::{RemoteEvent, WatchSubscription};

    use super::*;
    use crate::sync::ports::WatchChannel;

    #[derive(Default)]
    struct ScriptedApi {
        /// Responses consumed front-to-back by list calls
        responses: Mutex<Vec<Result<EventPage>>>,
        list_calls: AtomicUsize,
        probe_calls: AtomicUsize,
        seen_cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedApi {
        fn with_responses(responses: Vec<Result<EventPage>>) -> Self {
            Self { responses: Mutex::new(responses), ..Default::default() }
        }

        fn next_response(&self) -> Result<EventPage> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(EventPage { next_sync_token: Some("cursor-final".into()), ..Default::default() })
            } else {
                responses.remove(0)
            }
        }
    }

    #[async_trait]
    impl CalendarApi for ScriptedApi {
        async fn list_window(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            _range: WindowRange,
            _page_token: Option<&str>,
        ) -> Result<EventPage> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_cursors.lock().unwrap().push(None);
            self.next_response()
        }

        async fn list_delta(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            sync_token: &str,
            _page_token: Option<&str>,
        ) -> Result<EventPage> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_cursors.lock().unwrap().push(Some(sync_token.to_string()));
            self.next_response()
        }

        async fn mint_cursor(&self, _access_token: &str, _calendar_id: &str) -> Result<String> {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            Ok("cursor-minted".to_string())
        }

        async fn create_watch(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            _address: &str,
            _ttl_hours: i64,
        ) -> Result<WatchChannel> {
            unreachable!("not exercised")
        }

        async fn stop_watch(
            &self,
            _access_token: &str,
            _subscription_id: &str,
            _resource_id: &str,
        ) -> Result<()> {
            unreachable!("not exercised")
        }
    }

    struct StubCredentials {
        refresh_calls: AtomicUsize,
    }

    impl StubCredentials {
        fn new() -> Self {
            Self { refresh_calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl CredentialProvider for StubCredentials {
        async fn valid_token(&self, _user_id: &str) -> Result<String> {
            Ok("token-0".to_string())
        }

        async fn force_refresh(&self, _user_id: &str) -> Result<String> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            Ok("token-1".to_string())
        }

        async fn owner_email(&self, _user_id: &str) -> Result<String> {
            Ok("me@example.com".to_string())
        }
    }

    #[derive(Default)]
    struct MemorySyncState {
        token: Mutex<Option<String>>,
        cleared: AtomicUsize,
    }

    #[async_trait]
    impl SyncStateRepository for MemorySyncState {
        async fn get(&self, user_id: &str, calendar_id: &str) -> Result<Option<WatchSubscription>> {
            Ok(self.token.lock().unwrap().clone().map(|token| WatchSubscription {
                user_id: user_id.to_string(),
                calendar_id: calendar_id.to_string(),
                subscription_id: None,
                resource_id: None,
                expiration_ts: None,
                sync_token: Some(token),
                is_active: false,
                updated_at: 0,
            }))
        }

        async fn upsert_watch(&self, _watch: &WatchSubscription) -> Result<()> {
            Ok(())
        }

        async fn deactivate_watch(&self, _user_id: &str, _calendar_id: &str) -> Result<()> {
            Ok(())
        }

        async fn set_sync_token(
            &self,
            _user_id: &str,
            _calendar_id: &str,
            token: &str,
        ) -> Result<()> {
            *self.token.lock().unwrap() = Some(token.to_string());
            Ok(())
        }

        async fn clear_sync_token(&self, _user_id: &str, _calendar_id: &str) -> Result<()> {
            self.cleared.fetch_add(1, Ordering::SeqCst);
            *self.token.lock().unwrap() = None;
            Ok(())
        }

        async fn find_user_by_resource(&self, _resource_id: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn active_watches(&self) -> Result<Vec<WatchSubscription>> {
            Ok(Vec::new())
        }
    }

    fn fetcher(
        api: Arc<ScriptedApi>,
        credentials: Arc<StubCredentials>,
        state: Arc<MemorySyncState>,
    ) -> DeltaFetcher {
        DeltaFetcher::new(api, credentials, state, SyncConfig::default())
    }

    fn event(id: &str) -> RemoteEvent {
        RemoteEvent { id: id.to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn full_window_merges_pages_and_keeps_cursor() {
        let api = Arc::new(ScriptedApi::with_responses(vec![
            Ok(EventPage {
                events: vec![event("a")],
                next_page_token: Some("page-2".into()),
                ..Default::default()
            }),
            Ok(EventPage {
                events: vec![event("b")],
                next_sync_token: Some("cursor-1".into()),
                ..Default::default()
            }),
        ]));
        let state = Arc::new(MemorySyncState::default());
        let fetcher = fetcher(Arc::clone(&api), Arc::new(StubCredentials::new()), state);

        let page = fetcher.fetch("u1", "primary").await.unwrap();

        assert!(page.full_window);
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.next_token.as_deref(), Some("cursor-1"));
        // Cursor came from the list call itself, no probe needed
        assert_eq!(api.probe_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn window_without_cursor_mints_one_via_probe() {
        let api = Arc::new(ScriptedApi::with_responses(vec![Ok(EventPage {
            events: vec![event("a")],
            ..Default::default()
        })]));
        let state = Arc::new(MemorySyncState::default());
        let fetcher = fetcher(Arc::clone(&api), Arc::new(StubCredentials::new()), state);

        let page = fetcher.fetch("u1", "primary").await.unwrap();

        assert_eq!(page.next_token.as_deref(), Some("cursor-minted"));
        assert_eq!(api.probe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_cursor_falls_back_to_full_resync() {
        let api = Arc::new(ScriptedApi::with_responses(vec![
            Err(QuorumError::CursorInvalid),
            Ok(EventPage {
                events: vec![event("a")],
                next_sync_token: Some("cursor-fresh".into()),
                ..Default::default()
            }),
        ]));
        let state = Arc::new(MemorySyncState::default());
        *state.token.lock().unwrap() = Some("cursor-stale".to_string());
        let fetcher = fetcher(Arc::clone(&api), Arc::new(StubCredentials::new()), Arc::clone(&state));

        let page = fetcher.fetch("u1", "primary").await.unwrap();

        assert!(page.full_window, "fallback pull must be a full window");
        assert_eq!(page.next_token.as_deref(), Some("cursor-fresh"));
        assert_eq!(state.cleared.load(Ordering::SeqCst), 1);

        // The stale cursor was used once, then never retried
        let cursors = api.seen_cursors.lock().unwrap().clone();
        assert_eq!(cursors, vec![Some("cursor-stale".to_string()), None]);
    }

    #[tokio::test]
    async fn auth_expiry_refreshes_exactly_once() {
        let api = Arc::new(ScriptedApi::with_responses(vec![
            Err(QuorumError::AuthExpired("401".into())),
            Ok(EventPage {
                events: vec![event("a")],
                next_sync_token: Some("cursor-1".into()),
                ..Default::default()
            }),
        ]));
        let credentials = Arc::new(StubCredentials::new());
        let state = Arc::new(MemorySyncState::default());
        let fetcher = fetcher(api, Arc::clone(&credentials), state);

        let page = fetcher.fetch("u1", "primary").await.unwrap();

        assert_eq!(page.events.len(), 1);
        assert_eq!(credentials.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_auth_expiry_is_terminal() {
        let api = Arc::new(ScriptedApi::with_responses(vec![
            Err(QuorumError::AuthExpired("401".into())),
            Err(QuorumError::AuthExpired("401 again".into())),
        ]));
        let credentials = Arc::new(StubCredentials::new());
        let state = Arc::new(MemorySyncState::default());
        let fetcher = fetcher(api, Arc::clone(&credentials), state);

        let err = fetcher.fetch("u1", "primary").await.unwrap_err();

        assert!(matches!(err, QuorumError::AuthExpired(_)));
        assert_eq!(credentials.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_provider_failure_leaves_cursor_untouched() {
        let api = Arc::new(ScriptedApi::with_responses(vec![Err(QuorumError::Provider(
            "503".into(),
        ))]));
        let state = Arc::new(MemorySyncState::default());
        *state.token.lock().unwrap() = Some("cursor-keep".to_string());
        let fetcher = fetcher(api, Arc::new(StubCredentials::new()), Arc::clone(&state));

        let err = fetcher.fetch("u1", "primary").await.unwrap_err();

        assert!(matches!(err, QuorumError::Provider(_)));
        assert_eq!(state.token.lock().unwrap().as_deref(), Some("cursor-keep"));
    }
}
