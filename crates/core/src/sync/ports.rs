//! Port interfaces implemented by the infrastructure layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quorum_domain::{
    BotJobConfig, CalendarCredentials, CandidateMeeting, Meeting, RemoteEvent, Result,
    SyncLogEntry, WatchSubscription,
};

/// Bounded time window for a full (non-incremental) fetch.
#[derive(Debug, Clone, Copy)]
pub struct WindowRange {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

/// One page of the provider's event list.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<RemoteEvent>,
    /// Tombstones: remote ids of deleted/cancelled events
    pub deletions: Vec<String>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

/// Provider push-notification channel returned by watch creation.
#[derive(Debug, Clone)]
pub struct WatchChannel {
    pub subscription_id: String,
    pub resource_id: String,
    pub expiration_ts: i64,
}

/// Meeting store operations used by the reconciler.
///
/// `update_remote_fields` is the only update path reconciliation is allowed
/// to take on an existing row; its implementation must write remote-owned
/// columns only, so bot-owned state cannot be clobbered by construction.
#[async_trait]
pub trait MeetingRepository: Send + Sync {
    async fn find_by_remote_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
    ) -> Result<Option<Meeting>>;

    async fn insert(&self, meeting: &Meeting) -> Result<()>;

    /// Overwrite remote-owned fields (title, description, url, times,
    /// event_status) of an existing meeting.
    async fn update_remote_fields(&self, id: &str, candidate: &CandidateMeeting) -> Result<()>;

    /// Soft-cancel: `event_status = declined`, `bot_status = failed`.
    /// Used instead of deletion when a recording is in flight.
    async fn soft_cancel(&self, id: &str) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Meeting>>;

    /// All meetings for the user that carry a `remote_event_id`; input to the
    /// orphan sweep after a full-window pull.
    async fn list_synced(&self, user_id: &str) -> Result<Vec<Meeting>>;

    /// Record a scheduled bot on a meeting (bot-owned write path).
    async fn set_bot(&self, id: &str, bot_id: &str, config_json: Option<&str>) -> Result<()>;
}

/// Per-(user, calendar) cursor + watch metadata store.
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    async fn get(&self, user_id: &str, calendar_id: &str) -> Result<Option<WatchSubscription>>;

    /// Upsert keyed on (user, calendar); creation must be idempotent.
    async fn upsert_watch(&self, watch: &WatchSubscription) -> Result<()>;

    /// Mark the watch inactive, keeping the stored cursor.
    async fn deactivate_watch(&self, user_id: &str, calendar_id: &str) -> Result<()>;

    async fn set_sync_token(&self, user_id: &str, calendar_id: &str, token: &str) -> Result<()>;

    async fn clear_sync_token(&self, user_id: &str, calendar_id: &str) -> Result<()>;

    /// Resolve the owning user of a push notification by resource id.
    async fn find_user_by_resource(&self, resource_id: &str) -> Result<Option<String>>;

    /// All rows with an active watch, for the renewal sweep.
    async fn active_watches(&self) -> Result<Vec<WatchSubscription>>;
}

/// Append-only sync audit log.
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    async fn append(&self, entry: &SyncLogEntry) -> Result<()>;

    async fn latest_for_user(&self, user_id: &str) -> Result<Option<SyncLogEntry>>;

    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<SyncLogEntry>>;
}

/// Stored OAuth refresh grants.
#[async_trait]
pub trait CredentialsRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<CalendarCredentials>>;

    async fn upsert(&self, credentials: &CalendarCredentials) -> Result<()>;

    async fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expires_at: i64,
    ) -> Result<()>;

    async fn delete(&self, user_id: &str) -> Result<()>;
}

/// Raw calendar provider API. Implementations map provider status codes to
/// the domain error taxonomy (410 → `CursorInvalid`, 401 → `AuthExpired`,
/// 5xx → `Provider`) so callers can branch without knowing HTTP.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Bounded-window list call (no cursor).
    async fn list_window(
        &self,
        access_token: &str,
        calendar_id: &str,
        range: WindowRange,
        page_token: Option<&str>,
    ) -> Result<EventPage>;

    /// Incremental list call including tombstones for deleted events.
    async fn list_delta(
        &self,
        access_token: &str,
        calendar_id: &str,
        sync_token: &str,
        page_token: Option<&str>,
    ) -> Result<EventPage>;

    /// Minimal probe whose sole purpose is to mint a fresh cursor when a
    /// window list did not hand one back.
    async fn mint_cursor(&self, access_token: &str, calendar_id: &str) -> Result<String>;

    async fn create_watch(
        &self,
        access_token: &str,
        calendar_id: &str,
        address: &str,
        ttl_hours: i64,
    ) -> Result<WatchChannel>;

    /// Provider-side channel teardown. Callers treat failures as non-fatal.
    async fn stop_watch(
        &self,
        access_token: &str,
        subscription_id: &str,
        resource_id: &str,
    ) -> Result<()>;
}

/// Supplies a valid bearer token for the calendar API, transparently
/// refreshing expired tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current access token, proactively refreshed when the stored expiry
    /// has passed.
    async fn valid_token(&self, user_id: &str) -> Result<String>;

    /// Unconditional refresh, used reactively after the provider rejects a
    /// token mid-flight.
    async fn force_refresh(&self, user_id: &str) -> Result<String>;

    /// Email of the credential owner; used for organizer matching.
    async fn owner_email(&self, user_id: &str) -> Result<String>;
}

/// Meeting bot provider. Write-only from the engine's perspective: bot
/// status transitions past `bot_scheduled` arrive independently.
#[async_trait]
pub trait BotGateway: Send + Sync {
    async fn schedule_bot(&self, meeting_url: &str, config: &BotJobConfig) -> Result<String>;

    /// Capability probe used to select between gateway implementations.
    async fn health_check(&self) -> bool;
}
