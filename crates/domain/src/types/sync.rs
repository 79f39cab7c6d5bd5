//! Sync engine result, audit log, and watch subscription types.

use serde::{Deserialize, Serialize};

use super::meeting::RemoteEvent;

/// What initiated a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Initial,
    Incremental,
    Webhook,
    Manual,
}

impl SyncType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Incremental => "incremental",
            Self::Webhook => "webhook",
            Self::Manual => "manual",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initial" => Some(Self::Initial),
            "incremental" => Some(Self::Incremental),
            "webhook" => Some(Self::Webhook),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Outcome counts for one reconciliation pass.
///
/// `errors` holds per-item failures that were logged and skipped; a batch
/// abort surfaces as `Err` from the reconciler instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Number of record classes (create/update/delete) that saw changes.
    /// Input to the scheduler's change-frequency estimate.
    #[must_use]
    pub fn changed_services(&self) -> usize {
        usize::from(self.created > 0) + usize::from(self.updated > 0) + usize::from(self.deleted > 0)
    }
}

/// Append-only audit record of one sync attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub user_id: String,
    pub sync_type: SyncType,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub success: bool,
    pub error: Option<String>,
    pub started_at: i64,
    pub finished_at: i64,
}

/// Per-(user, calendar) sync state row: the incremental cursor plus the
/// push-notification subscription metadata. At most one active watch per
/// (user, calendar), enforced by uniqueness rather than locking, so setup is
/// an upsert. The subscription fields are absent until a watch is created;
/// the cursor can exist without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSubscription {
    pub user_id: String,
    pub calendar_id: String,
    pub subscription_id: Option<String>,
    pub resource_id: Option<String>,
    pub expiration_ts: Option<i64>,
    pub sync_token: Option<String>,
    pub is_active: bool,
    pub updated_at: i64,
}

/// One page-merged delta pull from the provider.
#[derive(Debug, Clone, Default)]
pub struct DeltaPage {
    pub events: Vec<RemoteEvent>,
    /// Remote ids of deleted/cancelled events (tombstones)
    pub deletions: Vec<String>,
    pub next_token: Option<String>,
    /// True when this page set came from a bounded full-window fetch rather
    /// than an incremental pull; gates the orphan sweep.
    pub full_window: bool,
}

/// Stored OAuth refresh grant for a user's calendar account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarCredentials {
    pub user_id: String,
    pub owner_email: String,
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub expires_at: Option<i64>,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_services_counts_nonzero_classes() {
        let result =
            SyncResult { processed: 10, created: 2, updated: 0, deleted: 1, errors: vec![] };
        assert_eq!(result.changed_services(), 2);
        assert_eq!(SyncResult::default().changed_services(), 0);
    }

    #[test]
    fn sync_type_round_trips() {
        for t in [SyncType::Initial, SyncType::Incremental, SyncType::Webhook, SyncType::Manual] {
            assert_eq!(SyncType::parse(t.as_str()), Some(t));
        }
    }
}
