//! Adaptive scheduler signal and state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;

/// Inbound activity signal feeding the adaptive scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySignal {
    /// App start / foreground; triggers an immediate sync
    AppLoad,
    /// User is looking at the calendar; triggers an immediate sync
    CalendarView,
    /// Meeting created or edited; triggers a debounced sync
    MeetingCreate,
    /// Any other activity; re-evaluates the interval only
    General,
}

/// Recent change volume classification, derived from completed sync results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeFrequency {
    Low,
    Medium,
    High,
}

/// Polling cadence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncInterval {
    Fast,
    Normal,
    Slow,
}

impl SyncInterval {
    /// Concrete duration for this tier under the given configuration.
    #[must_use]
    pub fn duration(self, config: &SchedulerConfig) -> std::time::Duration {
        let secs = match self {
            Self::Fast => config.fast_interval_secs,
            Self::Normal => config.normal_interval_secs,
            Self::Slow => config.slow_interval_secs,
        };
        std::time::Duration::from_secs(secs)
    }
}

/// Per-user scheduler state. Process-local and rebuildable: losing it on
/// restart resets the user to `Low`/`Normal`, which the next completed sync
/// corrects.
#[derive(Debug, Clone)]
pub struct UserActivityState {
    pub last_activity_at: Option<DateTime<Utc>>,
    pub activity_count: u32,
    pub change_frequency: ChangeFrequency,
    pub current_interval: SyncInterval,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Default for UserActivityState {
    fn default() -> Self {
        Self {
            last_activity_at: None,
            activity_count: 0,
            change_frequency: ChangeFrequency::Low,
            current_interval: SyncInterval::Normal,
            last_sync_at: None,
        }
    }
}

impl UserActivityState {
    /// Record an activity signal at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = Some(now);
        self.activity_count = self.activity_count.saturating_add(1);
    }

    /// True when the last signal is within the activity timeout window.
    #[must_use]
    pub fn is_active(&self, config: &SchedulerConfig, now: DateTime<Utc>) -> bool {
        self.last_activity_at.is_some_and(|at| {
            (now - at).num_seconds() < i64::try_from(config.activity_timeout_secs).unwrap_or(i64::MAX)
        })
    }
}
