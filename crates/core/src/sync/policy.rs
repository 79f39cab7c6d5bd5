//! Adaptive polling policy.
//!
//! Pure interval selection, evaluated on every activity signal and on every
//! completed background sync. The actor driving a user's timer lives in the
//! infrastructure layer; this module only decides cadence.

use chrono::{DateTime, Utc};
use quorum_domain::{ChangeFrequency, SchedulerConfig, SyncInterval, UserActivityState};

/// Classify recent change volume from the number of record classes
/// (creates / updates / deletes) that reported changes in the last
/// background pass.
#[must_use]
pub fn classify_change_frequency(changed_services: usize) -> ChangeFrequency {
    match changed_services {
        n if n >= 3 => ChangeFrequency::High,
        n if n >= 1 => ChangeFrequency::Medium,
        _ => ChangeFrequency::Low,
    }
}

/// Select the polling tier for a user's current state.
///
/// - active (signal within the activity timeout) → fast
/// - inactive, high change frequency → normal
/// - inactive, low change frequency, last sync older than the slow
///   threshold (or never synced) → slow
/// - otherwise → normal
#[must_use]
pub fn select_interval(
    state: &UserActivityState,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> SyncInterval {
    if state.is_active(config, now) {
        return SyncInterval::Fast;
    }

    match state.change_frequency {
        ChangeFrequency::High => SyncInterval::Normal,
        ChangeFrequency::Low if sync_is_stale(state, config, now) => SyncInterval::Slow,
        _ => SyncInterval::Normal,
    }
}

fn sync_is_stale(state: &UserActivityState, config: &SchedulerConfig, now: DateTime<Utc>) -> bool {
    match state.last_sync_at {
        Some(at) => {
            (now - at).num_seconds()
                > i64::try_from(config.slow_sync_threshold_secs).unwrap_or(i64::MAX)
        }
        // Never synced: nothing fresh to protect, background cadence is fine
        None => true,
    }
}
