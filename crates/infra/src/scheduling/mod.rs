//! Background schedulers
//!
//! - `adaptive`: per-user sync actors with activity-driven cadence
//! - `renewal`: cron-driven sweep renewing watch subscriptions near expiry

pub mod adaptive;
pub mod error;
pub mod renewal;

pub use adaptive::{AdaptiveSyncScheduler, SyncExecutor};
pub use error::{SchedulerError, SchedulerResult};
pub use renewal::{WatchRenewalScheduler, WatchRenewalSchedulerConfig};
