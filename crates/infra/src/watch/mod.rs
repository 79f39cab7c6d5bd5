//! Push-notification subscription lifecycle

pub mod manager;

pub use manager::{RenewOutcome, WatchLifecycleManager};
