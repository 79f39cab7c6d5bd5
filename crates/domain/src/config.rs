//! Application configuration structures
//!
//! Populated by the loader in `quorum-infra` from environment variables or a
//! TOML file. Defaults here are the production values; tests override the
//! timing knobs to keep runs fast.

use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
    pub bot: BotConfig,
    /// Bind address for the HTTP surface (webhooks + manual trigger API)
    pub bind_addr: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: String,
    /// Connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "quorum.db".to_string(), pool_size: 4 }
    }
}

/// Calendar provider API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the calendar API
    pub api_base: String,
    /// OAuth token endpoint used for refresh grants
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    /// Publicly reachable URL the provider pushes watch notifications to
    pub webhook_address: String,
    /// Timeout applied to every provider call, in seconds
    pub request_timeout_secs: u64,
    /// Refresh access tokens this many seconds before their stored expiry
    pub refresh_threshold_secs: i64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            webhook_address: String::new(),
            request_timeout_secs: 30,
            refresh_threshold_secs: 300,
        }
    }
}

/// Synchronization window and watch lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Full-window fetch reaches this many days into the past
    pub lookback_days: i64,
    /// Full-window fetch reaches this many days into the future
    pub lookahead_days: i64,
    /// Requested watch channel lifetime
    pub watch_ttl_hours: i64,
    /// Renew watches whose expiry is closer than this
    pub renewal_threshold_hours: i64,
    /// Cron expression for the watch renewal sweep
    pub renewal_cron: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            lookahead_days: 30,
            watch_ttl_hours: 168, // 7 days
            renewal_threshold_hours: 24,
            renewal_cron: "0 0 * * * *".to_string(), // hourly
        }
    }
}

/// Adaptive scheduler timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub fast_interval_secs: u64,
    pub normal_interval_secs: u64,
    pub slow_interval_secs: u64,
    /// A user with no activity signal for this long is considered inactive
    pub activity_timeout_secs: u64,
    /// Inactive + low change frequency downgrades to slow only once the last
    /// sync is older than this
    pub slow_sync_threshold_secs: u64,
    /// Delay applied to debounced `meeting_create` triggers
    pub debounce_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fast_interval_secs: 60,
            normal_interval_secs: 300,
            slow_interval_secs: 1800,
            activity_timeout_secs: 600,
            slow_sync_threshold_secs: 3600,
            debounce_secs: 5,
        }
    }
}

/// Meeting bot provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Base URL of the hosted bot provider; absent means local-only
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    /// Timeout for the startup capability probe, in seconds
    pub probe_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            provider: ProviderConfig::default(),
            sync: SyncConfig::default(),
            scheduler: SchedulerConfig::default(),
            bot: BotConfig::default(),
            bind_addr: "127.0.0.1:8475".to_string(),
        }
    }
}
