//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from a TOML file
//! 3. Probes multiple paths for config files
//!
//! ## Environment Variables
//! - `QUORUM_DB_PATH`: Database file path
//! - `QUORUM_DB_POOL_SIZE`: Connection pool size
//! - `QUORUM_PROVIDER_CLIENT_ID` / `QUORUM_PROVIDER_CLIENT_SECRET`: OAuth app
//! - `QUORUM_PROVIDER_API_BASE`: Calendar API base URL
//! - `QUORUM_PROVIDER_TOKEN_ENDPOINT`: OAuth token endpoint
//! - `QUORUM_WEBHOOK_ADDRESS`: Public URL for watch push notifications
//! - `QUORUM_BIND_ADDR`: HTTP listen address
//! - `QUORUM_BOT_API_BASE` / `QUORUM_BOT_API_KEY`: optional bot provider
//!
//! ## File Locations
//! The loader probes (in order): `./quorum.toml`, `./config.toml`,
//! `../quorum.toml`.

use std::path::{Path, PathBuf};

use quorum_domain::{Config, QuorumError, Result};
use tracing::{debug, info};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `QuorumError::Config` if neither source yields a usable
/// configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            debug!(error = ?e, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The credential-bearing variables are required; everything else falls back
/// to the defaults in `quorum_domain::config`.
///
/// # Errors
/// Returns `QuorumError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("QUORUM_DB_PATH")?;
    config.provider.client_id = env_var("QUORUM_PROVIDER_CLIENT_ID")?;
    config.provider.client_secret = env_var("QUORUM_PROVIDER_CLIENT_SECRET")?;
    config.provider.webhook_address = env_var("QUORUM_WEBHOOK_ADDRESS")?;

    if let Ok(value) = std::env::var("QUORUM_DB_POOL_SIZE") {
        config.database.pool_size = value
            .parse()
            .map_err(|e| QuorumError::Config(format!("invalid pool size: {e}")))?;
    }
    if let Ok(value) = std::env::var("QUORUM_PROVIDER_API_BASE") {
        config.provider.api_base = value;
    }
    if let Ok(value) = std::env::var("QUORUM_PROVIDER_TOKEN_ENDPOINT") {
        config.provider.token_endpoint = value;
    }
    if let Ok(value) = std::env::var("QUORUM_BIND_ADDR") {
        config.bind_addr = value;
    }
    if let Ok(value) = std::env::var("QUORUM_BOT_API_BASE") {
        config.bot.api_base = Some(value);
    }
    if let Ok(value) = std::env::var("QUORUM_BOT_API_KEY") {
        config.bot.api_key = Some(value);
    }

    Ok(config)
}

/// Load configuration from a TOML file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `QuorumError::Config` if no file is found or parsing fails.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_config_paths().ok_or_else(|| {
            QuorumError::Config("no configuration file found in standard locations".into())
        })?,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        QuorumError::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| {
        QuorumError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;

    info!(path = %path.display(), "configuration loaded from file");
    Ok(config)
}

fn probe_config_paths() -> Option<PathBuf> {
    ["./quorum.toml", "./config.toml", "../quorum.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| QuorumError::Config(format!("missing environment variable {name}")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn file_loading_accepts_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quorum.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
bind_addr = "0.0.0.0:9000"

[database]
path = "/tmp/q.db"

[scheduler]
fast_interval_secs = 30
"#
        )
        .unwrap();

        let config = load_from_file(Some(&path)).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.database.path, "/tmp/q.db");
        assert_eq!(config.scheduler.fast_interval_secs, 30);
        // Untouched sections keep their defaults
        assert_eq!(config.sync.lookahead_days, 30);
        assert_eq!(config.database.pool_size, 4);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_from_file(Some(Path::new("/nonexistent/quorum.toml"))).unwrap_err();
        assert!(matches!(err, QuorumError::Config(_)));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "bind_addr = [not toml").unwrap();

        let err = load_from_file(Some(&path)).unwrap_err();
        assert!(matches!(err, QuorumError::Config(_)));
    }
}
