//! Credential service implementing the CredentialProvider port.
//!
//! Token lifecycle per user:
//! - access tokens are cached in memory and reused until they approach their
//!   stored expiry (refresh threshold from config)
//! - expiry triggers a proactive refresh against the provider's token
//!   endpoint using the stored refresh grant
//! - `force_refresh` bypasses the cache for the reactive path after the
//!   provider rejects a token mid-flight
//!
//! A user with no stored grant surfaces as `NotConnected`; callers must not
//! spin a retry loop on that.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use quorum_core::{CredentialProvider, CredentialsRepository};
use quorum_domain::{ProviderConfig, QuorumError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::observability::redact_user;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Multi-user credential service backed by stored refresh grants.
pub struct CredentialService {
    repo: Arc<dyn CredentialsRepository>,
    http: Client,
    config: ProviderConfig,
    cache: DashMap<String, CachedToken>,
}

impl CredentialService {
    pub fn new(repo: Arc<dyn CredentialsRepository>, config: ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| QuorumError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { repo, http, config, cache: DashMap::new() })
    }

    fn is_fresh(&self, expires_at: i64) -> bool {
        expires_at - Utc::now().timestamp() > self.config.refresh_threshold_secs
    }

    /// Exchange the stored refresh grant for a new access token and persist
    /// it. The refresh token itself never leaves the database except toward
    /// the token endpoint.
    async fn refresh(&self, user_id: &str) -> Result<String> {
        let credentials = self
            .repo
            .get(user_id)
            .await?
            .ok_or_else(|| QuorumError::NotConnected(format!("no credentials for {}", redact_user(user_id))))?;

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(crate::errors::InfraError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QuorumError::Auth(format!("token refresh failed ({status}): {body}")));
        }

        let refreshed: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| QuorumError::Auth(format!("failed to parse token response: {e}")))?;

        let expires_at = Utc::now().timestamp() + refreshed.expires_in;
        self.repo.update_access_token(user_id, &refreshed.access_token, expires_at).await?;
        self.cache.insert(
            user_id.to_string(),
            CachedToken { access_token: refreshed.access_token.clone(), expires_at },
        );

        info!(user = %redact_user(user_id), "refreshed access token");
        Ok(refreshed.access_token)
    }
}

#[async_trait]
impl CredentialProvider for CredentialService {
    #[instrument(skip(self))]
    async fn valid_token(&self, user_id: &str) -> Result<String> {
        if let Some(cached) = self.cache.get(user_id) {
            if self.is_fresh(cached.expires_at) {
                return Ok(cached.access_token.clone());
            }
        }

        let credentials = self
            .repo
            .get(user_id)
            .await?
            .ok_or_else(|| QuorumError::NotConnected(format!("no credentials for {}", redact_user(user_id))))?;

        if let (Some(token), Some(expires_at)) = (credentials.access_token, credentials.expires_at)
        {
            if self.is_fresh(expires_at) {
                self.cache.insert(
                    user_id.to_string(),
                    CachedToken { access_token: token.clone(), expires_at },
                );
                return Ok(token);
            }
        }

        debug!(user = %redact_user(user_id), "stored token missing or expiring, refreshing");
        self.refresh(user_id).await
    }

    #[instrument(skip(self))]
    async fn force_refresh(&self, user_id: &str) -> Result<String> {
        self.cache.remove(user_id);
        self.refresh(user_id).await
    }

    async fn owner_email(&self, user_id: &str) -> Result<String> {
        self.repo
            .get(user_id)
            .await?
            .map(|c| c.owner_email)
            .ok_or_else(|| QuorumError::NotConnected(format!("no credentials for {}", redact_user(user_id))))
    }
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    expires_in: i64,
}
