//! BotGateway strategy implementations.
//!
//! Two interchangeable backends sit behind the `BotGateway` trait: the hosted
//! bot provider reached over HTTP, and a local runner used when no provider
//! is configured or the provider fails its capability probe at startup.
//! Selection happens once via `select_gateway`, not by inspecting the object
//! at call sites.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quorum_core::BotGateway;
use quorum_domain::{BotConfig, BotJobConfig, QuorumError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// HTTP client for a hosted meeting-bot provider.
pub struct HttpBotGateway {
    http: Client,
    api_base: String,
    api_key: String,
}

impl HttpBotGateway {
    pub fn new(api_base: &str, api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| QuorumError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl BotGateway for HttpBotGateway {
    #[instrument(skip(self, config))]
    async fn schedule_bot(&self, meeting_url: &str, config: &BotJobConfig) -> Result<String> {
        let body = json!({
            "meeting_url": meeting_url,
            "bot_name": config.bot_name.as_deref().unwrap_or("Quorum Notetaker"),
            "join_offset_minutes": config.join_offset_minutes.unwrap_or(2),
            "language": config.language,
        });

        let response = self
            .http
            .post(format!("{}/bots", self.api_base))
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(crate::errors::InfraError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(QuorumError::Provider(format!(
                "bot provider returned {status}: {text}"
            )));
        }

        let deployed: BotDeployResponse = response
            .json()
            .await
            .map_err(|e| QuorumError::InvalidInput(format!("failed to parse bot response: {e}")))?;

        info!(bot_id = %deployed.id, "bot scheduled via provider");
        Ok(deployed.id)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.api_base);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, "bot provider health check failed");
                false
            }
        }
    }
}

/// Local fallback runner: records the deployment intent without a remote
/// provider. Bot ids are tagged so downstream status updates can tell the
/// backends apart.
#[derive(Default)]
pub struct LocalBotGateway;

#[async_trait]
impl BotGateway for LocalBotGateway {
    async fn schedule_bot(&self, meeting_url: &str, _config: &BotJobConfig) -> Result<String> {
        let bot_id = format!("local-{}", Uuid::new_v4());
        info!(bot_id = %bot_id, meeting_url, "bot scheduled on local runner");
        Ok(bot_id)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Pick a gateway backend: the configured provider when it passes its
/// capability probe, the local runner otherwise.
pub async fn select_gateway(config: &BotConfig) -> Arc<dyn BotGateway> {
    let Some((api_base, api_key)) = config.api_base.as_deref().zip(config.api_key.as_deref())
    else {
        info!("no bot provider configured, using local runner");
        return Arc::new(LocalBotGateway);
    };

    let gateway = match HttpBotGateway::new(api_base, api_key) {
        Ok(gateway) => gateway,
        Err(err) => {
            warn!(error = %err, "bot provider client construction failed, using local runner");
            return Arc::new(LocalBotGateway);
        }
    };

    let probe_timeout =
        Duration::from_secs(config.probe_timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS));

    match tokio::time::timeout(probe_timeout, gateway.health_check()).await {
        Ok(true) => {
            info!("bot provider healthy, using hosted gateway");
            Arc::new(gateway)
        }
        Ok(false) | Err(_) => {
            warn!("bot provider failed capability probe, using local runner");
            Arc::new(LocalBotGateway)
        }
    }
}

#[derive(Debug, Deserialize)]
struct BotDeployResponse {
    id: String,
}
