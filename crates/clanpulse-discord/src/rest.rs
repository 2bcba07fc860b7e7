//! Discord REST gateway.
//!
//! Implements `ChatGateway` over the Discord HTTP API with bot-token
//! authentication and exponential backoff on transient failures (network
//! errors, 5xx, 429 rate limits). Permanent 4xx responses surface
//! immediately.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use clanpulse_core::{ChannelMessage, ChatGateway, ClanPulseError, ClanPulseResult};

use crate::types::{CreateMessagePayload, DiscordMessage};

/// Default Discord API base.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord caps the history page size at 100.
const MAX_PAGE_SIZE: usize = 100;

/// Request error classified for retry.
#[derive(Debug)]
enum RequestError {
    /// Network error, 5xx, or 429: retried with backoff.
    Transient(String),
    /// 4xx (other than 429): not retried.
    Permanent(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient: {}", msg),
            Self::Permanent(msg) => write!(f, "permanent: {}", msg),
        }
    }
}

/// Configuration for the Discord gateway.
pub struct DiscordConfig {
    /// Bot token.
    pub token: SecretString,
    /// API base URL, overridable for tests.
    pub api_base: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retries for transient failures.
    pub max_retries: usize,
}

impl DiscordConfig {
    /// Create a config with the given bot token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }

    /// Load the bot token from `DISCORD_BOT_TOKEN` (reading `.env` first
    /// if present).
    pub fn from_env() -> ClanPulseResult<Self> {
        dotenvy::dotenv().ok();
        let token = std::env::var("DISCORD_BOT_TOKEN").map_err(|_| {
            ClanPulseError::Configuration(
                "Discord bot token not found. Set DISCORD_BOT_TOKEN.".to_string(),
            )
        })?;
        Ok(Self::new(token))
    }

    /// Builder: override the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Builder: set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// `ChatGateway` implementation over the Discord REST API.
pub struct DiscordRestGateway {
    client: Client,
    config: DiscordConfig,
}

impl DiscordRestGateway {
    /// Create a gateway with the given configuration.
    pub fn new(config: DiscordConfig) -> ClanPulseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ClanPulseError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.token.expose_secret())
    }

    fn retry_policy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.config.max_retries)
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(15))
    }

    async fn classify(response: reqwest::Response) -> Result<reqwest::Response, RequestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status.as_u16() == 429 {
            Err(RequestError::Transient(format!("HTTP {}: {}", status, body)))
        } else {
            Err(RequestError::Permanent(format!("HTTP {}: {}", status, body)))
        }
    }
}

#[async_trait]
impl ChatGateway for DiscordRestGateway {
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> ClanPulseResult<Vec<ChannelMessage>> {
        let url = format!("{}/channels/{}/messages", self.config.api_base, channel_id);
        let limit = limit.min(MAX_PAGE_SIZE);

        let fetch_once = || async {
            let response = self
                .client
                .get(&url)
                .header("Authorization", self.auth_header())
                .query(&[("limit", limit.to_string())])
                .send()
                .await
                .map_err(|e| RequestError::Transient(format!("network error: {}", e)))?;

            let response = Self::classify(response).await?;
            response
                .json::<Vec<DiscordMessage>>()
                .await
                .map_err(|e| RequestError::Permanent(format!("invalid response body: {}", e)))
        };

        let messages = fetch_once
            .retry(self.retry_policy())
            .when(|e| matches!(e, RequestError::Transient(_)))
            .notify(|err, dur| {
                tracing::warn!(
                    channel = %channel_id,
                    "history fetch failed, retrying in {:?}: {}",
                    dur,
                    err
                );
            })
            .await
            .map_err(|e| ClanPulseError::fetch(format!("channel {}: {}", channel_id, e)))?;

        Ok(messages.into_iter().map(ChannelMessage::from).collect())
    }

    async fn send_to_channel(&self, channel_id: &str, text: &str) -> ClanPulseResult<()> {
        let url = format!("{}/channels/{}/messages", self.config.api_base, channel_id);
        let payload = CreateMessagePayload { content: text };

        let send_once = || async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .json(&payload)
                .send()
                .await
                .map_err(|e| RequestError::Transient(format!("network error: {}", e)))?;

            Self::classify(response).await.map(|_| ())
        };

        send_once
            .retry(self.retry_policy())
            .when(|e| matches!(e, RequestError::Transient(_)))
            .notify(|err, dur| {
                tracing::warn!(
                    channel = %channel_id,
                    "message send failed, retrying in {:?}: {}",
                    dur,
                    err
                );
            })
            .await
            .map_err(|e| ClanPulseError::delivery(format!("channel {}: {}", channel_id, e)))
    }
}
