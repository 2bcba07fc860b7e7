//! Chat platform gateway trait.
//!
//! The engine talks to the chat platform through this seam: the reconciler
//! pulls message history, the notification trigger pushes alert text. A
//! platform crate (e.g. clanpulse-discord) provides the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClanPulseResult;

/// A message fetched from a channel's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Platform message identifier.
    pub id: String,
    /// Author identifier.
    pub author_id: String,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
}

impl ChannelMessage {
    /// Create a channel message.
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            timestamp,
        }
    }
}

/// Gateway to the chat platform.
///
/// Implementations map errors to `ClanPulseError::Fetch` for history
/// queries and `ClanPulseError::Network` for deliveries, so the cycle can
/// apply its skip/log policy uniformly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Fetch up to `limit` most recent messages from a channel, newest
    /// first. An unreachable channel (deleted, permission revoked) is an
    /// error, not an empty result.
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> ClanPulseResult<Vec<ChannelMessage>>;

    /// Send a text message to a channel.
    async fn send_to_channel(&self, channel_id: &str, text: &str) -> ClanPulseResult<()>;
}
