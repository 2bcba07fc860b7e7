//! Discord REST wire types.

use chrono::{DateTime, Utc};
use clanpulse_core::ChannelMessage;
use serde::{Deserialize, Serialize};

/// Message author as returned by the Discord API.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordAuthor {
    /// Snowflake id.
    pub id: String,
    /// Whether the author is a bot account.
    #[serde(default)]
    pub bot: bool,
}

/// A message as returned by `GET /channels/{id}/messages`.
///
/// Only the fields the reconciler needs; the rest of the payload is
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    /// Snowflake id.
    pub id: String,
    /// Creation timestamp (ISO 8601 with offset).
    pub timestamp: DateTime<Utc>,
    /// Message author.
    pub author: DiscordAuthor,
}

impl From<DiscordMessage> for ChannelMessage {
    fn from(message: DiscordMessage) -> Self {
        ChannelMessage::new(message.id, message.author.id, message.timestamp)
    }
}

/// Body for `POST /channels/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct CreateMessagePayload<'a> {
    pub content: &'a str,
}
