//! Live message event feed.
//!
//! Bridges a platform gateway's create/delete notifications into the
//! event counter. Events are fire-and-forget: a failed counter update is
//! logged, never retried, because the next reconciliation overwrites the
//! live counter anyway.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::tracking::EventCounter;

/// Kind of live message notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageEventKind {
    Created,
    Deleted,
}

/// A live message notification from the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Channel the message was posted to or removed from.
    pub channel_id: String,
    /// Whether the message was created or deleted.
    pub kind: MessageEventKind,
}

impl MessageEvent {
    /// A message-created notification.
    pub fn created(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            kind: MessageEventKind::Created,
        }
    }

    /// A message-deleted notification.
    pub fn deleted(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            kind: MessageEventKind::Deleted,
        }
    }
}

/// Spawn a task draining live message events into the counter.
///
/// Runs until the sender side of the channel closes.
pub fn spawn_event_feed(
    counter: Arc<EventCounter>,
    mut events: mpsc::Receiver<MessageEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let result = match event.kind {
                MessageEventKind::Created => counter.on_message_created(&event.channel_id),
                MessageEventKind::Deleted => counter.on_message_deleted(&event.channel_id),
            };
            if let Err(e) = result {
                warn!(
                    channel = %event.channel_id,
                    error = %e,
                    "failed to apply live message event"
                );
            }
        }
        debug!("message event feed closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{GroupRegistry, SqliteGroupRegistry};
    use crate::types::Group;

    #[tokio::test]
    async fn test_feed_drains_into_counter() {
        let registry = Arc::new(SqliteGroupRegistry::in_memory().unwrap());
        registry.insert(&Group::new("#AAA", "1001")).unwrap();
        let counter = Arc::new(EventCounter::new(registry.clone()));

        let (tx, rx) = mpsc::channel(16);
        let handle = spawn_event_feed(counter, rx);

        tx.send(MessageEvent::created("1001")).await.unwrap();
        tx.send(MessageEvent::created("1001")).await.unwrap();
        tx.send(MessageEvent::deleted("1001")).await.unwrap();
        tx.send(MessageEvent::created("9999")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let group = registry.get("#AAA").unwrap().unwrap();
        assert_eq!(group.raw_count, 1);
    }
}
