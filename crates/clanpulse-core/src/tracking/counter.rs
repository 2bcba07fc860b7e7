//! Live message event counting.
//!
//! The fast, approximate path: live create/delete notifications bump a
//! group's raw counter between reconciliations. The reconciler overwrites
//! this counter with exact windowed counts each cycle, so drift here is
//! bounded by one reconciliation period.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ClanPulseResult;
use crate::registry::GroupRegistry;

/// Applies +1/-1 deltas from live message events to group raw counters.
pub struct EventCounter {
    registry: Arc<dyn GroupRegistry>,
}

impl EventCounter {
    /// Create a counter over the given registry.
    pub fn new(registry: Arc<dyn GroupRegistry>) -> Self {
        Self { registry }
    }

    /// Handle a message-created notification. No-op if no group counts
    /// the channel.
    pub fn on_message_created(&self, channel_id: &str) -> ClanPulseResult<()> {
        let Some(mut group) = self.registry.find_by_channel(channel_id)? else {
            return Ok(());
        };

        group.raw_count += 1;
        if self.registry.update(&group)? {
            debug!(group = %group.id, raw_count = group.raw_count, "message counted");
        }
        Ok(())
    }

    /// Handle a message-deleted notification. The counter never goes
    /// below zero, regardless of event ordering.
    pub fn on_message_deleted(&self, channel_id: &str) -> ClanPulseResult<()> {
        let Some(mut group) = self.registry.find_by_channel(channel_id)? else {
            return Ok(());
        };

        if group.raw_count == 0 {
            warn!(group = %group.id, "delete event with zero raw count");
            return Ok(());
        }

        group.raw_count -= 1;
        self.registry.update(&group)?;
        Ok(())
    }
}
