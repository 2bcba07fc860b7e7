//! History reconciliation.
//!
//! The slow, authoritative path: pull a bounded page of recent channel
//! history and recompute exact windowed counts, correcting any drift from
//! live counting.
//!
//! The fetch is bounded at `fetch_limit` most recent messages. If true
//! message volume within the lookback window exceeds that page size, older
//! messages are silently excluded and the month window undercounts; this
//! approximation is accepted.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{ClanPulseError, ClanPulseResult};
use crate::traits::ChatGateway;
use crate::types::{Group, WindowCounts};

/// Recomputes a group's windowed counts from channel history.
pub struct Reconciler {
    gateway: Arc<dyn ChatGateway>,
    fetch_limit: usize,
    fetch_timeout: StdDuration,
    lookback_days: i64,
}

impl Reconciler {
    /// Create a reconciler over the given gateway.
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        fetch_limit: usize,
        fetch_timeout: StdDuration,
        lookback_days: i64,
    ) -> Self {
        Self {
            gateway,
            fetch_limit,
            fetch_timeout,
            lookback_days,
        }
    }

    /// Fetch recent history for the group's channel and derive exact
    /// windowed counts.
    ///
    /// A timed-out or failed fetch is an error; the caller keeps the
    /// group's previous counts for the cycle. Ages are evaluated against a
    /// single reference instant captured here, so all four window
    /// memberships are consistent for a given message.
    pub async fn reconcile(&self, group: &Group) -> ClanPulseResult<WindowCounts> {
        let fetch = self
            .gateway
            .fetch_recent_messages(&group.channel_id, self.fetch_limit);
        let messages = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| {
                ClanPulseError::fetch_timeout(format!(
                    "history fetch for channel {} timed out after {:?}",
                    group.channel_id, self.fetch_timeout
                ))
            })??;

        let now = Utc::now();
        let cutoff = now - Duration::days(self.lookback_days);
        let counts = count_windows(
            now,
            messages
                .iter()
                .filter(|m| m.timestamp >= cutoff)
                .map(|m| m.timestamp),
        );

        debug!(
            group = %group.id,
            fetched = messages.len(),
            day = counts.day,
            month = counts.month,
            "reconciled channel history"
        );
        Ok(counts)
    }
}

/// Bucket message timestamps into cumulative recency windows.
///
/// A message younger than a day increments all four counters; windows are
/// inclusion thresholds, not disjoint buckets. Deterministic for a fixed
/// `now`.
pub fn count_windows(
    now: DateTime<Utc>,
    timestamps: impl IntoIterator<Item = DateTime<Utc>>,
) -> WindowCounts {
    let mut counts = WindowCounts::default();
    for timestamp in timestamps {
        let age = now - timestamp;
        if age < Duration::days(1) {
            counts.day += 1;
        }
        if age < Duration::days(7) {
            counts.week += 1;
        }
        if age < Duration::days(14) {
            counts.two_week += 1;
        }
        if age < Duration::days(30) {
            counts.month += 1;
        }
    }
    counts
}
