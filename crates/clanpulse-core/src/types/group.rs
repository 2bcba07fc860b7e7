//! Group record types.
//!
//! A `Group` is one tracked clan: its counted channel, alert role, windowed
//! message counts, live counter, and notification state. Counters and score
//! are mutated only by the event counter and the aggregation cycle; identity
//! fields are immutable after registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Windowed message counts from the last reconciliation.
///
/// Windows are cumulative, not disjoint: a two-hour-old message counts
/// toward all four. `day <= week <= two_week <= month` is the expected
/// ordering but is not enforced; the reconciler derives each window
/// independently from timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowCounts {
    /// Messages younger than 1 day.
    pub day: u32,
    /// Messages younger than 7 days.
    pub week: u32,
    /// Messages younger than 14 days.
    pub two_week: u32,
    /// Messages younger than 30 days.
    pub month: u32,
}

impl WindowCounts {
    /// Create window counts from the four buckets.
    pub fn new(day: u32, week: u32, two_week: u32, month: u32) -> Self {
        Self {
            day,
            week,
            two_week,
            month,
        }
    }
}

/// Last alert tier fired for a group.
///
/// Used to suppress re-sending the same alert every cycle: an alert fires
/// only on a transition into a different tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTier {
    /// No alert tier active.
    #[default]
    None,
    /// Score below the low-activity threshold.
    Low,
    /// Score at exact saturation.
    High,
}

impl AlertTier {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTier::None => "none",
            AlertTier::Low => "low",
            AlertTier::High => "high",
        }
    }

    /// Parse the storage representation. Unknown values fall back to
    /// `None` so records written by newer versions stay readable.
    pub fn parse(s: &str) -> Self {
        match s {
            "low" => AlertTier::Low,
            "high" => AlertTier::High,
            _ => AlertTier::None,
        }
    }
}

/// One tracked group (clan) with a designated channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Opaque external identifier, unique across the registry.
    pub id: String,
    /// Channel whose messages are counted.
    pub channel_id: String,
    /// Role addressed in alerts. Alerts are computed but not delivered
    /// when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    /// Windowed counts from the last reconciliation.
    #[serde(default)]
    pub counts: WindowCounts,
    /// Live counter adjusted by message events between reconciliations.
    #[serde(default)]
    pub raw_count: u32,
    /// Last computed activity score, in [0, 10].
    #[serde(default)]
    pub score: f64,
    /// Last alert tier fired.
    #[serde(default)]
    pub last_notified_state: AlertTier,
    /// When the group was registered.
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Create a new group record with zeroed counters.
    pub fn new(id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            role_id: None,
            counts: WindowCounts::default(),
            raw_count: 0,
            score: 0.0,
            last_notified_state: AlertTier::None,
            created_at: Utc::now(),
        }
    }

    /// Builder method to set the alert role.
    pub fn with_role(mut self, role_id: impl Into<String>) -> Self {
        self.role_id = Some(role_id.into());
        self
    }
}
