//! Notification tiering and alert construction.
//!
//! A group's score maps to a tier; an alert fires only on a transition
//! into a tier different from the last one notified, so a group sitting
//! at the same tier is not re-alerted every cycle.

use serde::{Deserialize, Serialize};

use crate::tracking::scoring::MAX_SCORE;
use crate::types::{AlertTier, Group};

/// Default score threshold below which a group is in the LOW tier.
pub const DEFAULT_LOW_THRESHOLD: f64 = 2.0;

/// Classify a score into an alert tier.
///
/// HIGH requires exact saturation. A 9.99 never congratulates; only a
/// clamped perfect cycle does.
pub fn tier_for_score(score: f64, low_threshold: f64) -> AlertTier {
    if score < low_threshold {
        AlertTier::Low
    } else if score == MAX_SCORE {
        AlertTier::High
    } else {
        AlertTier::None
    }
}

/// A role-addressed alert ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Tier that fired.
    pub tier: AlertTier,
    /// Score that produced the tier.
    pub score: f64,
    /// Channel to deliver into.
    pub channel_id: String,
    /// Role to address. Delivery is skipped when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
}

impl Alert {
    /// Render the alert message. Returns `None` when no role is set.
    pub fn text(&self) -> Option<String> {
        let role_id = self.role_id.as_deref()?;
        match self.tier {
            AlertTier::Low => Some(format!(
                "<@&{role_id}> improve clan activity, currently you're at {:.2}",
                self.score
            )),
            AlertTier::High => Some(format!(
                "<@&{role_id}> Well done, you reached a {:.2} rating!",
                self.score
            )),
            AlertTier::None => None,
        }
    }
}

/// Evaluates score transitions into alerts.
#[derive(Debug, Clone)]
pub struct NotificationTrigger {
    low_threshold: f64,
}

impl NotificationTrigger {
    /// Create a trigger with the given LOW-tier threshold.
    pub fn new(low_threshold: f64) -> Self {
        Self { low_threshold }
    }

    /// Evaluate a group's new score.
    ///
    /// Updates `last_notified_state` to the current tier regardless of
    /// whether an alert fires; returns an alert only on a transition into
    /// LOW or HIGH.
    pub fn evaluate(&self, group: &mut Group, new_score: f64) -> Option<Alert> {
        let tier = tier_for_score(new_score, self.low_threshold);
        let fired = tier != AlertTier::None && tier != group.last_notified_state;
        group.last_notified_state = tier;

        fired.then(|| Alert {
            tier,
            score: new_score,
            channel_id: group.channel_id.clone(),
            role_id: group.role_id.clone(),
        })
    }
}

impl Default for NotificationTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_THRESHOLD)
    }
}
