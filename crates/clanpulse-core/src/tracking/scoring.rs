//! Activity score computation.
//!
//! Pure function from windowed counts to a bounded score. Recency is
//! weighted over volume: a burst of recent activity outscores the same
//! message count spread over a month. 100 weighted messages is a perfect
//! score; anything above saturates at 10.

use crate::types::WindowCounts;

/// Weight for messages in the last day.
pub const DAY_WEIGHT: f64 = 0.4;
/// Weight for messages in the last week.
pub const WEEK_WEIGHT: f64 = 0.3;
/// Weight for messages in the last two weeks.
pub const TWO_WEEK_WEIGHT: f64 = 0.2;
/// Weight for messages in the last month.
pub const MONTH_WEIGHT: f64 = 0.1;

/// Score ceiling.
pub const MAX_SCORE: f64 = 10.0;

/// Compute the normalized activity score in [0, 10] for a set of window
/// counts.
pub fn activity_score(counts: &WindowCounts) -> f64 {
    let raw = DAY_WEIGHT * f64::from(counts.day)
        + WEEK_WEIGHT * f64::from(counts.week)
        + TWO_WEEK_WEIGHT * f64::from(counts.two_week)
        + MONTH_WEIGHT * f64::from(counts.month);
    (raw / 100.0 * 10.0).min(MAX_SCORE)
}
