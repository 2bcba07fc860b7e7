//! Activity tracking: counters, reconciliation, scoring, alerting, and
//! the aggregation cycle that ties them together.

pub mod alerts;
pub mod counter;
pub mod cycle;
pub mod reconcile;
pub mod scheduler;
pub mod scoring;

pub use alerts::{tier_for_score, Alert, NotificationTrigger, DEFAULT_LOW_THRESHOLD};
pub use counter::EventCounter;
pub use cycle::{CycleReport, CycleRunner};
pub use reconcile::{count_windows, Reconciler};
pub use scheduler::AggregationScheduler;
pub use scoring::activity_score;
