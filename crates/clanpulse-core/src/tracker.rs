//! Activity tracker facade.
//!
//! Owns the registry, the event counter, and the aggregation scheduler,
//! and exposes the operations external collaborators (slash commands,
//! leaderboards) call into.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::TrackerConfig;
use crate::error::{ClanPulseError, ClanPulseResult};
use crate::events::{spawn_event_feed, MessageEvent};
use crate::registry::{GroupRegistry, SqliteGroupRegistry};
use crate::tracking::{
    activity_score, AggregationScheduler, CycleReport, CycleRunner, EventCounter,
};
use crate::traits::ChatGateway;
use crate::types::Group;

/// The clan activity tracking engine.
///
/// # Example
///
/// ```ignore
/// use clanpulse_core::{ActivityTracker, TrackerConfig};
///
/// let mut tracker = ActivityTracker::new(TrackerConfig::default(), gateway)?;
/// tracker.register_group("#2PP0JCCL", "1030039134963777556", Some("881073424884199435"))?;
/// tracker.start().await?;
/// // ... live events flow in, cycles run every 10 minutes ...
/// tracker.shutdown().await?;
/// ```
pub struct ActivityTracker {
    config: TrackerConfig,
    registry: Arc<dyn GroupRegistry>,
    counter: Arc<EventCounter>,
    runner: Arc<CycleRunner>,
    scheduler: Option<AggregationScheduler>,
}

impl ActivityTracker {
    /// Create a tracker backed by the SQLite registry at the configured
    /// path.
    pub fn new(config: TrackerConfig, gateway: Arc<dyn ChatGateway>) -> ClanPulseResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let registry: Arc<dyn GroupRegistry> =
            Arc::new(SqliteGroupRegistry::new(&config.db_path)?);
        Ok(Self::with_registry(config, registry, gateway))
    }

    /// Create a tracker over an existing registry (for testing or custom
    /// storage).
    pub fn with_registry(
        config: TrackerConfig,
        registry: Arc<dyn GroupRegistry>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        let counter = Arc::new(EventCounter::new(registry.clone()));
        let runner = Arc::new(CycleRunner::new(registry.clone(), gateway, &config));
        Self {
            config,
            registry,
            counter,
            runner,
            scheduler: None,
        }
    }

    /// Start the background aggregation scheduler. Idempotent.
    pub async fn start(&mut self) -> ClanPulseResult<()> {
        if self.scheduler.is_some() {
            return Ok(());
        }
        let scheduler = AggregationScheduler::new(self.runner.clone(), &self.config).await?;
        scheduler.start().await?;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Gracefully stop the scheduler: the timer stops and the in-flight
    /// cycle, if any, is abandoned without further alerts.
    pub async fn shutdown(&mut self) -> ClanPulseResult<()> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown().await?;
        }
        Ok(())
    }

    /// Register a new group. Fails with `AlreadyExists` for a taken id.
    pub fn register_group(
        &self,
        id: &str,
        channel_id: &str,
        role_id: Option<&str>,
    ) -> ClanPulseResult<Group> {
        let mut group = Group::new(id, channel_id);
        if let Some(role_id) = role_id {
            group = group.with_role(role_id);
        }
        self.registry.insert(&group)?;
        info!(group = %id, channel = %channel_id, "group registered");
        Ok(group)
    }

    /// Remove a group. Fails with `NotFound` if absent. Safe to call
    /// while an aggregation cycle for the group is in flight; the removal
    /// wins.
    pub fn unregister_group(&self, id: &str) -> ClanPulseResult<()> {
        self.registry.delete(id)?;
        info!(group = %id, "group unregistered");
        Ok(())
    }

    /// Get a group by id.
    pub fn get_group(&self, id: &str) -> ClanPulseResult<Group> {
        self.registry
            .get(id)?
            .ok_or_else(|| ClanPulseError::not_found(id))
    }

    /// Get a group's activity score, recomputed from its persisted
    /// window counts.
    pub fn get_score(&self, id: &str) -> ClanPulseResult<f64> {
        let group = self.get_group(id)?;
        Ok(activity_score(&group.counts))
    }

    /// All groups ordered for leaderboard rendering: score descending,
    /// ties broken by insertion order.
    pub fn list_groups(&self) -> ClanPulseResult<Vec<Group>> {
        let mut groups = self.registry.list()?;
        groups.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(groups)
    }

    /// Handle a live message-created notification.
    pub fn on_message_created(&self, channel_id: &str) -> ClanPulseResult<()> {
        self.counter.on_message_created(channel_id)
    }

    /// Handle a live message-deleted notification.
    pub fn on_message_deleted(&self, channel_id: &str) -> ClanPulseResult<()> {
        self.counter.on_message_deleted(channel_id)
    }

    /// Attach a live event feed: spawns a task draining the receiver into
    /// the event counter.
    pub fn attach_event_feed(&self, events: mpsc::Receiver<MessageEvent>) -> JoinHandle<()> {
        spawn_event_feed(self.counter.clone(), events)
    }

    /// Run one aggregation cycle immediately (outside the schedule).
    ///
    /// Returns `None` if a cycle is already in flight.
    pub async fn run_cycle_now(&self) -> ClanPulseResult<Option<CycleReport>> {
        self.runner.try_run_cycle().await
    }

    /// The tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
