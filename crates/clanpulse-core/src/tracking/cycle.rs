//! One aggregation cycle over all registered groups.
//!
//! Per group, in order: reconcile history, recompute the score, evaluate
//! the notification tier, persist, then deliver any alert. Failures are
//! isolated per group; a fetch failure or persist failure for one group
//! never aborts the cycle for the rest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::error::ClanPulseResult;
use crate::registry::GroupRegistry;
use crate::tracking::alerts::NotificationTrigger;
use crate::tracking::reconcile::Reconciler;
use crate::tracking::scoring::activity_score;
use crate::traits::ChatGateway;
use crate::types::Group;

/// Summary of one aggregation cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Groups fully processed (reconciled, scored, persisted).
    pub processed: usize,
    /// Groups skipped because their history fetch failed or timed out.
    pub skipped: usize,
    /// Groups that disappeared mid-cycle (unregistered underneath us).
    pub removed: usize,
    /// Groups whose persist failed; retried next cycle.
    pub failed: usize,
    /// Alerts delivered.
    pub alerts_sent: usize,
    /// Wall-clock duration of the cycle in milliseconds.
    pub duration_ms: u128,
}

enum GroupOutcome {
    Processed { alert_sent: bool },
    SkippedFetch,
    Removed,
}

/// Runs aggregation cycles; at most one at a time.
pub struct CycleRunner {
    registry: Arc<dyn GroupRegistry>,
    gateway: Arc<dyn ChatGateway>,
    reconciler: Reconciler,
    trigger: NotificationTrigger,
    cycle_lock: Mutex<()>,
    shutdown: AtomicBool,
}

impl CycleRunner {
    /// Create a runner over the given registry and gateway.
    pub fn new(
        registry: Arc<dyn GroupRegistry>,
        gateway: Arc<dyn ChatGateway>,
        config: &TrackerConfig,
    ) -> Self {
        let reconciler = Reconciler::new(
            gateway.clone(),
            config.fetch_limit,
            config.fetch_timeout(),
            config.lookback_days,
        );
        Self {
            registry,
            gateway,
            reconciler,
            trigger: NotificationTrigger::new(config.low_threshold),
            cycle_lock: Mutex::new(()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Request shutdown: the in-flight cycle stops before its next group
    /// and delivers no further alerts.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run one cycle unless a previous one is still in flight.
    ///
    /// Returns `None` when skipped due to overlap. An error here means the
    /// registry itself was unavailable; per-group failures are absorbed
    /// into the report.
    pub async fn try_run_cycle(&self) -> ClanPulseResult<Option<CycleReport>> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("previous aggregation cycle still running; tick skipped");
            return Ok(None);
        };
        self.run_cycle().await.map(Some)
    }

    async fn run_cycle(&self) -> ClanPulseResult<CycleReport> {
        let started = Instant::now();
        let groups = self.registry.list()?;
        let mut report = CycleReport::default();

        for group in &groups {
            if self.is_shutting_down() {
                info!("shutdown requested; abandoning aggregation cycle");
                break;
            }
            match self.process_group(group).await {
                Ok(GroupOutcome::Processed { alert_sent }) => {
                    report.processed += 1;
                    if alert_sent {
                        report.alerts_sent += 1;
                    }
                }
                Ok(GroupOutcome::SkippedFetch) => report.skipped += 1,
                Ok(GroupOutcome::Removed) => report.removed += 1,
                // Resource-exhaustion-class failures escalate; anything
                // local to this group is absorbed and retried next cycle.
                Err(e) if !e.is_group_local() => return Err(e),
                Err(e) => {
                    error!(
                        group = %group.id,
                        error = %e,
                        "group cycle failed; state retried next cycle"
                    );
                    report.failed += 1;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis();
        Ok(report)
    }

    async fn process_group(&self, group: &Group) -> ClanPulseResult<GroupOutcome> {
        // Work from a fresh snapshot; live counting may have moved the
        // record since list().
        let Some(mut current) = self.registry.get(&group.id)? else {
            return Ok(GroupOutcome::Removed);
        };

        let counts = match self.reconciler.reconcile(&current).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(
                    group = %current.id,
                    channel = %current.channel_id,
                    error = %e,
                    "history fetch failed; keeping previous counts this cycle"
                );
                return Ok(GroupOutcome::SkippedFetch);
            }
        };

        current.counts = counts;
        current.raw_count = 0;
        let score = activity_score(&current.counts);
        current.score = score;
        let alert = self.trigger.evaluate(&mut current, score);

        // The unregister path is authoritative: a vanished row stays gone.
        if !self.registry.update(&current)? {
            debug!(group = %current.id, "group unregistered mid-cycle; persist dropped");
            return Ok(GroupOutcome::Removed);
        }

        let Some(alert) = alert else {
            return Ok(GroupOutcome::Processed { alert_sent: false });
        };

        if self.is_shutting_down() {
            return Ok(GroupOutcome::Processed { alert_sent: false });
        }

        let Some(text) = alert.text() else {
            info!(
                group = %current.id,
                tier = alert.tier.as_str(),
                score,
                "alert computed but group has no role; delivery skipped"
            );
            return Ok(GroupOutcome::Processed { alert_sent: false });
        };

        match self.gateway.send_to_channel(&alert.channel_id, &text).await {
            Ok(()) => {
                info!(
                    group = %current.id,
                    tier = alert.tier.as_str(),
                    score,
                    "alert delivered"
                );
                Ok(GroupOutcome::Processed { alert_sent: true })
            }
            Err(e) => {
                warn!(
                    group = %current.id,
                    error = %e,
                    "alert delivery failed; not retried this cycle"
                );
                Ok(GroupOutcome::Processed { alert_sent: false })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClanPulseError;
    use crate::registry::SqliteGroupRegistry;
    use crate::traits::ChannelMessage;
    use crate::types::AlertTier;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// Scripted gateway: fixed history per channel, records deliveries,
    /// optional per-fetch hook and delay.
    struct ScriptedGateway {
        messages: Vec<ChannelMessage>,
        fail_fetch: bool,
        fetch_delay: std::time::Duration,
        sent: std::sync::Mutex<Vec<(String, String)>>,
        on_fetch: Option<Box<dyn Fn() + Send + Sync>>,
    }

    impl ScriptedGateway {
        fn with_messages(messages: Vec<ChannelMessage>) -> Self {
            Self {
                messages,
                fail_fetch: false,
                fetch_delay: std::time::Duration::ZERO,
                sent: std::sync::Mutex::new(Vec::new()),
                on_fetch: None,
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatGateway for ScriptedGateway {
        async fn fetch_recent_messages(
            &self,
            _channel_id: &str,
            _limit: usize,
        ) -> ClanPulseResult<Vec<ChannelMessage>> {
            if let Some(hook) = &self.on_fetch {
                hook();
            }
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            if self.fail_fetch {
                return Err(ClanPulseError::fetch("channel unreachable"));
            }
            Ok(self.messages.clone())
        }

        async fn send_to_channel(&self, channel_id: &str, text: &str) -> ClanPulseResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn recent_messages(count: usize) -> Vec<ChannelMessage> {
        let now = Utc::now();
        (0..count)
            .map(|i| ChannelMessage::new(i.to_string(), "u1", now - Duration::minutes(i as i64)))
            .collect()
    }

    fn runner_with(
        gateway: Arc<ScriptedGateway>,
        registry: Arc<SqliteGroupRegistry>,
    ) -> CycleRunner {
        CycleRunner::new(registry, gateway, &TrackerConfig::default())
    }

    #[tokio::test]
    async fn test_cycle_reconciles_scores_and_alerts_once() {
        let registry = Arc::new(SqliteGroupRegistry::in_memory().unwrap());
        let mut group = Group::new("#AAA", "1001").with_role("2001");
        group.raw_count = 7;
        registry.insert(&group).unwrap();

        // 3 recent messages: counts {3,3,3,3}, score 0.3 -> LOW.
        let gateway = Arc::new(ScriptedGateway::with_messages(recent_messages(3)));
        let runner = runner_with(gateway.clone(), registry.clone());

        let report = runner.try_run_cycle().await.unwrap().unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.alerts_sent, 1);

        let stored = registry.get("#AAA").unwrap().unwrap();
        assert_eq!(stored.counts.day, 3);
        assert_eq!(stored.raw_count, 0);
        assert!((stored.score - 0.3).abs() < 1e-12);
        assert_eq!(stored.last_notified_state, AlertTier::Low);

        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "1001");
        assert!(sent[0].1.contains("<@&2001>"));

        // Same tier next cycle: no re-alert.
        let report = runner.try_run_cycle().await.unwrap().unwrap();
        assert_eq!(report.alerts_sent, 0);
        assert_eq!(gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_counts() {
        let registry = Arc::new(SqliteGroupRegistry::in_memory().unwrap());
        let mut group = Group::new("#AAA", "1001");
        group.counts = crate::types::WindowCounts::new(5, 5, 5, 5);
        group.score = 0.5;
        registry.insert(&group).unwrap();

        let gateway = Arc::new(ScriptedGateway {
            fail_fetch: true,
            ..ScriptedGateway::with_messages(vec![])
        });
        let runner = runner_with(gateway, registry.clone());

        let report = runner.try_run_cycle().await.unwrap().unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 0);

        let stored = registry.get("#AAA").unwrap().unwrap();
        assert_eq!(stored.counts.day, 5);
    }

    #[tokio::test]
    async fn test_alert_skipped_without_role() {
        let registry = Arc::new(SqliteGroupRegistry::in_memory().unwrap());
        registry.insert(&Group::new("#AAA", "1001")).unwrap();

        let gateway = Arc::new(ScriptedGateway::with_messages(vec![]));
        let runner = runner_with(gateway.clone(), registry.clone());

        let report = runner.try_run_cycle().await.unwrap().unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.alerts_sent, 0);
        assert!(gateway.sent().is_empty());

        // Tier was still recorded, so a later role assignment does not
        // replay the old transition.
        let stored = registry.get("#AAA").unwrap().unwrap();
        assert_eq!(stored.last_notified_state, AlertTier::Low);
    }

    #[tokio::test]
    async fn test_unregister_mid_cycle_is_not_resurrected() {
        let registry = Arc::new(SqliteGroupRegistry::in_memory().unwrap());
        registry
            .insert(&Group::new("#AAA", "1001").with_role("2001"))
            .unwrap();

        // The fetch hook deletes the group while its reconciliation is in
        // flight; the subsequent persist must drop silently.
        let registry_for_hook = registry.clone();
        let gateway = Arc::new(ScriptedGateway {
            on_fetch: Some(Box::new(move || {
                registry_for_hook.delete("#AAA").unwrap();
            })),
            ..ScriptedGateway::with_messages(recent_messages(2))
        });
        let runner = runner_with(gateway.clone(), registry.clone());

        let report = runner.try_run_cycle().await.unwrap().unwrap();
        assert_eq!(report.removed, 1);
        assert!(registry.get("#AAA").unwrap().is_none());
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_cycle_is_skipped() {
        let registry = Arc::new(SqliteGroupRegistry::in_memory().unwrap());
        registry.insert(&Group::new("#AAA", "1001")).unwrap();

        let gateway = Arc::new(ScriptedGateway {
            fetch_delay: std::time::Duration::from_millis(300),
            ..ScriptedGateway::with_messages(vec![])
        });
        let runner = Arc::new(runner_with(gateway, registry));

        let slow = runner.clone();
        let handle = tokio::spawn(async move { slow.try_run_cycle().await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // Tick lands while the first cycle is mid-fetch: skipped.
        let overlapped = runner.try_run_cycle().await.unwrap();
        assert!(overlapped.is_none());

        let first = handle.await.unwrap().unwrap();
        assert!(first.is_some());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_cycle() {
        let registry = Arc::new(SqliteGroupRegistry::in_memory().unwrap());
        registry.insert(&Group::new("#AAA", "1001")).unwrap();
        registry.insert(&Group::new("#BBB", "1002")).unwrap();

        let gateway = Arc::new(ScriptedGateway::with_messages(vec![]));
        let runner = runner_with(gateway, registry);
        runner.begin_shutdown();

        let report = runner.try_run_cycle().await.unwrap().unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.alerts_sent, 0);
    }
}
