//! End-to-end aggregation cycle tests against a scripted gateway and a
//! file-backed registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use clanpulse_core::{
    ActivityTracker, AlertTier, ChannelMessage, ChatGateway, ClanPulseResult, TrackerConfig,
};

/// Gateway with a fixed history per channel, recording deliveries.
#[derive(Default)]
struct FixtureGateway {
    history: HashMap<String, Vec<ChannelMessage>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FixtureGateway {
    fn with_channel(mut self, channel_id: &str, messages: Vec<ChannelMessage>) -> Self {
        self.history.insert(channel_id.to_string(), messages);
        self
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for FixtureGateway {
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> ClanPulseResult<Vec<ChannelMessage>> {
        match self.history.get(channel_id) {
            Some(messages) => Ok(messages.iter().take(limit).cloned().collect()),
            None => Err(clanpulse_core::ClanPulseError::fetch(format!(
                "channel {channel_id} unreachable"
            ))),
        }
    }

    async fn send_to_channel(&self, channel_id: &str, text: &str) -> ClanPulseResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

fn burst(count: usize, hours_ago: i64) -> Vec<ChannelMessage> {
    let base = Utc::now() - Duration::hours(hours_ago);
    (0..count)
        .map(|i| ChannelMessage::new(i.to_string(), "u1", base - Duration::seconds(i as i64)))
        .collect()
}

fn config(dir: &tempfile::TempDir) -> TrackerConfig {
    TrackerConfig::default().with_db_path(dir.path().join("groups.db"))
}

#[tokio::test]
async fn quiet_group_gets_one_low_alert_across_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(FixtureGateway::default().with_channel("1001", burst(3, 1)));
    let tracker = ActivityTracker::new(config(&dir), gateway.clone()).unwrap();

    tracker.register_group("#AAA", "1001", Some("2001")).unwrap();

    let report = tracker.run_cycle_now().await.unwrap().unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.alerts_sent, 1);

    // Score 0.3 from counts {3,3,3,3}; persisted and readable.
    let score = tracker.get_score("#AAA").unwrap();
    assert!((score - 0.3).abs() < 1e-12);

    // Further cycles at the same tier stay quiet.
    tracker.run_cycle_now().await.unwrap().unwrap();
    tracker.run_cycle_now().await.unwrap().unwrap();
    assert_eq!(gateway.sent().len(), 1);
    assert!(gateway.sent()[0].1.contains("improve clan activity"));
}

#[tokio::test]
async fn perfect_group_gets_high_alert_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    // 100 messages an hour old: every window counts 100, raw = 100 -> 10.0.
    let gateway = Arc::new(FixtureGateway::default().with_channel("1001", burst(100, 1)));
    let tracker = ActivityTracker::new(config(&dir), gateway.clone()).unwrap();

    tracker.register_group("#AAA", "1001", Some("2001")).unwrap();

    tracker.run_cycle_now().await.unwrap().unwrap();
    assert_eq!(tracker.get_score("#AAA").unwrap(), 10.0);
    assert_eq!(tracker.get_group("#AAA").unwrap().last_notified_state, AlertTier::High);

    tracker.run_cycle_now().await.unwrap().unwrap();

    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("Well done"));
}

#[tokio::test]
async fn unreachable_channel_skips_group_but_cycle_continues() {
    let dir = tempfile::tempdir().unwrap();
    // "#BAD" counts a channel the gateway has no fixture for.
    let gateway = Arc::new(FixtureGateway::default().with_channel("1001", burst(5, 1)));
    let tracker = ActivityTracker::new(config(&dir), gateway).unwrap();

    tracker.register_group("#BAD", "9999", None).unwrap();
    tracker.register_group("#OK", "1001", None).unwrap();

    let report = tracker.run_cycle_now().await.unwrap().unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.processed, 1);

    assert_eq!(tracker.get_group("#OK").unwrap().counts.day, 5);
    // Previous (zero) counts retained for the skipped group.
    assert_eq!(tracker.get_group("#BAD").unwrap().counts.day, 0);
}

#[tokio::test]
async fn counters_and_state_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(FixtureGateway::default().with_channel("1001", burst(40, 1)));

    {
        let tracker = ActivityTracker::new(config(&dir), gateway.clone()).unwrap();
        tracker.register_group("#AAA", "1001", Some("2001")).unwrap();
        tracker.run_cycle_now().await.unwrap().unwrap();
    }

    // New process over the same database.
    let tracker = ActivityTracker::new(config(&dir), gateway.clone()).unwrap();
    let group = tracker.get_group("#AAA").unwrap();
    assert_eq!(group.counts.day, 40);
    assert_eq!(group.last_notified_state, AlertTier::Low);

    // The restored tier still suppresses the duplicate alert.
    tracker.run_cycle_now().await.unwrap().unwrap();
    assert_eq!(gateway.sent().len(), 1);
}

#[tokio::test]
async fn live_counts_reset_by_reconciliation() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(FixtureGateway::default().with_channel("1001", burst(2, 1)));
    let tracker = ActivityTracker::new(config(&dir), gateway).unwrap();

    tracker.register_group("#AAA", "1001", None).unwrap();
    tracker.on_message_created("1001").unwrap();
    tracker.on_message_created("1001").unwrap();
    assert_eq!(tracker.get_group("#AAA").unwrap().raw_count, 2);

    tracker.run_cycle_now().await.unwrap().unwrap();

    let group = tracker.get_group("#AAA").unwrap();
    assert_eq!(group.raw_count, 0);
    assert_eq!(group.counts.day, 2);
}
