//! Periodic driver for aggregation cycles.
//!
//! Uses tokio-cron-scheduler to run one cycle per fixed period. A tick
//! that fires while the previous cycle is still running is skipped, not
//! queued.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::config::TrackerConfig;
use crate::error::{ClanPulseError, ClanPulseResult};
use crate::tracking::cycle::CycleRunner;

/// Scheduler for periodic aggregation cycles.
pub struct AggregationScheduler {
    scheduler: JobScheduler,
    runner: Arc<CycleRunner>,
    interval_secs: u64,
    run_on_start: bool,
}

impl AggregationScheduler {
    /// Create a new scheduler.
    ///
    /// Note: call `start()` to begin periodic execution.
    pub async fn new(runner: Arc<CycleRunner>, config: &TrackerConfig) -> ClanPulseResult<Self> {
        let scheduler = JobScheduler::new().await.map_err(|e| {
            ClanPulseError::Internal(format!("Failed to create scheduler: {}", e))
        })?;

        Ok(Self {
            scheduler,
            runner,
            interval_secs: config.cycle_interval_secs.max(1),
            run_on_start: config.run_on_start,
        })
    }

    /// Start the scheduler.
    pub async fn start(&self) -> ClanPulseResult<()> {
        let runner = self.runner.clone();

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(self.interval_secs),
            move |_uuid, _lock| {
                let runner = runner.clone();
                Box::pin(async move {
                    debug!("starting aggregation cycle");
                    match runner.try_run_cycle().await {
                        Ok(Some(report)) => {
                            info!(
                                processed = report.processed,
                                skipped = report.skipped,
                                removed = report.removed,
                                failed = report.failed,
                                alerts_sent = report.alerts_sent,
                                duration_ms = report.duration_ms,
                                "aggregation cycle complete"
                            );
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "aggregation cycle failed");
                        }
                    }
                })
            },
        )
        .map_err(|e| ClanPulseError::Internal(format!("Failed to create job: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| ClanPulseError::Internal(format!("Failed to add job: {}", e)))?;

        if self.run_on_start {
            debug!("running initial aggregation cycle on start");
            if let Err(e) = self.runner.try_run_cycle().await {
                error!(error = %e, "initial aggregation cycle failed");
            }
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| ClanPulseError::Internal(format!("Failed to start scheduler: {}", e)))?;

        info!(
            interval_secs = self.interval_secs,
            "aggregation scheduler started"
        );

        Ok(())
    }

    /// Stop the scheduler gracefully: the timer stops and the in-flight
    /// cycle, if any, abandons remaining groups and delivers no further
    /// alerts.
    pub async fn shutdown(&mut self) -> ClanPulseResult<()> {
        info!("shutting down aggregation scheduler");
        self.runner.begin_shutdown();
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| ClanPulseError::Internal(format!("Failed to shutdown scheduler: {}", e)))
    }

    /// Get the underlying cycle runner.
    pub fn runner(&self) -> &Arc<CycleRunner> {
        &self.runner
    }
}
