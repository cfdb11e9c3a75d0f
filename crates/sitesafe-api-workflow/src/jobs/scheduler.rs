//! Job scheduler.
//!
//! Drives each job on its own explicit interval. No dynamic job registry:
//! the set of background jobs is part of the worker's type, and adding one
//! means adding a field and a ticker here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument};

use super::escalation_job::EscalationJob;
use super::sla_monitoring_job::SlaMonitoringJob;

/// Scheduler for the workflow background jobs.
pub struct JobScheduler {
    escalation: Arc<EscalationJob>,
    sla_monitoring: Arc<SlaMonitoringJob>,
    escalation_interval: Duration,
    sla_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl JobScheduler {
    pub fn new(escalation: EscalationJob, sla_monitoring: SlaMonitoringJob) -> Self {
        let escalation_interval = Duration::from_secs(escalation.poll_interval_secs());
        let sla_interval = Duration::from_secs(sla_monitoring.poll_interval_secs());
        Self {
            escalation: Arc::new(escalation),
            sla_monitoring: Arc::new(sla_monitoring),
            escalation_interval,
            sla_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the per-job intervals.
    #[must_use]
    pub fn with_intervals(mut self, escalation: Duration, sla: Duration) -> Self {
        self.escalation_interval = escalation;
        self.sla_interval = sla;
        self
    }

    /// Run until shutdown is requested. A failing poll is logged and retried
    /// on the next tick; it never stops the loop.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            escalation_interval_secs = self.escalation_interval.as_secs(),
            sla_interval_secs = self.sla_interval.as_secs(),
            "Starting workflow job scheduler"
        );

        let mut escalation_tick = interval(self.escalation_interval);
        escalation_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sla_tick = interval(self.sla_interval);
        sla_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = escalation_tick.tick() => {
                    if self.is_shutdown() {
                        break;
                    }
                    if let Err(e) = self.escalation.poll().await {
                        error!(error = %e, "Escalation sweep failed");
                    }
                }
                _ = sla_tick.tick() => {
                    if self.is_shutdown() {
                        break;
                    }
                    if let Err(e) = self.sla_monitoring.poll().await {
                        error!(error = %e, "SLA monitoring pass failed");
                    }
                }
            }
        }

        info!("Workflow job scheduler stopped");
    }

    /// Request graceful shutdown. The current poll finishes first.
    pub fn shutdown(&self) {
        info!("Scheduler shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Handle that can request shutdown from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }
}
