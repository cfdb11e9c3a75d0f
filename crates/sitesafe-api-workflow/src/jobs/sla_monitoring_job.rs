//! SLA monitor.
//!
//! Two responsibilities on one cadence: marking workflow instances whose SLA
//! deadline passed (monotonic breach flag plus notification), and walking
//! entity SLA tracking rows for warning and breach transitions. The
//! monotonic guards in the models make both passes idempotent under
//! concurrent sweeps.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

use sitesafe_db::models::{SlaTracking, WorkflowInstance};

use crate::services::{Notification, NotificationSink};

/// Default polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default batch size per query.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Statistics from one monitoring pass.
#[derive(Debug, Clone, Default)]
pub struct SlaMonitoringStats {
    /// Workflow instances newly marked breached.
    pub instance_breaches: usize,
    /// Entity tracking rows with a warning newly sent.
    pub entity_warnings: usize,
    /// Entity tracking rows newly marked breached.
    pub entity_breaches: usize,
    /// Rows that failed to process.
    pub failed: usize,
}

impl SlaMonitoringStats {
    /// Merge stats from another pass.
    pub fn merge(&mut self, other: &SlaMonitoringStats) {
        self.instance_breaches += other.instance_breaches;
        self.entity_warnings += other.entity_warnings;
        self.entity_breaches += other.entity_breaches;
        self.failed += other.failed;
    }
}

/// Errors from the SLA monitor.
#[derive(Debug, thiserror::Error)]
pub enum SlaMonitoringJobError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Job that marks SLA warnings and breaches.
pub struct SlaMonitoringJob {
    pool: PgPool,
    notifier: Arc<dyn NotificationSink>,
    batch_size: i64,
}

impl SlaMonitoringJob {
    pub fn new(pool: PgPool, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            pool,
            notifier,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run one monitoring pass.
    #[instrument(skip(self))]
    pub async fn poll(&self) -> Result<SlaMonitoringStats, SlaMonitoringJobError> {
        let mut stats = SlaMonitoringStats::default();
        stats.merge(&self.mark_instance_breaches().await?);
        stats.merge(&self.send_entity_warnings().await?);
        stats.merge(&self.mark_entity_breaches().await?);

        if stats.instance_breaches + stats.entity_warnings + stats.entity_breaches > 0 {
            info!(
                instance_breaches = stats.instance_breaches,
                entity_warnings = stats.entity_warnings,
                entity_breaches = stats.entity_breaches,
                failed = stats.failed,
                "Completed SLA monitoring pass"
            );
        } else {
            debug!("SLA monitoring pass found nothing due");
        }
        Ok(stats)
    }

    async fn mark_instance_breaches(&self) -> Result<SlaMonitoringStats, SlaMonitoringJobError> {
        let mut stats = SlaMonitoringStats::default();
        let candidates =
            WorkflowInstance::find_sla_breach_candidates(&self.pool, Utc::now(), self.batch_size)
                .await?;

        for instance in candidates {
            match WorkflowInstance::mark_sla_breached(&self.pool, instance.id).await {
                Ok(true) => {
                    stats.instance_breaches += 1;
                    self.notify(Notification::WorkflowSlaBreached {
                        instance_id: instance.id,
                    })
                    .await;
                }
                // Another sweep won the transition.
                Ok(false) => {}
                Err(e) => {
                    warn!(instance_id = %instance.id, error = %e, "Failed to mark instance breach");
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn send_entity_warnings(&self) -> Result<SlaMonitoringStats, SlaMonitoringJobError> {
        let mut stats = SlaMonitoringStats::default();
        let candidates =
            SlaTracking::find_warning_candidates(&self.pool, Utc::now(), self.batch_size).await?;

        for row in candidates {
            match SlaTracking::mark_warning_sent(&self.pool, row.id).await {
                Ok(true) => {
                    stats.entity_warnings += 1;
                    self.notify(Notification::SlaWarning {
                        entity_type: row.entity_type.clone(),
                        entity_id: row.entity_id,
                    })
                    .await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(tracking_id = %row.id, error = %e, "Failed to mark SLA warning");
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn mark_entity_breaches(&self) -> Result<SlaMonitoringStats, SlaMonitoringJobError> {
        let mut stats = SlaMonitoringStats::default();
        let candidates =
            SlaTracking::find_breach_candidates(&self.pool, Utc::now(), self.batch_size).await?;

        for row in candidates {
            match SlaTracking::mark_breached(&self.pool, row.id).await {
                Ok(true) => {
                    stats.entity_breaches += 1;
                    self.notify(Notification::SlaBreached {
                        entity_type: row.entity_type.clone(),
                        entity_id: row.entity_id,
                    })
                    .await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(tracking_id = %row.id, error = %e, "Failed to mark SLA breach");
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.deliver(&notification).await {
            error!(error = %e, "Notification delivery failed");
        }
    }

    /// Recommended poll interval.
    #[must_use]
    pub const fn poll_interval_secs(&self) -> u64 {
        DEFAULT_POLL_INTERVAL_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(DEFAULT_POLL_INTERVAL_SECS, 60);
        assert_eq!(DEFAULT_BATCH_SIZE, 100);
    }

    #[test]
    fn stats_merge() {
        let mut a = SlaMonitoringStats {
            instance_breaches: 1,
            entity_warnings: 2,
            entity_breaches: 0,
            failed: 1,
        };
        a.merge(&SlaMonitoringStats {
            instance_breaches: 1,
            entity_warnings: 0,
            entity_breaches: 3,
            failed: 0,
        });
        assert_eq!(a.instance_breaches, 2);
        assert_eq!(a.entity_warnings, 2);
        assert_eq!(a.entity_breaches, 3);
        assert_eq!(a.failed, 1);
    }
}
