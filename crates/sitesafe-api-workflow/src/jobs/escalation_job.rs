//! Escalation sweeper.
//!
//! Pages through live workflow instances and evaluates each template's
//! escalation rules. Safe to run from several processes at once: firing is
//! claimed through the escalation log's unique constraint, so a rule applies
//! at most once per (instance, rule, step).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use sitesafe_db::models::WorkflowInstance;

use crate::services::EscalationService;

/// Default polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default batch size for paging through live instances.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Statistics from one sweep.
#[derive(Debug, Clone, Default)]
pub struct EscalationSweepStats {
    /// Live instances examined.
    pub scanned: usize,
    /// Rules that fired for the first time.
    pub fired: usize,
    /// Rules whose deadline had passed but had already fired.
    pub already_fired: usize,
    /// Instances whose evaluation failed.
    pub failed: usize,
}

impl EscalationSweepStats {
    /// Merge stats from another sweep.
    pub fn merge(&mut self, other: &EscalationSweepStats) {
        self.scanned += other.scanned;
        self.fired += other.fired;
        self.already_fired += other.already_fired;
        self.failed += other.failed;
    }
}

/// Errors from the escalation sweeper.
#[derive(Debug, thiserror::Error)]
pub enum EscalationJobError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Job that sweeps live instances for due escalations.
pub struct EscalationJob {
    service: Arc<EscalationService>,
    batch_size: i64,
}

impl EscalationJob {
    pub fn new(service: EscalationService) -> Self {
        Self {
            service: Arc::new(service),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run a single sweep over all live instances.
    #[instrument(skip(self))]
    pub async fn poll(&self) -> Result<EscalationSweepStats, EscalationJobError> {
        let now = Utc::now();
        let mut stats = EscalationSweepStats::default();
        let mut after = None;

        loop {
            let batch =
                WorkflowInstance::list_active(self.service.pool(), after, self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            after = batch.last().map(|i| i.id);

            for instance in &batch {
                stats.scanned += 1;
                match self.service.evaluate_instance(instance, now).await {
                    Ok(outcome) => {
                        stats.fired += outcome.fired;
                        stats.already_fired += outcome.already_fired;
                    }
                    Err(e) => {
                        warn!(instance_id = %instance.id, error = %e, "Escalation evaluation failed");
                        stats.failed += 1;
                    }
                }
            }
        }

        if stats.fired > 0 || stats.failed > 0 {
            info!(
                scanned = stats.scanned,
                fired = stats.fired,
                already_fired = stats.already_fired,
                failed = stats.failed,
                "Completed escalation sweep"
            );
        } else {
            debug!(scanned = stats.scanned, "Escalation sweep found nothing due");
        }
        Ok(stats)
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
        let mut a = EscalationSweepStats {
            scanned: 10,
            fired: 2,
            already_fired: 1,
            failed: 1,
        };
        let b = EscalationSweepStats {
            scanned: 5,
            fired: 1,
            already_fired: 0,
            failed: 0,
        };
        a.merge(&b);
        assert_eq!(a.scanned, 15);
        assert_eq!(a.fired, 3);
        assert_eq!(a.already_fired, 1);
        assert_eq!(a.failed, 1);
    }
}
