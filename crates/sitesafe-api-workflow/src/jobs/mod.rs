//! Background jobs for the workflow engine.
//!
//! - Escalation sweeper - evaluates template escalation rules against live
//!   instances on a fixed cadence
//! - SLA monitoring - marks workflow and entity SLA warnings and breaches
//! - Scheduler - drives both jobs with explicit per-job intervals

pub mod escalation_job;
pub mod scheduler;
pub mod sla_monitoring_job;

pub use escalation_job::{EscalationJob, EscalationJobError, EscalationSweepStats};
pub use scheduler::JobScheduler;
pub use sla_monitoring_job::{SlaMonitoringJob, SlaMonitoringJobError, SlaMonitoringStats};
