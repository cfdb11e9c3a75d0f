//! Workflow engine services and background jobs.
//!
//! This crate wires the pure domain logic in `sitesafe-workflow` against the
//! persistence layer in `sitesafe-db`:
//!
//! - [`services`] - template publishing, instance execution, delegation,
//!   escalation and entity SLA tracking
//! - [`jobs`] - the escalation sweeper and SLA monitor, plus the scheduler
//!   that drives them
//! - [`config`] - environment configuration for the worker binary

pub mod config;
pub mod jobs;
pub mod services;
