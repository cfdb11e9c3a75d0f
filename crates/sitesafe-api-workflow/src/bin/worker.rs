//! Workflow sweeper worker.
//!
//! Runs the escalation sweeper and SLA monitor against the configured
//! database until SIGTERM or Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use sitesafe_api_workflow::config::WorkerConfig;
use sitesafe_api_workflow::jobs::{EscalationJob, JobScheduler, SlaMonitoringJob};
use sitesafe_api_workflow::services::{
    EscalationService, StaticApproverDirectory, TracingNotificationSink,
};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sitesafe_api_workflow=debug")),
        )
        .init();

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    tracing::info!(
        sweep_interval_secs = config.sweep_interval_secs,
        sla_interval_secs = config.sla_interval_secs,
        batch_size = config.batch_size,
        "Starting workflow worker"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Database connection error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = sitesafe_db::migrations::run_migrations(&pool).await {
        eprintln!("Migration error: {e}");
        std::process::exit(1);
    }

    // Deployments wire a real directory and notification service here; the
    // worker defaults keep role steps inert and log every intent.
    let directory = Arc::new(StaticApproverDirectory::new());
    let notifier = Arc::new(TracingNotificationSink);

    let escalation_job = EscalationJob::new(EscalationService::new(
        pool.clone(),
        directory,
        notifier.clone(),
    ))
    .with_batch_size(config.batch_size);
    let sla_job =
        SlaMonitoringJob::new(pool.clone(), notifier).with_batch_size(config.batch_size);

    let scheduler = Arc::new(JobScheduler::new(escalation_job, sla_job).with_intervals(
        Duration::from_secs(config.sweep_interval_secs),
        Duration::from_secs(config.sla_interval_secs),
    ));

    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    shutdown_signal().await;
    scheduler.shutdown();
    if let Err(e) = runner.await {
        tracing::error!(error = %e, "Scheduler task panicked");
    }
    pool.close().await;
    tracing::info!("Workflow worker stopped");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
