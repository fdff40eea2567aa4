use std::sync::Arc;
use std::time::Duration;

use rendizy_core::config::SchedulerConfig;
use rendizy_core::SyncError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::service::StaysNetSyncService;

/// Spawn the periodic reconciliation, auto-sync and webhook tasks for one
/// organization. Auto sync ticks are skipped unless the stored settings
/// enable it.
pub fn spawn_scheduler(
    service: Arc<StaysNetSyncService>,
    organization_id: String,
    config: &SchedulerConfig,
) -> Vec<JoinHandle<()>> {
    let reconcile_every = Duration::from_secs(config.reconcile_interval_secs.max(1));
    let auto_sync_every = Duration::from_secs(config.auto_sync_interval_secs.max(1));
    let webhooks_every = Duration::from_secs(config.webhook_interval_secs.max(1));

    info!(
        organization_id = %organization_id,
        reconcile_interval_secs = reconcile_every.as_secs(),
        auto_sync_interval_secs = auto_sync_every.as_secs(),
        webhook_interval_secs = webhooks_every.as_secs(),
        "starting Stays.net scheduler"
    );

    let reconcile_service = service.clone();
    let reconcile_org = organization_id.clone();
    let reconcile = tokio::spawn(async move {
        let mut interval = tokio::time::interval(reconcile_every);
        // First tick fires immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            match reconcile_service.reconcile(&reconcile_org, false, None).await {
                Ok(run) => info!(run_id = %run.id, status = ?run.status, "scheduled reconciliation done"),
                Err(e) => log_job_error("reconcile", &e),
            }
        }
    });

    let webhooks_service = service.clone();
    let webhooks_org = organization_id.clone();
    let webhooks = tokio::spawn(async move {
        let mut interval = tokio::time::interval(webhooks_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            match webhooks_service.process_webhooks(&webhooks_org, None).await {
                Ok(stats) if stats.processed > 0 => {
                    info!(processed = stats.processed, errors = stats.errors, "scheduled webhook drain done")
                }
                Ok(_) => {}
                Err(e) => log_job_error("webhooks", &e),
            }
        }
    });

    let auto_sync = tokio::spawn(async move {
        let mut interval = tokio::time::interval(auto_sync_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            if !service.auto_sync_enabled(&organization_id).await {
                continue;
            }
            match service.auto_sync(&organization_id).await {
                Ok(outcome) => info!(success = outcome.success, "scheduled auto sync done"),
                Err(e) => log_job_error("auto_sync", &e),
            }
        }
    });

    vec![reconcile, webhooks, auto_sync]
}

fn log_job_error(job: &str, e: &SyncError) {
    if e.is_transient() {
        warn!(job = job, error = %e, "scheduled job skipped, will retry next tick");
    } else {
        error!(job = job, error = %e, "scheduled job failed");
    }
}
