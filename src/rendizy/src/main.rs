//! Rendizy Stays.net sync — imports channel data and reconciles reservations.
//!
//! Main entry point that wires the store, the channel provider and the sync
//! service, then starts the scheduler and the HTTP server.

use clap::Parser;
use rendizy_api::ApiServer;
use rendizy_core::config::AppConfig;
use rendizy_staysnet::StaysNetProvider;
use rendizy_store::MemoryStore;
use rendizy_sync::{spawn_scheduler, StaysNetSyncService};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "rendizy-sync-server")]
#[command(about = "Stays.net import and reservation reconciliation service")]
#[command(version)]
struct Cli {
    /// Organization the service acts on (overrides config)
    #[arg(long, env = "RENDIZY__ORGANIZATION_ID")]
    organization_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "RENDIZY__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "RENDIZY__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Serve HTTP triggers only, without periodic jobs
    #[arg(long, default_value_t = false)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rendizy_sync_server=info,rendizy_sync=info,rendizy_staysnet=info,\
                 rendizy_api=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Rendizy Stays.net sync starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(organization_id) = cli.organization_id {
        config.organization_id = organization_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if cli.no_scheduler {
        config.scheduler.enabled = false;
    }

    info!(
        organization_id = %config.organization_id,
        http_port = config.api.http_port,
        scheduler = config.scheduler.enabled,
        "Configuration loaded"
    );

    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StaysNetProvider::new(&config.sync)?);
    let service = Arc::new(StaysNetSyncService::new(store, provider, config.clone()));

    if !config.organization_id.is_empty() {
        match service
            .seed_settings(&config.organization_id, &config.staysnet)
            .await
        {
            Ok(true) => info!("Stays.net settings seeded"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "Failed to seed Stays.net settings"),
        }
    }

    let api_server = ApiServer::new(config.clone(), service.clone());

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    if config.scheduler.enabled && !config.organization_id.is_empty() {
        spawn_scheduler(service.clone(), config.organization_id.clone(), &config.scheduler);
    } else {
        info!("Scheduler disabled");
    }

    info!("Rendizy Stays.net sync ready");
    api_server.start_http().await?;

    Ok(())
}
