//! API server — HTTP routes plus the Prometheus exporter.

use crate::rest::{self, AppState};
use crate::{cron_rest, staysnet_rest, swagger};
use axum::routing::{get, post};
use axum::Router;
use rendizy_core::config::AppConfig;
use rendizy_sync::StaysNetSyncService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    service: Arc<StaysNetSyncService>,
}

impl ApiServer {
    pub fn new(config: AppConfig, service: Arc<StaysNetSyncService>) -> Self {
        Self { config, service }
    }

    /// Build the router with every route and middleware layer.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.service.clone(), self.config.organization_id.clone());

        Router::new()
            // Stays.net sync triggers
            .route("/staysnet/import/full", post(staysnet_rest::handle_full_import))
            .route("/staysnet/sync/calendar", post(staysnet_rest::handle_calendar_sync))
            .route("/staysnet/sync/owners", post(staysnet_rest::handle_owners_sync))
            .route("/staysnet/sync/auto", post(staysnet_rest::handle_auto_sync))
            .route("/staysnet/test", post(staysnet_rest::handle_test_connection))
            // Webhooks
            .route("/staysnet/webhook", post(staysnet_rest::handle_webhook))
            .route(
                "/staysnet/webhook/:organization_id",
                post(staysnet_rest::handle_webhook_for_organization),
            )
            .route("/staysnet/webhooks/process", post(staysnet_rest::handle_process_webhooks))
            // Settings
            .route(
                "/settings/staysnet",
                get(staysnet_rest::handle_get_settings).post(staysnet_rest::handle_save_settings),
            )
            // Cron triggers and run history
            .route(
                "/cron/staysnet-reservations-reconcile",
                post(cron_rest::handle_reconcile),
            )
            .route("/cron/staysnet-import-missing", post(cron_rest::handle_import_missing))
            .route("/reconciliation/runs", get(cron_rest::handle_list_runs))
            .route("/reconciliation/runs/:id/items", get(cron_rest::handle_run_items))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/live", get(rest::liveness))
            .route("/api-docs/openapi.json", get(swagger::openapi_json))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
