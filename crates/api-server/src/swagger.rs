//! OpenAPI document of the HTTP surface.

use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rendizy Stays.net Sync API",
        version = "0.1.0",
        description = "Imports guests, properties, reservations, blocks and owners from Stays.net \
                       and reconciles local reservations against the channel.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Stays.net", description = "Full import, calendar, owners, automatic sync, webhooks and connection check"),
        (name = "Reconciliation", description = "Reservation reconciliation, missing import and run history"),
        (name = "Settings", description = "Per-organization Stays.net credentials"),
        (name = "Operations", description = "Health and liveness probes"),
    ),
    paths(
        // Stays.net
        crate::staysnet_rest::handle_full_import,
        crate::staysnet_rest::handle_calendar_sync,
        crate::staysnet_rest::handle_owners_sync,
        crate::staysnet_rest::handle_auto_sync,
        crate::staysnet_rest::handle_test_connection,
        crate::staysnet_rest::handle_webhook,
        crate::staysnet_rest::handle_webhook_for_organization,
        crate::staysnet_rest::handle_process_webhooks,
        // Settings
        crate::staysnet_rest::handle_get_settings,
        crate::staysnet_rest::handle_save_settings,
        // Reconciliation
        crate::cron_rest::handle_reconcile,
        crate::cron_rest::handle_import_missing,
        crate::cron_rest::handle_list_runs,
        crate::cron_rest::handle_run_items,
        // Operations
        crate::rest::health_check,
        crate::rest::liveness,
    ),
    components(schemas(
        // Requests
        rendizy_sync::FullSyncRequest,
        rendizy_sync::CalendarSyncRequest,
        rendizy_core::types::StaysNetSettings,
        crate::staysnet_rest::ConnectionTestRequest,
        // Stats
        rendizy_core::stats::EntityStats,
        rendizy_core::stats::SyncStats,
        rendizy_core::stats::SyncOutcome,
        rendizy_core::stats::CalendarStats,
        rendizy_core::stats::CalendarOutcome,
        rendizy_core::stats::OwnersStats,
        rendizy_core::stats::ImportMissingStats,
        rendizy_core::stats::WebhookStats,
        // Reconciliation records
        rendizy_core::reconciliation::RunStatus,
        rendizy_core::reconciliation::IssueType,
        rendizy_core::reconciliation::ActionTaken,
        rendizy_core::reconciliation::RunCounters,
        rendizy_core::reconciliation::ReconciliationRun,
        rendizy_core::reconciliation::ReconciliationItem,
        // Responses
        crate::staysnet_rest::FullSyncResponse,
        crate::staysnet_rest::CalendarSyncResponse,
        crate::staysnet_rest::OwnersSyncResponse,
        crate::staysnet_rest::AutoSyncResponse,
        crate::staysnet_rest::SettingsResponse,
        crate::staysnet_rest::ConnectionTestResponse,
        crate::staysnet_rest::WebhookReceivedResponse,
        crate::staysnet_rest::WebhookProcessResponse,
        crate::cron_rest::ReconcileResponse,
        crate::cron_rest::ImportMissingResponse,
        crate::cron_rest::RunsResponse,
        crate::cron_rest::RunItemsResponse,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json — Generated OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
