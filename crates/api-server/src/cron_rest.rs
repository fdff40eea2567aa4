//! Scheduled-job triggers and reconciliation run history.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use rendizy_core::reconciliation::{ReconciliationItem, ReconciliationRun};
use rendizy_core::stats::ImportMissingStats;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::rest::{error_response, ApiError, AppState, ErrorResponse};

const DEFAULT_RUNS_LIMIT: usize = 20;
const MAX_RUNS_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileParams {
    /// Detect divergences without writing corrections.
    #[serde(default)]
    pub dry_run: bool,
    /// Maximum reservations to check, clamped to the configured cap.
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ImportMissingParams {
    pub days_ahead: Option<i64>,
    pub days_back: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RunsParams {
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub success: bool,
    pub run: ReconciliationRun,
}

#[derive(Serialize, ToSchema)]
pub struct ImportMissingResponse {
    pub message: String,
    pub success: bool,
    pub arrival: ImportMissingStats,
    pub creation: ImportMissingStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct RunsResponse {
    pub success: bool,
    pub runs: Vec<ReconciliationRun>,
}

#[derive(Serialize, ToSchema)]
pub struct RunItemsResponse {
    pub success: bool,
    pub run_id: Uuid,
    pub items: Vec<ReconciliationItem>,
}

/// POST /cron/staysnet-reservations-reconcile — Compare local reservations with Stays.net.
#[utoipa::path(
    post,
    path = "/cron/staysnet-reservations-reconcile",
    tag = "Reconciliation",
    params(ReconcileParams),
    responses(
        (status = 200, description = "Run finished; see run.status", body = ReconcileResponse),
        (status = 400, description = "Integration not configured", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
    )
)]
pub async fn handle_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReconcileParams>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let run = state
        .service
        .reconcile(&organization_id, params.dry_run, params.limit)
        .await
        .map_err(error_response)?;

    Ok(Json(ReconcileResponse {
        success: run.error_message.is_none(),
        run,
    }))
}

/// POST /cron/staysnet-import-missing — Import Stays.net reservations absent locally.
#[utoipa::path(
    post,
    path = "/cron/staysnet-import-missing",
    tag = "Reconciliation",
    params(ImportMissingParams),
    responses(
        (status = 200, description = "Import finished", body = ImportMissingResponse),
        (status = 400, description = "Integration not configured", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
    )
)]
pub async fn handle_import_missing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ImportMissingParams>,
) -> Result<Json<ImportMissingResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let outcome = state
        .service
        .import_missing(&organization_id, params.days_ahead, params.days_back)
        .await
        .map_err(error_response)?;

    let imported = outcome.arrival.imported + outcome.creation.imported;
    Ok(Json(ImportMissingResponse {
        message: format!("{imported} reserva(s) importada(s)"),
        success: outcome.success,
        arrival: outcome.arrival,
        creation: outcome.creation,
        timestamp: Utc::now(),
    }))
}

/// GET /reconciliation/runs — Most recent reconciliation runs.
#[utoipa::path(
    get,
    path = "/reconciliation/runs",
    tag = "Reconciliation",
    params(RunsParams),
    responses((status = 200, description = "Runs, newest first", body = RunsResponse))
)]
pub async fn handle_list_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RunsParams>,
) -> Result<Json<RunsResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RUNS_LIMIT)
        .clamp(1, MAX_RUNS_LIMIT);

    let runs = state
        .service
        .list_runs(&organization_id, limit)
        .await
        .map_err(error_response)?;

    Ok(Json(RunsResponse { success: true, runs }))
}

/// GET /reconciliation/runs/{id}/items — Items recorded by one run.
#[utoipa::path(
    get,
    path = "/reconciliation/runs/{id}/items",
    tag = "Reconciliation",
    params(("id" = Uuid, Path, description = "Reconciliation run id")),
    responses(
        (status = 200, description = "Items of the run", body = RunItemsResponse),
        (status = 404, description = "Run not found for this organization", body = ErrorResponse),
    )
)]
pub async fn handle_run_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunItemsResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let items = state
        .service
        .run_items(&organization_id, run_id)
        .await
        .map_err(error_response)?;

    Ok(Json(RunItemsResponse {
        success: true,
        run_id,
        items,
    }))
}
