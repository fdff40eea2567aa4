//! Stays.net sync triggers and integration settings.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use rendizy_core::stats::{
    CalendarOutcome, CalendarStats, OwnersStats, SyncOutcome, SyncStats, WebhookStats,
};
use rendizy_core::types::StaysNetSettings;
use rendizy_sync::{CalendarSyncRequest, FullSyncRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::rest::{bad_request, error_response, ApiError, AppState, ErrorResponse};

const DEFAULT_BASE_URL: &str = "https://stays.net/external/v1";

#[derive(Serialize, ToSchema)]
pub struct FullSyncResponse {
    pub message: String,
    pub stats: SyncStats,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct CalendarSyncResponse {
    pub message: String,
    pub stats: CalendarStats,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct OwnersSyncResponse {
    pub message: String,
    pub stats: Option<OwnersStats>,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct AutoSyncResponse {
    pub message: String,
    pub reservations: SyncOutcome,
    pub calendar: CalendarOutcome,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct SettingsResponse {
    pub success: bool,
    pub data: StaysNetSettings,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookReceivedResponse {
    pub success: bool,
    pub id: Uuid,
    pub action: String,
    pub received: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WebhookProcessParams {
    /// Events to drain, 25 by default, clamped to 1..=200.
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookProcessResponse {
    pub message: String,
    pub success: bool,
    pub stats: WebhookStats,
    pub timestamp: DateTime<Utc>,
}

/// Candidate credentials for a connection check; nothing is stored.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestRequest {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub base_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct ConnectionTestResponse {
    pub message: String,
    pub success: bool,
    pub data: Value,
}

/// Decode an optional JSON body; an empty body yields the default request.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| bad_request("invalid_body", &e.to_string()))
}

fn summary(success: bool, done: &str) -> String {
    if success {
        format!("{done} com sucesso")
    } else {
        format!("{done} com erros")
    }
}

/// POST /staysnet/import/full — Import guests, properties and reservations.
#[utoipa::path(
    post,
    path = "/staysnet/import/full",
    tag = "Stays.net",
    request_body = FullSyncRequest,
    responses(
        (status = 200, description = "Import finished; see success and stats", body = FullSyncResponse),
        (status = 400, description = "Integration not configured or invalid body", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
    )
)]
pub async fn handle_full_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FullSyncResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;
    let request: FullSyncRequest = parse_body(&body)?;

    let outcome = state
        .service
        .full_sync(&organization_id, &request)
        .await
        .map_err(error_response)?;

    Ok(Json(FullSyncResponse {
        message: summary(outcome.success, "Importação completa realizada"),
        stats: outcome.stats,
        success: outcome.success,
        timestamp: Utc::now(),
    }))
}

/// POST /staysnet/sync/calendar — Import availability blocks and rates.
#[utoipa::path(
    post,
    path = "/staysnet/sync/calendar",
    tag = "Stays.net",
    request_body = CalendarSyncRequest,
    responses(
        (status = 200, description = "Calendar sync finished", body = CalendarSyncResponse),
        (status = 400, description = "Integration not configured or invalid body", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
    )
)]
pub async fn handle_calendar_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CalendarSyncResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;
    let request: CalendarSyncRequest = parse_body(&body)?;

    let outcome = state
        .service
        .calendar_sync(&organization_id, &request)
        .await
        .map_err(error_response)?;

    Ok(Json(CalendarSyncResponse {
        message: summary(outcome.success, "Calendário sincronizado"),
        stats: outcome.stats,
        success: outcome.success,
        timestamp: Utc::now(),
    }))
}

/// POST /staysnet/sync/owners — Import property owners.
#[utoipa::path(
    post,
    path = "/staysnet/sync/owners",
    tag = "Stays.net",
    responses(
        (status = 200, description = "Owners sync finished", body = OwnersSyncResponse),
        (status = 400, description = "Integration not configured", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
    )
)]
pub async fn handle_owners_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OwnersSyncResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let outcome = state
        .service
        .owners_sync(&organization_id)
        .await
        .map_err(error_response)?;

    let message = match (&outcome.stats, &outcome.error) {
        (None, Some(error)) => format!("Proprietários indisponíveis: {error}"),
        _ => summary(outcome.success, "Proprietários sincronizados"),
    };
    Ok(Json(OwnersSyncResponse {
        message,
        stats: outcome.stats,
        success: outcome.success,
        error: outcome.error,
        timestamp: Utc::now(),
    }))
}

/// POST /staysnet/sync/auto — Recent reservations followed by calendar.
#[utoipa::path(
    post,
    path = "/staysnet/sync/auto",
    tag = "Stays.net",
    responses(
        (status = 200, description = "Automatic sync finished", body = AutoSyncResponse),
        (status = 400, description = "Integration not configured", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
    )
)]
pub async fn handle_auto_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AutoSyncResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let outcome = state
        .service
        .auto_sync(&organization_id)
        .await
        .map_err(error_response)?;

    Ok(Json(AutoSyncResponse {
        message: summary(outcome.success, "Sincronização automática concluída"),
        reservations: outcome.reservations,
        calendar: outcome.calendar,
        success: outcome.success,
        timestamp: Utc::now(),
    }))
}

/// POST /staysnet/test — Check credentials against the Stays.net API.
#[utoipa::path(
    post,
    path = "/staysnet/test",
    tag = "Stays.net",
    request_body = ConnectionTestRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = ConnectionTestResponse),
        (status = 400, description = "apiKey or baseUrl missing", body = ErrorResponse),
        (status = 502, description = "Stays.net rejected the call", body = ErrorResponse),
    )
)]
pub async fn handle_test_connection(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ConnectionTestResponse>, ApiError> {
    let request: ConnectionTestRequest = parse_body(&body)?;
    let settings = StaysNetSettings {
        api_key: request.api_key.trim().to_string(),
        api_secret: request.api_secret.filter(|s| !s.trim().is_empty()),
        base_url: request.base_url.trim().trim_end_matches('/').to_string(),
        enabled: true,
        auto_sync_enabled: None,
        last_sync: None,
    };
    if settings.api_key.is_empty() || settings.base_url.is_empty() {
        return Err(bad_request("invalid_body", "apiKey e baseUrl são obrigatórios"));
    }

    let data = state
        .service
        .test_connection(&settings)
        .await
        .map_err(error_response)?;

    Ok(Json(ConnectionTestResponse {
        message: "Conexão estabelecida com sucesso".to_string(),
        success: true,
        data,
    }))
}

/// POST /staysnet/webhook — Queue a Stays.net notification.
#[utoipa::path(
    post,
    path = "/staysnet/webhook",
    tag = "Stays.net",
    responses(
        (status = 200, description = "Notification queued", body = WebhookReceivedResponse),
        (status = 400, description = "No organization", body = ErrorResponse),
    )
)]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookReceivedResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;
    queue_webhook(&state, &organization_id, &body).await
}

/// POST /staysnet/webhook/{organization_id} — Queue a notification for the
/// organization named in the path, for senders that cannot set headers.
#[utoipa::path(
    post,
    path = "/staysnet/webhook/{organization_id}",
    tag = "Stays.net",
    params(("organization_id" = String, Path, description = "Organization receiving the notification")),
    responses((status = 200, description = "Notification queued", body = WebhookReceivedResponse))
)]
pub async fn handle_webhook_for_organization(
    State(state): State<AppState>,
    Path(organization_id): Path<String>,
    body: Bytes,
) -> Result<Json<WebhookReceivedResponse>, ApiError> {
    queue_webhook(&state, organization_id.trim(), &body).await
}

async fn queue_webhook(
    state: &AppState,
    organization_id: &str,
    body: &Bytes,
) -> Result<Json<WebhookReceivedResponse>, ApiError> {
    // Bodies that are not JSON are kept verbatim.
    let body = serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));

    let event = state
        .service
        .receive_webhook(organization_id, body)
        .await
        .map_err(error_response)?;

    Ok(Json(WebhookReceivedResponse {
        success: true,
        id: event.id,
        action: event.action,
        received: true,
    }))
}

/// POST /staysnet/webhooks/process — Apply queued notifications.
#[utoipa::path(
    post,
    path = "/staysnet/webhooks/process",
    tag = "Stays.net",
    params(WebhookProcessParams),
    responses(
        (status = 200, description = "Queue drained", body = WebhookProcessResponse),
        (status = 400, description = "Integration not configured", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
    )
)]
pub async fn handle_process_webhooks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WebhookProcessParams>,
) -> Result<Json<WebhookProcessResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let stats = state
        .service
        .process_webhooks(&organization_id, params.limit)
        .await
        .map_err(error_response)?;

    Ok(Json(WebhookProcessResponse {
        message: format!("{} webhook(s) processado(s)", stats.processed),
        success: stats.errors == 0,
        stats,
        timestamp: Utc::now(),
    }))
}

/// GET /settings/staysnet — Current integration settings.
#[utoipa::path(
    get,
    path = "/settings/staysnet",
    tag = "Settings",
    responses(
        (status = 200, description = "Stored settings, or disabled defaults", body = SettingsResponse),
    )
)]
pub async fn handle_get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let settings = state
        .service
        .settings(&organization_id)
        .await
        .map_err(error_response)?
        .unwrap_or_else(|| StaysNetSettings {
            api_key: String::new(),
            api_secret: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            enabled: false,
            auto_sync_enabled: None,
            last_sync: None,
        });

    Ok(Json(SettingsResponse {
        success: true,
        data: settings,
    }))
}

/// POST /settings/staysnet — Replace the integration settings.
#[utoipa::path(
    post,
    path = "/settings/staysnet",
    tag = "Settings",
    request_body = StaysNetSettings,
    responses(
        (status = 200, description = "Settings saved", body = SettingsResponse),
        (status = 400, description = "Enabled settings without apiKey or baseUrl", body = ErrorResponse),
    )
)]
pub async fn handle_save_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<StaysNetSettings>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let organization_id = state.organization(&headers)?;

    let saved = state
        .service
        .save_settings(&organization_id, settings)
        .await
        .map_err(error_response)?;
    info!(organization_id = %organization_id, "Stays.net settings updated via API");

    Ok(Json(SettingsResponse {
        success: true,
        data: saved,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_default_request() {
        let request: FullSyncRequest = parse_body(&Bytes::from_static(b"  \n")).unwrap();
        assert_eq!(request, FullSyncRequest::default());
    }

    #[test]
    fn test_body_fields_are_camel_case() {
        let body = Bytes::from_static(br#"{"propertyId": "L1", "startDate": "2025-03-01"}"#);
        let request: CalendarSyncRequest = parse_body(&body).unwrap();
        assert_eq!(request.property_id.as_deref(), Some("L1"));
        assert_eq!(request.start_date.map(|d| d.to_string()).as_deref(), Some("2025-03-01"));
        assert!(request.end_date.is_none());
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        let err = parse_body::<FullSyncRequest>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert_eq!(err.0, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.1.error, "invalid_body");
    }
}
