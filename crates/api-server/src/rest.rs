//! Shared REST state, error translation and operational endpoints.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use rendizy_core::SyncError;
use rendizy_sync::StaysNetSyncService;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Header that selects the organization a request acts on.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StaysNetSyncService>,
    pub organization_id: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<StaysNetSyncService>, organization_id: String) -> Self {
        Self {
            service,
            organization_id,
            start_time: Instant::now(),
        }
    }

    /// Organization from the request header, falling back to the configured one.
    pub fn organization(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        resolve_organization(&self.organization_id, headers).ok_or_else(|| {
            bad_request(
                "missing_organization",
                "no organization configured and no x-organization-id header",
            )
        })
    }
}

fn resolve_organization(default: &str, headers: &HeaderMap) -> Option<String> {
    let organization_id = headers
        .get(ORGANIZATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default);
    (!organization_id.is_empty()).then(|| organization_id.to_string())
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub organization_id: String,
    pub uptime_secs: u64,
}

pub fn bad_request(error: &str, message: &str) -> ApiError {
    metrics::counter!("api.validation_errors").increment(1);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

/// Translate a service error into a status code and JSON body.
pub fn error_response(e: SyncError) -> ApiError {
    let (status, code) = match &e {
        SyncError::Config(_) => (StatusCode::BAD_REQUEST, "not_configured"),
        SyncError::AlreadyRunning(_) => (StatusCode::CONFLICT, "already_running"),
        SyncError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SyncError::Channel(_) => (StatusCode::BAD_GATEWAY, "channel_error"),
        SyncError::Mapping(_) | SyncError::MissingMapping(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "mapping_error")
        }
        SyncError::Storage(_) | SyncError::Serialization(_) | SyncError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };

    if status.is_server_error() {
        error!(error = %e, status = status.as_u16(), "request failed");
    } else {
        warn!(error = %e, status = status.as_u16(), "request rejected");
    }
    metrics::counter!("api.errors", "code" => code).increment(1);

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: code.to_string(),
            message: e.to_string(),
        }),
    )
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        organization_id: state.organization_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /live — Liveness probe for Kubernetes.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (SyncError::Config("x".into()), StatusCode::BAD_REQUEST),
            (SyncError::AlreadyRunning("org".into()), StatusCode::CONFLICT),
            (SyncError::NotFound("run".into()), StatusCode::NOT_FOUND),
            (SyncError::Channel("down".into()), StatusCode::BAD_GATEWAY),
            (SyncError::MissingMapping("c1".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (SyncError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let (status, Json(body)) = error_response(error);
            assert_eq!(status, expected);
            assert!(!body.success);
        }
    }

    #[test]
    fn test_organization_header_overrides_default() {
        let headers = {
            let mut headers = HeaderMap::new();
            headers.insert(ORGANIZATION_HEADER, HeaderValue::from_static(" org-b "));
            headers
        };
        let default_only = HeaderMap::new();

        assert_eq!(resolve_organization("org-a", &headers), Some("org-b".to_string()));
        assert_eq!(resolve_organization("org-a", &default_only), Some("org-a".to_string()));
        assert_eq!(resolve_organization("", &default_only), None);
    }
}
