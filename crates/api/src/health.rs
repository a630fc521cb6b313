//! Health check endpoints.
//!
//! `/health` is a liveness probe that always returns 200 if the process is
//! up. `/ready` checks the audit ring's `health_check()` and the backing
//! repositories and returns 503 if anything reports unhealthy.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy")),
    tag = "health"
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "gateway-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    ),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let audit_health = state.audit.health_check().await;
    let is_ready = audit_health.healthy;

    let status = if is_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(json!({
            "ready": is_ready,
            "checks": {
                "audit_ring": {
                    "healthy": audit_health.healthy,
                    "message": audit_health.message,
                    "entry_count": audit_health.entry_count,
                    "capacity": audit_health.capacity,
                }
            }
        })),
    )
}
