//! Control plane: policies, spending limits, users, audit, dashboard,
//! alerts, and settings CRUD/query endpoints under `/api/v1/control`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use gateway_guard::types::{AuditEventType, AuditQuery, AuditStatus, Policy, SpendingLimit, User};

use crate::state::AppState;

pub fn control_routes() -> Router<AppState> {
    Router::new()
        .route("/policies", get(list_policies).post(create_policy))
        .route("/policies/:id", get(get_policy).put(update_policy).delete(delete_policy))
        .route("/spending-limits", get(list_spending_limits).post(create_spending_limit))
        .route("/spending-limits/:id", get(get_spending_limit).put(update_spending_limit))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/audit/logs", get(list_audit_logs))
        .route("/audit/stats", get(audit_stats))
        .route("/dashboard", get(dashboard))
        .route("/alerts", get(list_alerts))
        .route("/alerts/:id/ack", post(ack_alert))
        .route("/settings", get(get_all_settings))
        .route("/settings/llm", get(get_llm_settings).put(put_llm_settings))
        .route("/settings/security", get(get_security_settings).put(put_security_settings))
        .route("/settings/storage", get(get_storage_settings))
}

fn ok(value: impl serde::Serialize) -> Json<Value> {
    Json(json!({ "success": true, "data": value }))
}

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "success": false, "error": format!("{what} not found") })))
}

// --- Policies ----------------------------------------------------------

async fn list_policies(State(state): State<AppState>) -> Json<Value> {
    ok(state.policies.list().await)
}

async fn create_policy(State(state): State<AppState>, Json(mut policy): Json<Policy>) -> Json<Value> {
    if policy.id.is_empty() {
        policy.id = Uuid::new_v4().to_string();
    }
    ok(state.policies.create(policy).await)
}

async fn get_policy(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.policies.get(&id).await {
        Some(policy) => (StatusCode::OK, ok(policy)),
        None => not_found("policy"),
    }
}

async fn update_policy(State(state): State<AppState>, Path(id): Path<String>, Json(mut policy): Json<Policy>) -> (StatusCode, Json<Value>) {
    policy.id = id;
    match state.policies.update(policy).await {
        Some(updated) => (StatusCode::OK, ok(updated)),
        None => not_found("policy"),
    }
}

async fn delete_policy(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if state.policies.delete(&id).await {
        (StatusCode::OK, ok(json!({ "deleted": true })))
    } else {
        not_found("policy")
    }
}

// --- Spending limits (no delete per spec) -------------------------------

async fn list_spending_limits(State(state): State<AppState>) -> Json<Value> {
    ok(state.spending_limits.list().await)
}

async fn create_spending_limit(State(state): State<AppState>, Json(mut limit): Json<SpendingLimit>) -> Json<Value> {
    if limit.id.is_empty() {
        limit.id = Uuid::new_v4().to_string();
    }
    ok(state.spending_limits.create(limit).await)
}

async fn get_spending_limit(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.spending_limits.get(&id).await {
        Some(limit) => (StatusCode::OK, ok(limit)),
        None => not_found("spending limit"),
    }
}

async fn update_spending_limit(State(state): State<AppState>, Path(id): Path<String>, Json(mut limit): Json<SpendingLimit>) -> (StatusCode, Json<Value>) {
    limit.id = id;
    match state.spending_limits.update(limit).await {
        Some(updated) => (StatusCode::OK, ok(updated)),
        None => not_found("spending limit"),
    }
}

// --- Users ---------------------------------------------------------------

async fn list_users(State(state): State<AppState>) -> Json<Value> {
    ok(state.users.list().await)
}

async fn create_user(State(state): State<AppState>, Json(mut user): Json<User>) -> Json<Value> {
    if user.id.is_empty() {
        user.id = Uuid::new_v4().to_string();
    }
    ok(state.users.create(user).await)
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.users.get(&id).await {
        Some(user) => (StatusCode::OK, ok(user)),
        None => not_found("user"),
    }
}

async fn update_user(State(state): State<AppState>, Path(id): Path<String>, Json(mut user): Json<User>) -> (StatusCode, Json<Value>) {
    user.id = id;
    match state.users.update(user).await {
        Some(updated) => (StatusCode::OK, ok(updated)),
        None => not_found("user"),
    }
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if state.users.delete(&id).await {
        (StatusCode::OK, ok(json!({ "deleted": true })))
    } else {
        not_found("user")
    }
}

// --- Audit -----------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct AuditLogParams {
    limit: Option<usize>,
    offset: Option<usize>,
    user_id: Option<String>,
    resource_type: Option<String>,
    status: Option<AuditStatus>,
    start_time: Option<chrono::DateTime<chrono::Utc>>,
    end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    event_types: Vec<AuditEventType>,
}

async fn list_audit_logs(State(state): State<AppState>, Query(params): Query<AuditLogParams>) -> Json<Value> {
    let query = AuditQuery {
        start_time: params.start_time,
        end_time: params.end_time,
        event_types: params.event_types,
        user_id: params.user_id,
        resource_type: params.resource_type,
        status: params.status,
        limit: params.limit.unwrap_or(50),
        offset: params.offset.unwrap_or(0),
        sort_by: None,
        sort_order: None,
    };
    let (page, total) = state.audit.query(&query).await;
    ok(json!({ "logs": page, "total": total }))
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    #[serde(default = "default_period")]
    period: String,
}

fn default_period() -> String {
    "24h".to_string()
}

async fn audit_stats(State(state): State<AppState>, Query(params): Query<StatsParams>) -> (StatusCode, Json<Value>) {
    let period = match params.period.as_str() {
        "24h" => Duration::hours(24),
        "7d" => Duration::days(7),
        "30d" => Duration::days(30),
        _ => return (StatusCode::BAD_REQUEST, Json(json!({ "success": false, "error": "period must be one of 24h, 7d, 30d" }))),
    };
    let stats = state.audit.stats(period).await;
    (
        StatusCode::OK,
        ok(json!({
            "total_events": stats.total_events,
            "by_user": stats.by_user,
            "by_model": stats.by_model,
            "by_hour": stats.by_hour,
            "by_event_type": stats.by_event_type,
        })),
    )
}

async fn dashboard(State(state): State<AppState>) -> Json<Value> {
    let metrics = state.audit.dashboard().await;
    ok(json!({
        "current": window_json(&metrics.current),
        "previous": window_json(&metrics.previous),
        "requests_change_pct": metrics.requests_change_pct,
        "spend_change_pct": metrics.spend_change_pct,
    }))
}

fn window_json(window: &gateway_guard::audit::WindowMetrics) -> Value {
    json!({
        "total_requests": window.total_requests,
        "unique_users": window.unique_users,
        "blocked_count": window.blocked_count,
        "total_spend": window.total_spend,
        "injection_attempts": window.injection_attempts,
        "pii_detections": window.pii_detections,
        "requests_by_model": window.requests_by_model,
        "requests_by_provider": window.requests_by_provider,
        "spend_by_user": window.spend_by_user,
        "spend_by_model": window.spend_by_model,
    })
}

// --- Alerts ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AlertParams {
    #[serde(default = "default_alert_limit")]
    limit: usize,
    #[serde(default)]
    include_acked: bool,
}

fn default_alert_limit() -> usize {
    50
}

async fn list_alerts(State(state): State<AppState>, Query(params): Query<AlertParams>) -> Json<Value> {
    ok(state.audit.list_alerts(params.limit, params.include_acked).await)
}

#[derive(Debug, Deserialize)]
struct AckBody {
    user_id: String,
}

async fn ack_alert(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<AckBody>) -> Json<Value> {
    state.audit.ack_alert(&id, &body.user_id).await;
    ok(json!({ "acked": true }))
}

// --- Settings ----------------------------------------------------------

async fn get_all_settings(State(state): State<AppState>) -> Json<Value> {
    ok(state.settings.get_all().await)
}

async fn get_llm_settings(State(state): State<AppState>) -> Json<Value> {
    let (provider, model, api_key, base_url) = state.settings.get_llm_config().await;
    ok(json!({
        "provider": provider,
        "model": model,
        "api_key_set": api_key.is_some(),
        "base_url": base_url,
    }))
}

async fn put_llm_settings(State(state): State<AppState>, Json(settings): Json<gateway_guard::settings::LlmSettings>) -> Json<Value> {
    state.settings.update_llm_settings(settings).await;
    ok(json!({ "updated": true }))
}

async fn get_security_settings(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.get_security_settings().await;
    ok(json!({
        "block_threshold": settings.block_threshold,
        "pii_masking_enabled": settings.pii_masking_enabled,
    }))
}

async fn put_security_settings(State(state): State<AppState>, Json(settings): Json<gateway_guard::settings::SecuritySettings>) -> Json<Value> {
    state.settings.update_security_settings(settings).await;
    ok(json!({ "updated": true }))
}

async fn get_storage_settings(State(state): State<AppState>) -> Json<Value> {
    ok(json!({
        "backend": if state.config.storage.is_postgres() { "postgres" } else { "memory" },
        "host": state.config.storage.host,
    }))
}
