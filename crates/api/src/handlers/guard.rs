//! Data plane: `/guard`, `/analyze`, `/mask`, `/detect`.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde_json::{json, Value};

use gateway_guard::types::{GuardRequest, Message};

use crate::state::AppState;

pub fn guard_routes() -> Router<AppState> {
    Router::new()
        .route("/guard", post(guard))
        .route("/analyze", post(analyze))
        .route("/mask", post(mask))
        .route("/detect", post(detect))
}

async fn guard(State(state): State<AppState>, Json(request): Json<GuardRequest>) -> (StatusCode, Json<Value>) {
    let response = state.pipeline.guard(request).await;

    let status = if response.allowed { StatusCode::OK } else { StatusCode::FORBIDDEN };

    let body = json!({
        "request_id": response.request_id,
        "allowed": response.allowed,
        "processed_input": {
            "masked_messages": response.masked_messages,
            "pii_masked": response.pii_masked,
        },
        "blocked_by": response.blocked_by,
        "block_reason": response.block_reason,
        "warnings": response.warnings,
        "throttled": response.throttled,
        "evaluations": response.evaluations,
        "llm_response": response.llm_content.map(|content| json!({
            "content": content,
            "model": response.llm_model,
            "finish_reason": response.llm_finish_reason,
            "usage": response.llm_usage,
        })),
        "security_report": response.security_report,
        "pii_report": response.pii_report,
        "processing_time_ms": response.processing_time_ms,
        "error": response.error,
    });

    (status, Json(body))
}

#[derive(serde::Deserialize)]
struct MessagesBody {
    messages: Vec<Message>,
}

async fn analyze(State(state): State<AppState>, Json(body): Json<MessagesBody>) -> Json<Value> {
    let (security_report, pii_report) = state.pipeline.analyze(&body.messages);
    Json(json!({ "security_report": security_report, "pii_report": pii_report }))
}

async fn mask(State(state): State<AppState>, Json(body): Json<MessagesBody>) -> Json<Value> {
    let (masked, pii_report) = state.pipeline.mask(&body.messages);
    Json(json!({ "masked_messages": masked, "pii_report": pii_report }))
}

async fn detect(State(state): State<AppState>, Json(body): Json<MessagesBody>) -> Json<Value> {
    let security_report = state.pipeline.detect(&body.messages);
    Json(json!({ "security_report": security_report }))
}
