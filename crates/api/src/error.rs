use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::Error;
use serde_json::json;
use std::env;
use tracing::{error, warn};

/// API error wrapper that provides secure error handling and response sanitization.
///
/// Ensures that sensitive information is never exposed in API responses,
/// while still providing useful debugging information in logs and
/// development environments.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    request_id: Option<String>,
    environment: String,
}

impl ApiError {
    pub fn new(error: Error) -> Self {
        let environment = env::var("GOGUARD_MODE").unwrap_or_else(|_| "development".to_string());
        Self { error, request_id: None, environment }
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self.error.code,
            gateway_core::ErrorCode::InjectionBlocked
                | gateway_core::ErrorCode::PolicyDenied
                | gateway_core::ErrorCode::SecurityPolicyViolation
                | gateway_core::ErrorCode::RateLimitExceeded
                | gateway_core::ErrorCode::TooManyRequests
        )
    }

    fn log_error(&self) {
        let status_code = StatusCode::from_u16(self.error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match status_code.as_u16() {
            500..=599 => {
                error!(
                    error_code = %self.error.code,
                    error_id = %self.error.context.error_id,
                    request_id = ?self.request_id,
                    severity = ?self.error.severity,
                    "internal server error: {}",
                    self.error
                );

                if self.environment == "production" {
                    error!(target: "security_audit",
                        error_details = %serde_json::to_string(&self.error.to_debug_json()).unwrap_or_default(),
                        "production server error - full details"
                    );
                }
            }
            400..=499 => {
                if self.is_security_relevant() {
                    warn!(target: "security_audit",
                        error_code = %self.error.code,
                        error_id = %self.error.context.error_id,
                        request_id = ?self.request_id,
                        "security-relevant client error: {}",
                        self.error
                    );
                } else {
                    tracing::debug!(error_code = %self.error.code, request_id = ?self.request_id, "client error: {}", self.error);
                }
            }
            _ => {
                tracing::info!(error_code = %self.error.code, request_id = ?self.request_id, "informational response: {}", self.error);
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::new(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = StatusCode::from_u16(self.error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.log_error();

        let mut response_json = self.error.to_api_response_with_environment(&self.environment);
        if let Some(request_id) = &self.request_id {
            if let Some(error_obj) = response_json.get_mut("error") {
                error_obj["request_id"] = json!(request_id);
            }
        }

        if self.environment == "production" && status_code.is_server_error() {
            response_json = json!({
                "error": {
                    "code": self.error.code,
                    "message": "An internal error occurred. Please try again later.",
                    "error_id": self.error.context.error_id,
                    "request_id": self.request_id,
                    "timestamp": self.error.context.timestamp
                }
            });
        }

        (status_code, Json(response_json)).into_response()
    }
}
