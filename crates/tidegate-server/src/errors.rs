//! API errors rendered in the OpenAI error shape.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tidegate_core::GatewayError;
use tracing::warn;

use crate::upstream::BackendError;

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub GatewayError);

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::BAD_GATEWAY)
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        Self(err.into())
    }
}

/// OpenAI error `type` for an HTTP status.
pub fn error_type(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 => "authentication_error",
        403 => "permission_error",
        429 => "rate_limit_error",
        503 => "service_unavailable_error",
        500..=599 => "api_error",
        _ => "invalid_request_error",
    }
}

/// OpenAI error body.
pub fn error_body(status: StatusCode, message: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "type": error_type(status),
        }
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(kind = self.0.error_kind(), error = %self.0, "request failed");
        }
        (status, Json(error_body(status, &self.0.to_string()))).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
