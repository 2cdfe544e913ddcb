//! Client API key check for the `/v1` routes.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tidegate_core::GatewayError;

use crate::errors::ApiError;
use crate::server::AppState;

/// Header carrying a raw API key as an alternative to a bearer token.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Key presented by the client, from `Authorization: Bearer` or `x-api-key`.
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
        });
    bearer
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()).map(str::trim))
        .filter(|k| !k.is_empty())
}

/// Check `headers` against the configured keys. No keys means open access.
pub fn authorize(headers: &HeaderMap, api_keys: &[String]) -> Result<(), GatewayError> {
    if api_keys.is_empty() {
        return Ok(());
    }
    match presented_key(headers) {
        None => Err(GatewayError::AuthenticationFailed("missing API key".into())),
        Some(key) if api_keys.iter().any(|k| k == key) => Ok(()),
        Some(_) => Err(GatewayError::AuthenticationFailed("invalid API key".into())),
    }
}

/// Middleware rejecting requests without a valid key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(request.headers(), &state.config.api_keys)?;
    Ok(next.run(request).await)
}
