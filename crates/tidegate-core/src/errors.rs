//! Gateway error hierarchy.
//!
//! Errors are classified as fatal (the client must change something),
//! retryable (the upstream may succeed on another attempt), or operational
//! (timeouts and cancellation). The core never retries; callers use
//! [`GatewayError::is_retryable`] to decide.

use std::time::Duration;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by the gateway.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    // Fatal
    /// The client presented no key or an unknown key.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    /// The request body was malformed or inconsistent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The requested model is not configured.
    #[error("model not found: {0}")]
    UnknownModel(String),
    /// The upstream declared an error object inside the stream.
    #[error("upstream error: {0}")]
    Upstream(String),
    /// The upstream refused the content.
    #[error("content filtered by upstream")]
    ContentFiltered,

    // Retryable
    /// The upstream answered with a non-success status.
    #[error("upstream status {status}: {body}")]
    UpstreamStatus {
        /// HTTP status code.
        status: u16,
        /// Response body text, possibly empty.
        body: String,
    },
    /// Transport failure before or while reading the response.
    #[error("network error: {0}")]
    Network(String),
    /// The stream broke mid-response.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    // Operational
    /// No data arrived in time.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// The request was abandoned.
    #[error("cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether another attempt against the upstream could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Network(_) | Self::StreamInterrupted(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownModel(_) => "unknown_model",
            Self::Upstream(_) => "upstream",
            Self::ContentFiltered => "content_filtered",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::Network(_) => "network",
            Self::StreamInterrupted(_) => "stream_interrupted",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// HTTP status a client-facing adapter should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthenticationFailed(_) => 401,
            Self::InvalidRequest(_) | Self::UnknownModel(_) => 400,
            Self::UpstreamStatus { status, .. } if *status == 429 => 429,
            Self::ContentFiltered => 403,
            Self::Timeout(_) => 504,
            Self::Cancelled => 499,
            Self::Upstream(_)
            | Self::UpstreamStatus { .. }
            | Self::Network(_)
            | Self::StreamInterrupted(_) => 502,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
