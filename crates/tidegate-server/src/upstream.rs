//! Upstream completion backend.
//!
//! The gateway only needs a byte stream of the upstream's event lines.
//! Everything needed to obtain one (sessions, challenge solving, account
//! selection) sits behind [`CompletionBackend`].

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tidegate_core::GatewayError;
use tidegate_settings::UpstreamSettings;
use tracing::{debug, instrument};

/// Raw upstream response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// What the gateway asks the upstream for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    /// Client-facing model id, for logging.
    #[serde(skip)]
    pub model: String,
    /// Flattened conversation.
    pub prompt: String,
    /// Whether reasoning is requested.
    pub thinking_enabled: bool,
    /// Whether web search is requested.
    pub search_enabled: bool,
}

/// Failure to open or read the upstream response.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BackendError {
    /// Non-success HTTP status.
    #[error("upstream returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// Connection or read failure.
    #[error("upstream transport error: {0}")]
    Transport(String),
    /// The request timed out.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, body } => Self::UpstreamStatus { status, body },
            BackendError::Transport(msg) => Self::Network(msg),
            BackendError::Timeout(after) => Self::Timeout(after),
        }
    }
}

/// Source of upstream completion streams.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Start a completion and return its event-line body.
    async fn open(&self, request: CompletionRequest) -> Result<ByteStream, BackendError>;
}

/// Wire payload of the completion endpoint.
#[derive(Serialize)]
struct CompletionPayload<'a> {
    #[serde(flatten)]
    request: &'a CompletionRequest,
    parent_message_id: Option<&'a str>,
    ref_file_ids: [&'a str; 0],
}

/// Backend that POSTs to the configured completion endpoint.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    settings: UpstreamSettings,
}

impl HttpBackend {
    /// Build a backend from upstream settings.
    pub fn new(settings: UpstreamSettings) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn request(&self, request: &CompletionRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(&self.settings.completion_url);
        for (name, value) in &self.settings.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = self.settings.token.as_deref().filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }
        builder.json(&CompletionPayload {
            request,
            parent_message_id: None,
            ref_file_ids: [],
        })
    }
}

fn classify(err: &reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout)
    } else {
        BackendError::Transport(err.to_string())
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    #[instrument(skip_all, fields(model = %request.model, thinking = request.thinking_enabled, search = request.search_enabled))]
    async fn open(&self, request: CompletionRequest) -> Result<ByteStream, BackendError> {
        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let response = self
            .request(&request)
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        debug!(status = status.as_u16(), "upstream stream opened");

        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| classify(&e, timeout)));
        Ok(Box::pin(body))
    }
}
