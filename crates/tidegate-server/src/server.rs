//! `GatewayServer`: Axum HTTP server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::openai;
use crate::shutdown::ShutdownCoordinator;
use crate::upstream::CompletionBackend;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Upstream completion source.
    pub backend: Arc<dyn CompletionBackend>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Streaming responses in flight.
    pub active_streams: Arc<AtomicUsize>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Counts one in-flight stream for as long as it lives.
pub(crate) struct ActiveStream(Arc<AtomicUsize>);

impl ActiveStream {
    pub(crate) fn enter(counter: &Arc<AtomicUsize>) -> Self {
        let _ = counter.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The gateway server.
pub struct GatewayServer {
    config: Arc<ServerConfig>,
    backend: Arc<dyn CompletionBackend>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    active_streams: Arc<AtomicUsize>,
    metrics: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            active_streams: Arc::new(AtomicUsize::new(0)),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            backend: self.backend.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            active_streams: self.active_streams.clone(),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/v1/models", get(openai::list_models))
            .route("/v1/chat/completions", post(openai::chat_completions))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key))
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve on `listener` until shutdown is initiated, then stop accepting
    /// and wait for open connections.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(self.shutdown.token().cancelled_owned())
            .await
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Streaming responses in flight.
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::Relaxed)
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.active_streams.load(Ordering::Relaxed),
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /healthz
async fn liveness_handler() -> &'static str {
    "ok"
}

/// GET /readyz. Not ready once shutdown has begun.
async fn readiness_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.shutdown.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::OK, "ready")
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, metrics::render(handle)),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}
