//! OpenAI-compatible endpoints.

pub mod chunk;
pub mod complete;
pub mod plan;
pub mod prompt;
pub mod stream;
pub mod types;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use metrics::counter;
use serde_json::{Value, json};
use tidegate_core::GatewayError;
use tracing::{info, instrument};

use crate::errors::ApiError;
use crate::metrics::{COMPLETIONS_TOTAL, UPSTREAM_ERRORS_TOTAL};
use crate::server::AppState;
use plan::RequestPlan;
use types::ChatCompletionRequest;

/// GET /v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let data: Vec<Value> = state
        .config
        .models
        .iter()
        .map(|m| json!({"id": m.id, "object": "model", "created": 0, "owned_by": "deepseek"}))
        .collect();
    Json(json!({"object": "list", "data": data}))
}

/// POST /v1/chat/completions
#[instrument(skip_all)]
pub async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid JSON body: {e}")))?;
    let plan = RequestPlan::build(&state.config, &request)?;
    info!(
        model = %plan.model,
        stream = plan.stream,
        tools = plan.extractor.as_ref().map_or(0, |e| e.known_names().len()),
        "chat completion requested"
    );

    let upstream = match state.backend.open(plan.completion_request()).await {
        Ok(upstream) => upstream,
        Err(err) => {
            let err = GatewayError::from(err);
            counter!(UPSTREAM_ERRORS_TOTAL, "kind" => err.error_kind()).increment(1);
            return Err(err.into());
        }
    };
    counter!(
        COMPLETIONS_TOTAL,
        "model" => plan.model.clone(),
        "stream" => if plan.stream { "true" } else { "false" }
    )
    .increment(1);

    if plan.stream {
        Ok(stream::respond(state, plan, upstream))
    } else {
        Ok(complete::respond(&state, &plan, upstream).await?.into_response())
    }
}
