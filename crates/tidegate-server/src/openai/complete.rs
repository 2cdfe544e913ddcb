//! Aggregated responses (`stream: false`).

use axum::Json;
use metrics::counter;
use serde_json::Value;
use tidegate_core::{GatewayError, SieveEvent};
use tidegate_stream::{LinePump, PumpError, StopReason, collect_lines, start_line_pump};
use tidegate_tools::{sieve_complete_text, to_openai_tool_calls};
use tracing::debug;

use super::chunk::{CompletionOutput, FinishReason, ResponseMeta, completion, usage};
use super::plan::RequestPlan;
use crate::errors::ApiError;
use crate::metrics::{TOOL_CALLS_TOTAL, UPSTREAM_ERRORS_TOTAL};
use crate::server::AppState;
use crate::upstream::ByteStream;

/// Collect the whole upstream response and answer with one
/// `chat.completion` object.
pub(crate) async fn respond(state: &AppState, plan: &RequestPlan, body: ByteStream) -> Result<Json<Value>, ApiError> {
    let cancel = state.shutdown.child_token();
    let _cancel_on_exit = cancel.clone().drop_guard();
    let LinePump { mut lines, done } = start_line_pump(body, state.config.pump_options(plan.thinking_enabled), cancel);

    let collected = collect_lines(&mut lines, plan.search_enabled).await;
    drop(lines);

    let filtered = match collected.stop {
        StopReason::Finished => false,
        StopReason::Filtered => true,
        StopReason::UpstreamError(message) => {
            counter!(UPSTREAM_ERRORS_TOTAL, "kind" => "upstream").increment(1);
            return Err(GatewayError::Upstream(message).into());
        }
        StopReason::Eof => match done.await {
            Ok(Err(PumpError::Cancelled)) => return Err(GatewayError::Cancelled.into()),
            Ok(Err(err)) => {
                counter!(UPSTREAM_ERRORS_TOTAL, "kind" => "stream").increment(1);
                return Err(GatewayError::StreamInterrupted(err.to_string()).into());
            }
            _ => false,
        },
    };

    let mut output = CompletionOutput {
        reasoning: collected.reasoning,
        ..CompletionOutput::default()
    };
    match plan.extractor.clone() {
        Some(extractor) => {
            let mut calls = Vec::new();
            for event in sieve_complete_text(extractor, state.config.recent_text_window, &collected.text) {
                match event {
                    SieveEvent::Text(text) => output.content.push_str(&text),
                    SieveEvent::ToolCalls(batch) => calls.extend(batch),
                }
            }
            output.tool_calls = to_openai_tool_calls(&calls, false);
            counter!(TOOL_CALLS_TOTAL).increment(calls.len() as u64);
        }
        None => output.content.clone_from(&collected.text),
    }

    let meta = ResponseMeta::new(plan.model.clone());
    let reason = FinishReason::decide(!output.tool_calls.is_empty(), filtered);
    debug!(id = %meta.id, finish_reason = reason.as_str(), "completion collected");
    let usage = usage(&plan.prompt, &output.reasoning, &collected.text);
    Ok(Json(completion(&meta, &output, reason, usage)))
}
