//! OpenAI response bodies: stream chunks, aggregated completions, usage.

use chrono::Utc;
use serde_json::{Value, json};
use tidegate_core::text::estimate_tokens;
use tidegate_tools::OpenAiToolCall;
use uuid::Uuid;

/// Identity shared by every frame of one response.
#[derive(Clone, Debug)]
pub struct ResponseMeta {
    /// `chatcmpl-<hex>`.
    pub id: String,
    /// Unix seconds.
    pub created: i64,
    /// Model id echoed to the client.
    pub model: String,
}

impl ResponseMeta {
    /// Fresh identity for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4().simple()),
            created: Utc::now().timestamp(),
            model: model.into(),
        }
    }
}

/// Why the model stopped, as reported to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of output.
    Stop,
    /// Tool calls were returned.
    ToolCalls,
    /// The upstream filtered the content.
    ContentFilter,
}

impl FinishReason {
    /// Tool calls win over a content filter, which wins over a plain stop.
    pub fn decide(emitted_tool_calls: bool, filtered: bool) -> Self {
        if emitted_tool_calls {
            Self::ToolCalls
        } else if filtered {
            Self::ContentFilter
        } else {
            Self::Stop
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
        }
    }
}

/// Estimated token usage.
pub fn usage(prompt: &str, reasoning: &str, text: &str) -> Value {
    let prompt_tokens = estimate_tokens(prompt);
    let reasoning_tokens = estimate_tokens(reasoning);
    let completion_tokens = reasoning_tokens + estimate_tokens(text);
    json!({
        "prompt_tokens": prompt_tokens,
        "completion_tokens": completion_tokens,
        "total_tokens": prompt_tokens + completion_tokens,
        "completion_tokens_details": {"reasoning_tokens": reasoning_tokens},
    })
}

/// One `chat.completion.chunk` frame.
pub fn chunk(meta: &ResponseMeta, delta: Value, finish_reason: Option<FinishReason>) -> Value {
    json!({
        "id": meta.id,
        "object": "chat.completion.chunk",
        "created": meta.created,
        "model": meta.model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason.map(FinishReason::as_str),
        }],
    })
}

/// Aggregated assistant output.
#[derive(Debug, Default)]
pub struct CompletionOutput {
    /// Visible content.
    pub content: String,
    /// Reasoning content.
    pub reasoning: String,
    /// Tool calls, non-streaming shape.
    pub tool_calls: Vec<OpenAiToolCall>,
}

/// A `chat.completion` object.
pub fn completion(meta: &ResponseMeta, output: &CompletionOutput, finish_reason: FinishReason, usage: Value) -> Value {
    let content = if output.content.is_empty() && !output.tool_calls.is_empty() {
        Value::Null
    } else {
        Value::String(output.content.clone())
    };
    let mut message = json!({"role": "assistant", "content": content});
    if !output.reasoning.is_empty() {
        message["reasoning_content"] = json!(output.reasoning);
    }
    if !output.tool_calls.is_empty() {
        message["tool_calls"] = json!(output.tool_calls);
    }
    json!({
        "id": meta.id,
        "object": "chat.completion",
        "created": meta.created,
        "model": meta.model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason.as_str(),
        }],
        "usage": usage,
    })
}
