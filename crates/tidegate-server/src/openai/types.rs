//! OpenAI chat request types.
//!
//! Only the fields the gateway acts on are modelled; anything else in the
//! request body is ignored.

use serde::Deserialize;
use serde_json::Value;
use tidegate_tools::ToolSpec;

/// `POST /v1/chat/completions` body.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatCompletionRequest {
    /// Client-facing model id.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Whether to answer with server-sent events.
    #[serde(default)]
    pub stream: bool,
    /// Declared tools.
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
}

impl ChatCompletionRequest {
    /// Declared tools as plain specs.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.function.clone()).collect()
    }
}

/// One conversation message.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant`, `tool`, ...
    pub role: String,
    /// A string, an array of content parts, or null.
    #[serde(default)]
    pub content: Value,
    /// Calls made by an earlier assistant turn.
    #[serde(default)]
    pub tool_calls: Vec<PriorToolCall>,
    /// Call answered by a `tool` message.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Text content. Array parts of type `text` are concatenated.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(part) => part.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// A tool call echoed back in conversation history.
#[derive(Clone, Debug, Deserialize)]
pub struct PriorToolCall {
    /// Call id.
    #[serde(default)]
    pub id: Option<String>,
    /// Called function.
    pub function: PriorFunction,
}

/// Function half of a [`PriorToolCall`].
#[derive(Clone, Debug, Deserialize)]
pub struct PriorFunction {
    /// Tool name.
    pub name: String,
    /// JSON-encoded arguments.
    #[serde(default)]
    pub arguments: String,
}

/// Entry of the request `tools` array.
#[derive(Clone, Debug, Deserialize)]
pub struct ToolDeclaration {
    /// Always `function` in practice.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// The function being declared.
    pub function: ToolSpec,
}
