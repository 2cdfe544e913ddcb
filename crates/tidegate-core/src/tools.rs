//! Tool invocations recovered from generated text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation parsed out of model output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedToolCall {
    /// Tool name, canonicalized to the declared spelling when known.
    pub name: String,
    /// Arguments, in the order the model wrote them.
    pub input: Map<String, Value>,
}

/// How tool names outside the declared set are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPolicy {
    /// Keep unknown names as fallback calls.
    #[default]
    Permissive,
    /// Drop unknown names; a payload left with no calls is rejected.
    Strict,
}

impl ToolPolicy {
    /// Parse a policy name (`permissive` or `strict`, case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "permissive" => Some(Self::Permissive),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// One event emitted by the tool-call sieve.
#[derive(Clone, Debug, PartialEq)]
pub enum SieveEvent {
    /// Plain content to forward to the client.
    Text(String),
    /// A confirmed, standalone batch of tool invocations.
    ToolCalls(Vec<ParsedToolCall>),
}

impl SieveEvent {
    /// The text payload, if this is a text event.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::ToolCalls(_) => None,
        }
    }
}

/// Merge adjacent [`SieveEvent::Text`] events.
///
/// Streaming emits text in arbitrarily sized pieces; two event sequences
/// carry the same content exactly when their coalesced forms are equal.
pub fn coalesce_text(events: impl IntoIterator<Item = SieveEvent>) -> Vec<SieveEvent> {
    let mut out: Vec<SieveEvent> = Vec::new();
    for event in events {
        if let SieveEvent::Text(next) = &event {
            if next.is_empty() {
                continue;
            }
            if let Some(SieveEvent::Text(prev)) = out.last_mut() {
                prev.push_str(next);
                continue;
            }
        }
        out.push(event);
    }
    out
}
