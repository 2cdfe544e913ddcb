//! OpenAI wire shape for parsed tool calls.

use serde::Serialize;
use tidegate_core::ParsedToolCall;
use uuid::Uuid;

/// One entry of an OpenAI `tool_calls` array.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OpenAiToolCall {
    /// Position in the batch. Present only in streaming deltas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Generated call id (`call_<hex>`).
    pub id: String,
    /// Always `function`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Function name and serialized arguments.
    pub function: OpenAiFunction,
}

/// Function part of a tool call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OpenAiFunction {
    /// Tool name.
    pub name: String,
    /// Arguments as a JSON-encoded string.
    pub arguments: String,
}

/// Fresh tool-call id.
pub fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Render parsed calls for the OpenAI API. `streaming` adds the `index`
/// field that chunk deltas carry.
pub fn to_openai_tool_calls(calls: &[ParsedToolCall], streaming: bool) -> Vec<OpenAiToolCall> {
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| OpenAiToolCall {
            index: streaming.then_some(i),
            id: new_call_id(),
            kind: "function",
            function: OpenAiFunction {
                name: call.name.clone(),
                arguments: serde_json::Value::Object(call.input.clone()).to_string(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn call(name: &str, input: serde_json::Value) -> ParsedToolCall {
        ParsedToolCall {
            name: name.into(),
            input: input.as_object().cloned().unwrap_or_else(Map::new),
        }
    }

    #[test]
    fn call_ids_are_unique_and_prefixed() {
        let a = new_call_id();
        let b = new_call_id();
        assert!(a.starts_with("call_"));
        assert_eq!(a.len(), "call_".len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn non_streaming_shape() {
        let out = to_openai_tool_calls(&[call("search", json!({"q": "golang"}))], false);
        let mut value = serde_json::to_value(&out).unwrap();
        value[0]["id"] = json!("call_x");
        assert_eq!(
            value,
            json!([{
                "id": "call_x",
                "type": "function",
                "function": {"name": "search", "arguments": "{\"q\":\"golang\"}"}
            }])
        );
    }

    #[test]
    fn streaming_shape_carries_index() {
        let out = to_openai_tool_calls(&[call("a", json!({})), call("b", json!({"x": 1}))], true);
        assert_eq!(out[0].index, Some(0));
        assert_eq!(out[1].index, Some(1));
        assert_eq!(out[1].function.arguments, r#"{"x":1}"#);
        assert_eq!(out[0].function.arguments, "{}");
    }
}
