//! Tool-call extraction from one captured JSON object.
//!
//! Models phrase invocations loosely. Two call shapes are accepted:
//!
//! - `{"name": .., "input": {..}}`
//! - `{"function": {"name": .., "arguments": "<json>"}}`
//!
//! wrapped in `{"tool_calls": [..]}`, given as a bare array, or given as a
//! single call object. Arguments that fail to decode never fail the call;
//! they are kept under `_raw`.

use serde_json::{Map, Value};
use tidegate_core::{ParsedToolCall, ToolPolicy};
use tracing::{debug, warn};

use crate::scan::TOOL_CALLS_KEY;

/// Keys searched, in order, for call arguments beside `input`.
const ARGUMENT_KEYS: [&str; 4] = ["arguments", "args", "parameters", "params"];

/// Key wrapping arguments that are not a JSON object.
pub const RAW_ARGUMENTS_KEY: &str = "_raw";

/// Outcome of extracting one payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Extracted {
    /// At least one call survived the name policy.
    Calls(Vec<ParsedToolCall>),
    /// Tool-call syntax was present but the policy dropped every call.
    Rejected {
        /// Names the policy refused.
        names: Vec<String>,
    },
    /// Not a tool-call payload.
    NoToolSyntax,
}

/// Parses captured payloads against the declared tool names.
#[derive(Clone, Debug, Default)]
pub struct ToolCallExtractor {
    known: Vec<String>,
    policy: ToolPolicy,
}

impl ToolCallExtractor {
    /// Create an extractor for the declared tool names.
    pub fn new<I, S>(known: I, policy: ToolPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: known.into_iter().map(Into::into).collect(),
            policy,
        }
    }

    /// Declared tool names.
    pub fn known_names(&self) -> &[String] {
        &self.known
    }

    /// Extract calls from raw JSON text. Undecodable text has no tool syntax.
    pub fn extract(&self, text: &str) -> Extracted {
        match serde_json::from_str::<Value>(text) {
            Ok(payload) => self.extract_value(&payload),
            Err(err) => {
                debug!(error = %err, len = text.len(), "captured payload is not JSON");
                Extracted::NoToolSyntax
            }
        }
    }

    /// Extract calls from a decoded payload.
    pub fn extract_value(&self, payload: &Value) -> Extracted {
        let items: Vec<&Value> = match payload {
            Value::Object(map) => match map.get(TOOL_CALLS_KEY) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(single @ Value::Object(_)) => vec![single],
                Some(_) => Vec::new(),
                None => vec![payload],
            },
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };

        let mut calls = Vec::new();
        let mut rejected = Vec::new();
        for call in items.into_iter().filter_map(parse_call) {
            match self.resolve_name(&call.name) {
                Some(name) => calls.push(ParsedToolCall { name, ..call }),
                None => rejected.push(call.name),
            }
        }

        if !rejected.is_empty() {
            debug!(rejected = ?rejected, kept = calls.len(), "tool names rejected by policy");
        }
        if !calls.is_empty() {
            Extracted::Calls(calls)
        } else if !rejected.is_empty() {
            Extracted::Rejected { names: rejected }
        } else {
            Extracted::NoToolSyntax
        }
    }

    /// Canonical spelling for `name`, or `None` when the policy drops it.
    fn resolve_name(&self, name: &str) -> Option<String> {
        if let Some(exact) = self.known.iter().find(|k| *k == name) {
            return Some(exact.clone());
        }
        if let Some(folded) = self.known.iter().find(|k| k.eq_ignore_ascii_case(name)) {
            return Some(folded.clone());
        }
        match self.policy {
            ToolPolicy::Permissive => Some(name.to_string()),
            ToolPolicy::Strict => None,
        }
    }
}

/// Read one call object. Items without a non-empty name are skipped.
fn parse_call(item: &Value) -> Option<ParsedToolCall> {
    let map = item.as_object()?;
    let function = map.get("function").and_then(Value::as_object);

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| function.and_then(|f| f.get("name")).and_then(Value::as_str))
        .map(str::trim)
        .filter(|n| !n.is_empty())?;

    let raw_input = map
        .get("input")
        .or_else(|| function.and_then(|f| f.get("arguments")))
        .or_else(|| ARGUMENT_KEYS.iter().find_map(|k| map.get(*k)));

    Some(ParsedToolCall {
        name: name.to_string(),
        input: raw_input.map(|v| normalize_input(name, v)).unwrap_or_default(),
    })
}

/// Coerce an argument value into an object, failing open.
fn normalize_input(tool_name: &str, value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        Value::String(s) if s.trim().is_empty() => Map::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            Ok(_) => raw(Value::String(s.clone())),
            Err(err) => {
                let preview: String = s.chars().take(200).collect();
                warn!(
                    tool_name,
                    error = %err,
                    args_preview = %preview,
                    "failed to parse tool call arguments, keeping raw text"
                );
                raw(Value::String(s.clone()))
            }
        },
        other => raw(other.clone()),
    }
}

fn raw(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    let _ = map.insert(RAW_ARGUMENTS_KEY.into(), value);
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn permissive(names: &[&str]) -> ToolCallExtractor {
        ToolCallExtractor::new(names.iter().copied(), ToolPolicy::Permissive)
    }

    fn strict(names: &[&str]) -> ToolCallExtractor {
        ToolCallExtractor::new(names.iter().copied(), ToolPolicy::Strict)
    }

    fn calls(extracted: Extracted) -> Vec<ParsedToolCall> {
        match extracted {
            Extracted::Calls(calls) => calls,
            other => panic!("expected calls, got {other:?}"),
        }
    }

    // ── payload shapes ──────────────────────────────────────────────

    #[test]
    fn wrapped_name_input_shape() {
        let out = calls(permissive(&["search"]).extract(
            r#"{"tool_calls":[{"name":"search","input":{"q":"golang"}}]}"#,
        ));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "search");
        assert_eq!(Value::Object(out[0].input.clone()), json!({"q": "golang"}));
    }

    #[test]
    fn function_arguments_shape() {
        let out = calls(permissive(&["get_weather"]).extract(
            r#"{"tool_calls":[{"function":{"name":"get_weather","arguments":"{\"city\":\"Paris\"}"}}]}"#,
        ));
        assert_eq!(out[0].name, "get_weather");
        assert_eq!(out[0].input["city"], "Paris");
    }

    #[test]
    fn bare_array_and_single_object() {
        let ex = permissive(&["a", "b"]);
        let out = calls(ex.extract(r#"[{"name":"a"},{"name":"b","args":{"x":1}}]"#));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].input["x"], 1);

        let out = calls(ex.extract(r#"{"name":"a","parameters":{"y":2}}"#));
        assert_eq!(out[0].input["y"], 2);
    }

    #[test]
    fn input_takes_precedence_over_arguments() {
        let out = calls(permissive(&["a"]).extract(
            r#"{"name":"a","input":{"from":"input"},"arguments":{"from":"arguments"}}"#,
        ));
        assert_eq!(out[0].input["from"], "input");
    }

    #[test]
    fn argument_order_is_preserved() {
        let out = calls(permissive(&["a"]).extract(r#"{"name":"a","input":{"z":1,"a":2,"m":3}}"#));
        let keys: Vec<&str> = out[0].input.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn missing_input_is_empty_object() {
        let out = calls(permissive(&["a"]).extract(r#"{"tool_calls":[{"name":"a"}]}"#));
        assert!(out[0].input.is_empty());
    }

    // ── argument decoding ───────────────────────────────────────────

    #[test]
    fn malformed_argument_string_kept_raw() {
        let out = calls(permissive(&["a"]).extract(r#"{"name":"a","arguments":"{not json"}"#));
        assert_eq!(out[0].input[RAW_ARGUMENTS_KEY], "{not json");
    }

    #[test]
    fn non_object_argument_string_kept_raw() {
        let out = calls(permissive(&["a"]).extract(r#"{"name":"a","arguments":"[1,2]"}"#));
        assert_eq!(out[0].input[RAW_ARGUMENTS_KEY], "[1,2]");
    }

    #[test]
    fn empty_argument_string_is_empty_object() {
        let out = calls(permissive(&["a"]).extract(r#"{"name":"a","arguments":"  "}"#));
        assert!(out[0].input.is_empty());
    }

    // ── name policy ─────────────────────────────────────────────────

    #[test]
    fn case_insensitive_match_canonicalizes() {
        let out = calls(strict(&["get_weather"]).extract(r#"{"tool_calls":[{"name":"Get_Weather"}]}"#));
        assert_eq!(out[0].name, "get_weather");
    }

    #[test]
    fn permissive_keeps_unknown_names() {
        let out = calls(permissive(&["search"]).extract(r#"{"tool_calls":[{"name":"browse","input":{}}]}"#));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "browse");
    }

    #[test]
    fn strict_rejects_unknown_names() {
        let out = strict(&["search"]).extract(r#"{"tool_calls":[{"name":"browse"}]}"#);
        assert_matches!(out, Extracted::Rejected { names } => assert_eq!(names, ["browse"]));
    }

    #[test]
    fn strict_keeps_known_among_unknown() {
        let out = calls(strict(&["search"]).extract(r#"{"tool_calls":[{"name":"browse"},{"name":"search"}]}"#));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "search");
    }

    // ── no syntax ───────────────────────────────────────────────────

    #[test]
    fn invalid_json_is_not_tool_syntax() {
        assert_eq!(permissive(&[]).extract("{oops"), Extracted::NoToolSyntax);
    }

    #[test]
    fn empty_call_list_is_not_tool_syntax() {
        assert_eq!(permissive(&[]).extract(r#"{"tool_calls":[]}"#), Extracted::NoToolSyntax);
    }

    #[test]
    fn nameless_objects_are_not_tool_syntax() {
        let ex = permissive(&[]);
        assert_eq!(ex.extract(r#"{"answer":42}"#), Extracted::NoToolSyntax);
        assert_eq!(ex.extract(r#"{"tool_calls":[{"input":{}}]}"#), Extracted::NoToolSyntax);
        assert_eq!(ex.extract(r#"{"name":"   "}"#), Extracted::NoToolSyntax);
    }
}
