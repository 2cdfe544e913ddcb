//! Content extraction from decoded upstream chunks.
//!
//! A chunk is a patch against the upstream's response document:
//! `p` is the path being written, `o` the operation (`APPEND`, `SET`, ...)
//! and `v` the value. Content arrives through several historical shapes:
//!
//! - direct paths (`response/content`, `response/thinking_content`)
//! - a flat fragment append (`p = "response/fragments"`, `o = "APPEND"`)
//! - a nested fragment append (`p = "response"` whose value is an array of
//!   sub-patches, one of them `{p: "fragments", o: "APPEND", v: [...]}`)
//! - a wrapped snapshot (`v = {response: {fragments: [...]}}`)
//! - bare string values on an empty path (the continuation of whatever
//!   fragment is currently open)
//!
//! Fragment records carry a `type`; reasoning types switch the active kind
//! to [`FragmentKind::Reasoning`] and `RESPONSE` switches it back to
//! [`FragmentKind::Text`]. The active kind persists across lines and is
//! returned in [`Extraction::next_kind`].

use serde_json::{Map, Value};
use tidegate_core::{ContentFragment, FragmentKind};

/// Status value marking the end of the response.
const FINISHED: &str = "FINISHED";

/// Heartbeat and metadata paths that never carry content.
const SKIPPED_PATH_PARTS: [&str; 8] = [
    "quasi_status",
    "elapsed_secs",
    "token_usage",
    "pending_fragment",
    "conversation_mode",
    "fragments/-1/status",
    "fragments/-2/status",
    "fragments/-3/status",
];

/// Result of extracting one chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Fragments in the order they appear in the chunk.
    pub fragments: Vec<ContentFragment>,
    /// A `FINISHED` status was seen.
    pub finished: bool,
    /// Active kind after this chunk.
    pub next_kind: FragmentKind,
}

/// Extract content fragments from one decoded chunk.
pub fn extract_content(
    chunk: &Map<String, Value>,
    thinking_enabled: bool,
    active: FragmentKind,
) -> Extraction {
    let mut extractor = Extractor {
        fragments: Vec::new(),
        kind: active,
        finished: false,
        thinking_enabled,
    };
    extractor.chunk(chunk);
    Extraction {
        fragments: extractor.fragments,
        finished: extractor.finished,
        next_kind: extractor.kind,
    }
}

fn is_skipped_path(path: &str) -> bool {
    path == "response/search_status" || SKIPPED_PATH_PARTS.iter().any(|p| path.contains(p))
}

fn is_status_path(path: &str) -> bool {
    path == "status" || path == "response/status"
}

fn is_append(op: Option<&str>) -> bool {
    op.is_some_and(|o| o.eq_ignore_ascii_case("APPEND"))
}

/// A fragment-append operation, normalized from its historical shapes.
enum FragmentAppend<'a> {
    /// `p = "response/fragments"`, `o = "APPEND"`, `v = [records]`.
    Flat(&'a [Value]),
    /// `v = {response: {fragments: [records]}}` or `v = {fragments: [records]}`.
    Wrapped(&'a [Value]),
}

impl<'a> FragmentAppend<'a> {
    fn decode(path: &str, op: Option<&str>, value: &'a Value) -> Option<Self> {
        match value {
            Value::Array(records) if path == "response/fragments" && is_append(op) => {
                Some(Self::Flat(records))
            }
            Value::Object(map) => {
                let response = map.get("response").and_then(Value::as_object).unwrap_or(map);
                response
                    .get("fragments")
                    .and_then(Value::as_array)
                    .map(|records| Self::Wrapped(records.as_slice()))
            }
            _ => None,
        }
    }

    fn records(&self) -> &'a [Value] {
        match self {
            Self::Flat(records) | Self::Wrapped(records) => records,
        }
    }
}

/// Classification of a fragment record's `type`.
enum RecordType {
    Reasoning,
    Response,
    Other,
}

impl RecordType {
    fn of(record: &Map<String, Value>) -> Self {
        let ty = record.get("type").and_then(Value::as_str).unwrap_or_default();
        if ty.eq_ignore_ascii_case("THINK") || ty.eq_ignore_ascii_case("THINKING") {
            Self::Reasoning
        } else if ty.eq_ignore_ascii_case("RESPONSE") {
            Self::Response
        } else {
            Self::Other
        }
    }
}

struct Extractor {
    fragments: Vec<ContentFragment>,
    kind: FragmentKind,
    finished: bool,
    thinking_enabled: bool,
}

impl Extractor {
    fn chunk(&mut self, chunk: &Map<String, Value>) {
        let Some(value) = chunk.get("v") else {
            return;
        };
        let path = chunk.get("p").and_then(Value::as_str).unwrap_or_default();
        let op = chunk.get("o").and_then(Value::as_str);

        if is_skipped_path(path) {
            return;
        }
        if path == "response/status" {
            self.finished = value.as_str() == Some(FINISHED);
            return;
        }
        if let Some(append) = FragmentAppend::decode(path, op, value) {
            self.records(append.records());
            return;
        }

        let kind = self.kind_for_path(path);
        match value {
            Value::String(s) if s == FINISHED && (path.is_empty() || path == "status") => {
                self.finished = true;
            }
            Value::String(s) => self.push(kind, s),
            Value::Array(items) => self.walk(items, kind),
            _ => {}
        }
    }

    /// Kind for a top-level path. Only fragment appends move `self.kind`.
    fn kind_for_path(&self, path: &str) -> FragmentKind {
        match path {
            "response/thinking_content" => FragmentKind::Reasoning,
            "response/content" => FragmentKind::Text,
            p if p.contains("response/fragments") && p.contains("/content") => self.kind,
            "" if self.thinking_enabled => self.kind,
            _ => FragmentKind::Text,
        }
    }

    /// Apply fragment records in order, switching the active kind.
    fn records(&mut self, records: &[Value]) {
        for record in records.iter().filter_map(Value::as_object) {
            self.record(record);
        }
    }

    fn record(&mut self, record: &Map<String, Value>) {
        match RecordType::of(record) {
            RecordType::Reasoning => self.kind = FragmentKind::Reasoning,
            RecordType::Response => self.kind = FragmentKind::Text,
            RecordType::Other => {}
        }
        if let Some(content) = record.get("content").and_then(Value::as_str) {
            self.push(self.kind, content);
        }
    }

    /// Recursive extraction over an array of sub-patches, records, and
    /// strings. Stops as soon as a `FINISHED` status is seen.
    fn walk(&mut self, items: &[Value], default_kind: FragmentKind) {
        for item in items {
            if self.finished {
                return;
            }
            match item {
                Value::String(s) => self.push(default_kind, s),
                Value::Array(nested) => self.walk(nested, default_kind),
                Value::Object(map) => self.walk_object(map, default_kind),
                _ => {}
            }
        }
    }

    fn walk_object(&mut self, item: &Map<String, Value>, default_kind: FragmentKind) {
        let Some(value) = item.get("v") else {
            // A bare `{type, content}` record.
            if item.contains_key("content") {
                self.record(item);
            }
            return;
        };
        let path = item.get("p").and_then(Value::as_str).unwrap_or_default();
        let op = item.get("o").and_then(Value::as_str);

        if is_status_path(path) {
            self.finished = value.as_str() == Some(FINISHED);
            return;
        }
        if is_skipped_path(path) {
            return;
        }
        if path == "fragments" && is_append(op) {
            if let Value::Array(records) = value {
                self.records(records);
            }
            return;
        }

        let kind = if path.contains("thinking") {
            FragmentKind::Reasoning
        } else if path.contains("content") || path == "response/fragments" {
            FragmentKind::Text
        } else {
            default_kind
        };
        match value {
            Value::String(s) if s == FINISHED => {}
            Value::String(s) => self.push(kind, s),
            Value::Array(nested) => self.walk(nested, kind),
            _ => {}
        }
    }

    fn push(&mut self, kind: FragmentKind, text: &str) {
        if text.is_empty() {
            return;
        }
        self.fragments.push(ContentFragment {
            text: text.to_string(),
            kind,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(chunk: Value, thinking: bool, active: FragmentKind) -> Extraction {
        let map = chunk.as_object().unwrap().clone();
        extract_content(&map, thinking, active)
    }

    fn texts(ex: &Extraction) -> Vec<(&str, FragmentKind)> {
        ex.fragments.iter().map(|f| (f.text.as_str(), f.kind)).collect()
    }

    // ── direct paths ────────────────────────────────────────────────

    #[test]
    fn response_content_is_text() {
        let ex = run(
            json!({"p": "response/content", "v": "hello"}),
            true,
            FragmentKind::Reasoning,
        );
        assert_eq!(texts(&ex), vec![("hello", FragmentKind::Text)]);
        assert_eq!(ex.next_kind, FragmentKind::Reasoning);
    }

    #[test]
    fn thinking_content_is_reasoning() {
        let ex = run(
            json!({"p": "response/thinking_content", "v": "hmm"}),
            false,
            FragmentKind::Text,
        );
        assert_eq!(texts(&ex), vec![("hmm", FragmentKind::Reasoning)]);
    }

    #[test]
    fn empty_path_follows_active_kind_when_thinking() {
        let ex = run(json!({"v": "step"}), true, FragmentKind::Reasoning);
        assert_eq!(texts(&ex), vec![("step", FragmentKind::Reasoning)]);
    }

    #[test]
    fn empty_path_is_text_without_thinking() {
        let ex = run(json!({"v": "word"}), false, FragmentKind::Reasoning);
        assert_eq!(texts(&ex), vec![("word", FragmentKind::Text)]);
    }

    #[test]
    fn fragment_content_path_follows_active_kind() {
        let ex = run(
            json!({"p": "response/fragments/-1/content", "o": "APPEND", "v": "more"}),
            true,
            FragmentKind::Reasoning,
        );
        assert_eq!(texts(&ex), vec![("more", FragmentKind::Reasoning)]);
    }

    #[test]
    fn unknown_path_defaults_to_text() {
        let ex = run(
            json!({"p": "response/new_field", "v": "x"}),
            true,
            FragmentKind::Reasoning,
        );
        assert_eq!(texts(&ex), vec![("x", FragmentKind::Text)]);
    }

    // ── skipped paths ───────────────────────────────────────────────

    #[test]
    fn metadata_paths_produce_nothing() {
        for path in [
            "response/quasi_status",
            "response/elapsed_secs",
            "response/token_usage",
            "response/fragments/-1/status",
            "response/search_status",
            "response/conversation_mode",
        ] {
            let ex = run(json!({"p": path, "v": "123"}), false, FragmentKind::Text);
            assert!(ex.fragments.is_empty(), "path {path} produced fragments");
            assert!(!ex.finished);
        }
    }

    #[test]
    fn missing_value_produces_nothing() {
        let ex = run(json!({"p": "response/content"}), false, FragmentKind::Text);
        assert_eq!(ex, Extraction::default());
    }

    #[test]
    fn non_string_scalar_produces_nothing() {
        let ex = run(json!({"p": "response/content", "v": 42}), false, FragmentKind::Text);
        assert!(ex.fragments.is_empty());
    }

    // ── finished ────────────────────────────────────────────────────

    #[test]
    fn response_status_finished() {
        let ex = run(
            json!({"p": "response/status", "v": "FINISHED"}),
            false,
            FragmentKind::Text,
        );
        assert!(ex.finished);
    }

    #[test]
    fn response_status_other_is_not_content() {
        let ex = run(
            json!({"p": "response/status", "v": "WIP"}),
            false,
            FragmentKind::Text,
        );
        assert!(!ex.finished);
        assert!(ex.fragments.is_empty());
    }

    #[test]
    fn bare_finished_on_status_path() {
        let ex = run(json!({"p": "status", "v": "FINISHED"}), false, FragmentKind::Text);
        assert!(ex.finished);
        let ex = run(json!({"v": "FINISHED"}), false, FragmentKind::Text);
        assert!(ex.finished);
    }

    #[test]
    fn nested_finished_stops_walk() {
        let ex = run(
            json!({"p": "response", "o": "BATCH", "v": [
                {"p": "content", "v": "before"},
                {"p": "status", "v": "FINISHED"},
                {"p": "content", "v": "after"}
            ]}),
            false,
            FragmentKind::Text,
        );
        assert!(ex.finished);
        assert_eq!(texts(&ex), vec![("before", FragmentKind::Text)]);
    }

    #[test]
    fn deeply_nested_finished() {
        let ex = run(
            json!({"p": "response", "v": [[{"p": "status", "v": "FINISHED"}], "tail"]}),
            false,
            FragmentKind::Text,
        );
        assert!(ex.finished);
        assert!(ex.fragments.is_empty());
    }

    // ── fragment appends ────────────────────────────────────────────

    #[test]
    fn flat_append_switches_kind() {
        let ex = run(
            json!({"p": "response/fragments", "o": "APPEND", "v": [
                {"type": "THINK", "content": "let me see"}
            ]}),
            true,
            FragmentKind::Text,
        );
        assert_eq!(texts(&ex), vec![("let me see", FragmentKind::Reasoning)]);
        assert_eq!(ex.next_kind, FragmentKind::Reasoning);
    }

    #[test]
    fn flat_append_response_switches_back() {
        let ex = run(
            json!({"p": "response/fragments", "o": "append", "v": [
                {"type": "RESPONSE", "content": "Answer"}
            ]}),
            true,
            FragmentKind::Reasoning,
        );
        assert_eq!(texts(&ex), vec![("Answer", FragmentKind::Text)]);
        assert_eq!(ex.next_kind, FragmentKind::Text);
    }

    #[test]
    fn unknown_record_type_uses_active_kind() {
        let ex = run(
            json!({"p": "response/fragments", "o": "APPEND", "v": [
                {"type": "THINKING", "content": "a"},
                {"type": "TOOL_SEARCH", "content": "b"},
                {"type": "RESPONSE", "content": "c"},
                {"type": "TOOL_OPEN", "content": "d"}
            ]}),
            true,
            FragmentKind::Text,
        );
        assert_eq!(
            texts(&ex),
            vec![
                ("a", FragmentKind::Reasoning),
                ("b", FragmentKind::Reasoning),
                ("c", FragmentKind::Text),
                ("d", FragmentKind::Text),
            ]
        );
    }

    #[test]
    fn empty_record_content_still_switches_kind() {
        let ex = run(
            json!({"p": "response/fragments", "o": "APPEND", "v": [
                {"type": "RESPONSE", "content": ""}
            ]}),
            true,
            FragmentKind::Reasoning,
        );
        assert!(ex.fragments.is_empty());
        assert_eq!(ex.next_kind, FragmentKind::Text);
    }

    #[test]
    fn nested_append_under_response() {
        let ex = run(
            json!({"p": "response", "o": "BATCH", "v": [
                {"p": "fragments", "o": "APPEND", "v": [{"type": "RESPONSE", "content": "Hi"}]},
                {"p": "quasi_status", "v": "x"}
            ]}),
            true,
            FragmentKind::Reasoning,
        );
        assert_eq!(texts(&ex), vec![("Hi", FragmentKind::Text)]);
        assert_eq!(ex.next_kind, FragmentKind::Text);
    }

    #[test]
    fn wrapped_snapshot_fragments() {
        let ex = run(
            json!({"v": {"response": {"message_id": 2, "fragments": [
                {"id": 1, "type": "THINK", "content": "ponder"}
            ]}}}),
            true,
            FragmentKind::Text,
        );
        assert_eq!(texts(&ex), vec![("ponder", FragmentKind::Reasoning)]);
        assert_eq!(ex.next_kind, FragmentKind::Reasoning);
    }

    #[test]
    fn wrapped_without_response_key() {
        let ex = run(
            json!({"v": {"fragments": [{"type": "RESPONSE", "content": "ok"}]}}),
            false,
            FragmentKind::Text,
        );
        assert_eq!(texts(&ex), vec![("ok", FragmentKind::Text)]);
    }

    #[test]
    fn kind_switch_persists_to_next_line() {
        let first = run(
            json!({"p": "response/fragments", "o": "APPEND", "v": [{"type": "RESPONSE", "content": ""}]}),
            true,
            FragmentKind::Reasoning,
        );
        let second = run(json!({"v": "continued"}), true, first.next_kind);
        assert_eq!(texts(&second), vec![("continued", FragmentKind::Text)]);
    }

    // ── recursive arrays ────────────────────────────────────────────

    #[test]
    fn array_items_use_path_heuristics() {
        let ex = run(
            json!({"p": "response", "v": [
                {"p": "thinking_content", "v": "t"},
                {"p": "content", "v": "c"},
                {"p": "other", "v": "o"},
                "bare"
            ]}),
            false,
            FragmentKind::Reasoning,
        );
        assert_eq!(
            texts(&ex),
            vec![
                ("t", FragmentKind::Reasoning),
                ("c", FragmentKind::Text),
                ("o", FragmentKind::Text),
                ("bare", FragmentKind::Text),
            ]
        );
    }

    #[test]
    fn array_records_dispatch_on_type() {
        let ex = run(
            json!({"p": "response/content", "v": [
                {"type": "THINK", "content": "r"},
                {"type": "RESPONSE", "content": "t"}
            ]}),
            false,
            FragmentKind::Text,
        );
        assert_eq!(
            texts(&ex),
            vec![("r", FragmentKind::Reasoning), ("t", FragmentKind::Text)]
        );
    }

    #[test]
    fn unknown_shapes_degrade_to_nothing() {
        let ex = run(
            json!({"p": "response", "v": [{"weird": true}, 7, null]}),
            false,
            FragmentKind::Text,
        );
        assert_eq!(ex, Extraction::default());
    }
}
