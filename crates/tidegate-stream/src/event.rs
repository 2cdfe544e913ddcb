//! Upstream event line parser.
//!
//! The upstream speaks a server-sent-events dialect: every meaningful line
//! is `data: <json object>` and the stream ends with `data: [DONE]`. Lines
//! without the prefix (blank separators, `event:` names, comments) carry
//! nothing for us.

use serde_json::{Map, Value};
use tracing::trace;

/// Literal payload marking the end of the stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Status code the upstream uses when it refuses the content.
pub const CONTENT_FILTER_CODE: &str = "content_filter";

/// Message surfaced for a content-filter stop.
pub const CONTENT_FILTER_MESSAGE: &str = "content filtered by upstream";

/// One upstream line, classified.
#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamEvent {
    /// Not a data line, or a payload that does not decode to an object.
    Skip,
    /// The terminal marker.
    Done,
    /// The upstream declared an error.
    Error(String),
    /// The upstream filtered the content.
    Filtered,
    /// A decoded JSON object awaiting content extraction.
    Chunk(Map<String, Value>),
}

/// Classify one raw line.
///
/// The terminal marker is recognized before any JSON decoding. Invalid
/// UTF-8 and undecodable JSON are skipped rather than treated as errors.
pub fn parse_event_line(line: &[u8]) -> UpstreamEvent {
    let Ok(line) = std::str::from_utf8(line) else {
        trace!(len = line.len(), "skipping non-utf8 upstream line");
        return UpstreamEvent::Skip;
    };
    let Some(data) = line.trim().strip_prefix("data:") else {
        return UpstreamEvent::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return UpstreamEvent::Skip;
    }
    if data == DONE_MARKER {
        return UpstreamEvent::Done;
    }

    let chunk = match serde_json::from_str::<Map<String, Value>>(data) {
        Ok(chunk) => chunk,
        Err(err) => {
            trace!(error = %err, "skipping undecodable upstream line");
            return UpstreamEvent::Skip;
        }
    };

    if let Some(error) = chunk.get("error").filter(|e| !e.is_null()) {
        return UpstreamEvent::Error(error_message(error));
    }
    if chunk.get("code").and_then(Value::as_str) == Some(CONTENT_FILTER_CODE) {
        return UpstreamEvent::Filtered;
    }
    UpstreamEvent::Chunk(chunk)
}

/// Render an upstream error payload as a message.
fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string),
        other => other.to_string(),
    }
}
