//! Per-line orchestration: event parsing followed by content extraction.

use tidegate_core::{ContentFragment, FragmentKind};

use crate::event::{CONTENT_FILTER_MESSAGE, UpstreamEvent, parse_event_line};
use crate::extract::extract_content;

/// Normalized outcome of one upstream line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineResult {
    /// The line carried a decodable payload. Unparsed lines are skipped.
    pub parsed: bool,
    /// The stream is over: terminal marker, finished status, error, or filter.
    pub stop: bool,
    /// The upstream filtered the content.
    pub filtered: bool,
    /// Upstream error text, set together with `stop`.
    pub error_message: Option<String>,
    /// Content carried by the line, in order.
    pub fragments: Vec<ContentFragment>,
    /// Kind to pass into the next line's parse.
    pub next_kind: FragmentKind,
}

/// Parse one raw upstream line given the kind active after the previous one.
pub fn parse_line(line: &[u8], thinking_enabled: bool, current: FragmentKind) -> LineResult {
    let stop = |filtered: bool, error_message: Option<String>| LineResult {
        parsed: true,
        stop: true,
        filtered,
        error_message,
        fragments: Vec::new(),
        next_kind: current,
    };

    match parse_event_line(line) {
        UpstreamEvent::Skip => LineResult {
            next_kind: current,
            ..LineResult::default()
        },
        UpstreamEvent::Done => stop(false, None),
        UpstreamEvent::Error(message) => stop(false, Some(message)),
        UpstreamEvent::Filtered => stop(true, Some(CONTENT_FILTER_MESSAGE.to_string())),
        UpstreamEvent::Chunk(chunk) => {
            let extraction = extract_content(&chunk, thinking_enabled, current);
            LineResult {
                parsed: true,
                stop: extraction.finished,
                filtered: false,
                error_message: None,
                fragments: extraction.fragments,
                next_kind: extraction.next_kind,
            }
        }
    }
}
