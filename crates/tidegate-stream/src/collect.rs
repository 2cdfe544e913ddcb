//! Whole-response aggregation for non-streaming callers.

use tidegate_core::FragmentKind;
use tidegate_core::text::is_citation;
use tokio::sync::mpsc;

use crate::line::LineResult;

/// Why a response ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Terminal marker or `FINISHED` status.
    Finished,
    /// The upstream filtered the content.
    Filtered,
    /// The upstream declared an error.
    UpstreamError(String),
    /// The result channel closed without a stop signal.
    Eof,
}

impl StopReason {
    /// Stop reason carried by a line, if it stopped the stream.
    pub fn of(line: &LineResult) -> Option<Self> {
        if !line.stop {
            return None;
        }
        Some(if line.filtered {
            Self::Filtered
        } else if let Some(message) = &line.error_message {
            Self::UpstreamError(message.clone())
        } else {
            Self::Finished
        })
    }
}

/// Text and reasoning collected from a whole response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collected {
    /// Response content.
    pub text: String,
    /// Reasoning content.
    pub reasoning: String,
    /// How the response ended.
    pub stop: StopReason,
}

/// Drain `lines` until a stop signal or channel close.
///
/// With `drop_citations`, text fragments that are search citation markers
/// are left out.
pub async fn collect_lines(lines: &mut mpsc::Receiver<LineResult>, drop_citations: bool) -> Collected {
    let mut text = String::new();
    let mut reasoning = String::new();

    while let Some(line) = lines.recv().await {
        for fragment in &line.fragments {
            match fragment.kind {
                FragmentKind::Reasoning => reasoning.push_str(&fragment.text),
                FragmentKind::Text if drop_citations && is_citation(&fragment.text) => {}
                FragmentKind::Text => text.push_str(&fragment.text),
            }
        }
        if let Some(stop) = StopReason::of(&line) {
            return Collected {
                text,
                reasoning,
                stop,
            };
        }
    }

    Collected {
        text,
        reasoning,
        stop: StopReason::Eof,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidegate_core::ContentFragment;

    fn line(fragments: Vec<ContentFragment>) -> LineResult {
        LineResult {
            parsed: true,
            fragments,
            ..LineResult::default()
        }
    }

    fn stop_line() -> LineResult {
        LineResult {
            parsed: true,
            stop: true,
            ..LineResult::default()
        }
    }

    async fn collect(lines: Vec<LineResult>, drop_citations: bool) -> Collected {
        let (tx, mut rx) = mpsc::channel(16);
        for l in lines {
            tx.send(l).await.unwrap();
        }
        drop(tx);
        collect_lines(&mut rx, drop_citations).await
    }

    #[tokio::test]
    async fn separates_reasoning_from_text() {
        let collected = collect(
            vec![
                line(vec![ContentFragment::reasoning("think ")]),
                line(vec![ContentFragment::reasoning("more"), ContentFragment::text("Ans")]),
                line(vec![ContentFragment::text("wer")]),
                stop_line(),
            ],
            false,
        )
        .await;
        assert_eq!(collected.reasoning, "think more");
        assert_eq!(collected.text, "Answer");
        assert_eq!(collected.stop, StopReason::Finished);
    }

    #[tokio::test]
    async fn stops_at_first_stop_line() {
        let collected = collect(
            vec![
                line(vec![ContentFragment::text("a")]),
                stop_line(),
                line(vec![ContentFragment::text("b")]),
            ],
            false,
        )
        .await;
        assert_eq!(collected.text, "a");
    }

    #[tokio::test]
    async fn eof_without_stop() {
        let collected = collect(vec![line(vec![ContentFragment::text("a")])], false).await;
        assert_eq!(collected.stop, StopReason::Eof);
    }

    #[tokio::test]
    async fn error_and_filter_reasons() {
        let error = LineResult {
            error_message: Some("boom".into()),
            ..stop_line()
        };
        let collected = collect(vec![error], false).await;
        assert_eq!(collected.stop, StopReason::UpstreamError("boom".into()));

        let filtered = LineResult {
            filtered: true,
            error_message: Some("content filtered by upstream".into()),
            ..stop_line()
        };
        let collected = collect(vec![filtered], false).await;
        assert_eq!(collected.stop, StopReason::Filtered);
    }

    #[tokio::test]
    async fn citations_dropped_when_requested() {
        let lines = vec![line(vec![
            ContentFragment::text("Go is fast"),
            ContentFragment::text("[citation:2]"),
            ContentFragment::text("."),
        ])];
        assert_eq!(collect(lines.clone(), true).await.text, "Go is fast.");
        assert_eq!(collect(lines, false).await.text, "Go is fast[citation:2].");
    }
}
