//! Background line pump.
//!
//! Reads an upstream byte stream line by line, parses each line with the
//! active fragment kind threaded through, and publishes [`LineResult`]s on a
//! bounded channel. The pump ends on the first stop result, at end of input,
//! on a read failure, or when cancelled; the outcome is reported once on
//! [`LinePump::done`] and the result channel is closed.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use thiserror::Error;
use tidegate_core::FragmentKind;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::line::{LineResult, parse_line};

/// Default capacity of the result channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Default maximum line length (2 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 2 * 1024 * 1024;

/// Why a pump stopped early.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PumpError {
    /// A single line exceeded the configured maximum.
    #[error("upstream line exceeds {limit} bytes")]
    LineTooLong {
        /// The configured maximum.
        limit: usize,
    },
    /// The byte stream yielded an error.
    #[error("upstream read failed: {0}")]
    Read(String),
    /// The cancellation token fired or the consumer dropped the result
    /// channel.
    #[error("stream cancelled")]
    Cancelled,
}

/// Pump configuration.
#[derive(Clone, Debug)]
pub struct PumpOptions {
    /// Whether upstream reasoning is enabled for this response.
    pub thinking_enabled: bool,
    /// Result channel capacity.
    pub channel_capacity: usize,
    /// Longest accepted line, excluding the line terminator.
    pub max_line_bytes: usize,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            thinking_enabled: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Handles to a running pump.
#[derive(Debug)]
pub struct LinePump {
    /// Ordered per-line results. Closed when the pump ends.
    pub lines: mpsc::Receiver<LineResult>,
    /// Outcome of the pump, sent once before the channel closes.
    pub done: oneshot::Receiver<Result<(), PumpError>>,
}

/// Spawn a pump over `body`.
///
/// Must be called from within a tokio runtime.
pub fn start_line_pump<S, E>(body: S, options: PumpOptions, cancel: CancellationToken) -> LinePump
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, lines) = mpsc::channel(options.channel_capacity.max(1));
    let (done_tx, done) = oneshot::channel();

    let _ = tokio::spawn(async move {
        let outcome = pump(body, &options, &cancel, &tx).await;
        match &outcome {
            Ok(()) => debug!("line pump finished"),
            Err(PumpError::Cancelled) => {
                debug!(reason = ?outcome, "line pump abandoned");
            }
            Err(err) => warn!(error = %err, "line pump failed"),
        }
        let _ = done_tx.send(outcome);
    });

    LinePump { lines, done }
}

async fn pump<S, E>(
    mut body: S,
    options: &PumpOptions,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<LineResult>,
) -> Result<(), PumpError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut splitter = LineSplitter::new(options.max_line_bytes);
    let mut kind = FragmentKind::initial(options.thinking_enabled);

    loop {
        while let Some(line) = splitter.next_line()? {
            if publish(&line, options, &mut kind, cancel, tx).await? {
                return Ok(());
            }
        }

        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PumpError::Cancelled),
            next = body.next() => next,
        };

        match next {
            Some(Ok(chunk)) => splitter.extend(&chunk),
            Some(Err(err)) => return Err(PumpError::Read(err.to_string())),
            None => {
                if let Some(line) = splitter.finish() {
                    let _ = publish(&line, options, &mut kind, cancel, tx).await?;
                }
                return Ok(());
            }
        }
    }
}

/// Parse and send one line. Returns whether the line stopped the stream.
async fn publish(
    line: &[u8],
    options: &PumpOptions,
    kind: &mut FragmentKind,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<LineResult>,
) -> Result<bool, PumpError> {
    let result = parse_line(line, options.thinking_enabled, *kind);
    *kind = result.next_kind;
    if !result.parsed {
        return Ok(false);
    }
    let stop = result.stop;

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PumpError::Cancelled),
        sent = tx.send(result) => sent.map(|()| stop).map_err(|_| PumpError::Cancelled),
    }
}

/// Incremental newline splitter with a line length cap.
struct LineSplitter {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to hold no newline.
    scanned: usize,
    max_line_bytes: usize,
}

impl LineSplitter {
    fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            max_line_bytes,
        }
    }

    fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator, if one is buffered.
    fn next_line(&mut self) -> Result<Option<Bytes>, PumpError> {
        let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.buffer.len();
            // a trailing `\r` may still be the first half of `\r\n`
            let pending = self.buffer.len() - usize::from(self.buffer.last() == Some(&b'\r'));
            if pending > self.max_line_bytes {
                return Err(PumpError::LineTooLong {
                    limit: self.max_line_bytes,
                });
            }
            return Ok(None);
        };

        let newline = self.scanned + offset;
        self.scanned = 0;
        let mut line = self.buffer.split_to(newline + 1);
        line.truncate(newline);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.len() > self.max_line_bytes {
            return Err(PumpError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        Ok(Some(line.freeze()))
    }

    /// Whatever is left once the input has ended.
    fn finish(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = self.buffer.split();
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(line.freeze())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tidegate_core::ContentFragment;

    type Chunk = Result<Bytes, std::io::Error>;

    fn body(chunks: &[&str]) -> impl Stream<Item = Chunk> + Send + Unpin + 'static {
        let owned: Vec<Chunk> = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.to_string())))
            .collect();
        futures::stream::iter(owned)
    }

    async fn drain(pump: &mut LinePump) -> Vec<LineResult> {
        let mut out = Vec::new();
        while let Some(result) = pump.lines.recv().await {
            out.push(result);
        }
        out
    }

    fn texts(results: &[LineResult]) -> Vec<ContentFragment> {
        results
            .iter()
            .flat_map(|r| r.fragments.iter().cloned())
            .collect()
    }

    // ── line splitting ──────────────────────────────────────────────

    #[test]
    fn splitter_handles_crlf_and_partial_lines() {
        let mut splitter = LineSplitter::new(1024);
        splitter.extend(b"data: a\r\ndata: ");
        assert_eq!(splitter.next_line().unwrap().unwrap(), Bytes::from("data: a"));
        assert!(splitter.next_line().unwrap().is_none());
        splitter.extend(b"b\n");
        assert_eq!(splitter.next_line().unwrap().unwrap(), Bytes::from("data: b"));
        assert!(splitter.finish().is_none());
    }

    #[test]
    fn splitter_rejects_long_partial_line() {
        let mut splitter = LineSplitter::new(4);
        splitter.extend(b"abcdef");
        assert_eq!(
            splitter.next_line().unwrap_err(),
            PumpError::LineTooLong { limit: 4 }
        );
    }

    #[test]
    fn splitter_allows_full_line_split_inside_crlf() {
        let mut splitter = LineSplitter::new(4);
        splitter.extend(b"abcd\r");
        assert!(splitter.next_line().unwrap().is_none());
        splitter.extend(b"\n");
        assert_eq!(splitter.next_line().unwrap().unwrap(), Bytes::from("abcd"));
    }

    #[test]
    fn splitter_still_rejects_overlong_line_ending_in_cr() {
        let mut splitter = LineSplitter::new(4);
        splitter.extend(b"abcde\r");
        assert_eq!(
            splitter.next_line().unwrap_err(),
            PumpError::LineTooLong { limit: 4 }
        );
    }

    // ── pump ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn lines_split_across_chunks_arrive_in_order() {
        let mut pump = start_line_pump(
            body(&[
                "data: {\"p\":\"response/content\",\"v\":\"Hel",
                "lo\"}\n\ndata: {\"v\":\" world\"}\n",
            ]),
            PumpOptions::default(),
            CancellationToken::new(),
        );
        let results = drain(&mut pump).await;
        assert_eq!(
            texts(&results),
            vec![ContentFragment::text("Hello"), ContentFragment::text(" world")]
        );
        assert_eq!(pump.done.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn kind_is_threaded_across_lines() {
        let options = PumpOptions {
            thinking_enabled: true,
            ..PumpOptions::default()
        };
        let mut pump = start_line_pump(
            body(&[
                "data: {\"v\":\"think\"}\n",
                "data: {\"p\":\"response/fragments\",\"o\":\"APPEND\",\"v\":[{\"type\":\"RESPONSE\",\"content\":\"A\"}]}\n",
                "data: {\"v\":\"B\"}\n",
            ]),
            options,
            CancellationToken::new(),
        );
        let results = drain(&mut pump).await;
        assert_eq!(
            texts(&results),
            vec![
                ContentFragment::reasoning("think"),
                ContentFragment::text("A"),
                ContentFragment::text("B"),
            ]
        );
    }

    #[tokio::test]
    async fn done_marker_stops_processing() {
        let mut pump = start_line_pump(
            body(&["data: {\"v\":\"a\"}\ndata: [DONE]\ndata: {\"v\":\"never\"}\n"]),
            PumpOptions::default(),
            CancellationToken::new(),
        );
        let results = drain(&mut pump).await;
        assert_eq!(results.len(), 2);
        assert!(results[1].stop);
        assert_eq!(texts(&results), vec![ContentFragment::text("a")]);
        assert_eq!(pump.done.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn unparsed_lines_are_not_published() {
        let mut pump = start_line_pump(
            body(&["event: ready\n\ndata: {broken\ndata: {\"v\":\"x\"}\n"]),
            PumpOptions::default(),
            CancellationToken::new(),
        );
        let results = drain(&mut pump).await;
        assert_eq!(results.len(), 1);
        assert_eq!(texts(&results), vec![ContentFragment::text("x")]);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_processed() {
        let mut pump = start_line_pump(
            body(&["data: {\"v\":\"tail\"}"]),
            PumpOptions::default(),
            CancellationToken::new(),
        );
        let results = drain(&mut pump).await;
        assert_eq!(texts(&results), vec![ContentFragment::text("tail")]);
    }

    #[tokio::test]
    async fn oversized_line_fails_the_stream() {
        let options = PumpOptions {
            max_line_bytes: 16,
            ..PumpOptions::default()
        };
        let long = format!("data: {{\"v\":\"{}\"}}\n", "x".repeat(64));
        let mut pump = start_line_pump(
            body(&["data: {\"v\":\"ok\"}\n", &long]),
            options,
            CancellationToken::new(),
        );
        let results = drain(&mut pump).await;
        assert_eq!(texts(&results), vec![ContentFragment::text("ok")]);
        assert_eq!(
            pump.done.await.unwrap(),
            Err(PumpError::LineTooLong { limit: 16 })
        );
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let chunks: Vec<Chunk> = vec![
            Ok(Bytes::from("data: {\"v\":\"a\"}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut pump = start_line_pump(
            futures::stream::iter(chunks),
            PumpOptions::default(),
            CancellationToken::new(),
        );
        let results = drain(&mut pump).await;
        assert_eq!(results.len(), 1);
        assert_matches!(pump.done.await.unwrap(), Err(PumpError::Read(msg)) => {
            assert!(msg.contains("reset"));
        });
    }

    #[tokio::test]
    async fn cancellation_abandons_a_stalled_read() {
        let first: Vec<Chunk> = vec![Ok(Bytes::from("data: {\"v\":\"a\"}\n"))];
        let stalled = futures::stream::iter(first).chain(futures::stream::pending());
        let cancel = CancellationToken::new();
        let mut pump = start_line_pump(stalled, PumpOptions::default(), cancel.clone());

        let first = pump.lines.recv().await.unwrap();
        assert_eq!(first.fragments, vec![ContentFragment::text("a")]);

        cancel.cancel();
        assert!(pump.lines.recv().await.is_none());
        assert_eq!(pump.done.await.unwrap(), Err(PumpError::Cancelled));
    }

    #[tokio::test]
    async fn dropped_consumer_ends_the_pump() {
        let options = PumpOptions {
            channel_capacity: 1,
            ..PumpOptions::default()
        };
        let many = "data: {\"v\":\"x\"}\n".repeat(8);
        let pump = start_line_pump(body(&[&many]), options, CancellationToken::new());
        let LinePump { lines, done } = pump;
        drop(lines);
        assert_eq!(done.await.unwrap(), Err(PumpError::Cancelled));
    }

    // ── properties ──────────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Feed `input` to a splitter in pieces cut at `cuts`.
        fn split_lines(input: &[u8], cuts: &[usize]) -> Vec<Bytes> {
            let mut splitter = LineSplitter::new(1024);
            let mut bounds: Vec<usize> = cuts.iter().map(|c| c % (input.len() + 1)).collect();
            bounds.push(0);
            bounds.push(input.len());
            bounds.sort_unstable();
            bounds.dedup();

            let mut lines = Vec::new();
            for pair in bounds.windows(2) {
                splitter.extend(&input[pair[0]..pair[1]]);
                while let Some(line) = splitter.next_line().unwrap() {
                    lines.push(line);
                }
            }
            lines.extend(splitter.finish());
            lines
        }

        proptest! {
            #[test]
            fn lines_are_independent_of_chunking(
                lines in proptest::collection::vec("[a-z :{}\"]{0,24}", 0..8),
                crlf in any::<bool>(),
                cuts in proptest::collection::vec(any::<usize>(), 0..10),
            ) {
                let sep = if crlf { "\r\n" } else { "\n" };
                let input: String = lines.iter().map(|l| format!("{l}{sep}")).collect();
                let whole = split_lines(input.as_bytes(), &[]);
                let chunked = split_lines(input.as_bytes(), &cuts);
                prop_assert_eq!(&chunked, &whole);
                let expected: Vec<Bytes> = lines.iter().map(|l| Bytes::from(l.clone())).collect();
                prop_assert_eq!(whole, expected);
            }
        }
    }
}
