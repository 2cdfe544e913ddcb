//! Incremental separation of prose from tool invocations.
//!
//! The sieve sits between the text fragments of one response and the
//! client. Text that cannot be part of a tool payload is released as soon
//! as possible; anything that might still become one is held. A payload is
//! only executed when it is *standalone*: nothing but whitespace before or
//! after it in the whole turn, and not inside a code fence. Every byte that
//! is not executed is eventually emitted as text, in order.

use std::mem;

use tidegate_core::{ParsedToolCall, SieveEvent};
use tracing::debug;

use crate::extract::{Extracted, ToolCallExtractor};
use crate::scan::{ObjectScanner, find_trigger, has_content, inside_code_fence, suspicious_start};

/// Bytes of emitted text remembered for code-fence detection.
pub const DEFAULT_RECENT_WINDOW: usize = 256;

/// What a completed, standalone payload turned out to be.
#[derive(Debug)]
enum Verdict {
    Calls(Vec<ParsedToolCall>),
    Rejected,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Scanning,
    /// Collecting a candidate object; `buf` starts at its opening brace.
    Capturing { buf: String, scanner: ObjectScanner },
    /// A standalone payload awaiting the end of the turn.
    Stashed { verdict: Verdict, raw: String },
}

/// Stateful text/tool-call filter for one response.
#[derive(Debug)]
pub struct ToolSieve {
    extractor: ToolCallExtractor,
    phase: Phase,
    /// Text received while scanning but not yet released.
    pending: String,
    /// Tail of emitted text, for fence detection.
    recent: String,
    recent_window: usize,
    /// Any non-whitespace text emitted this turn.
    saw_prose: bool,
}

impl ToolSieve {
    /// Create a sieve.
    pub fn new(extractor: ToolCallExtractor, recent_window: usize) -> Self {
        Self {
            extractor,
            phase: Phase::Scanning,
            pending: String::new(),
            recent: String::new(),
            recent_window,
            saw_prose: false,
        }
    }

    /// Feed one text chunk, returning the events it releases.
    pub fn push(&mut self, chunk: &str) -> Vec<SieveEvent> {
        match &mut self.phase {
            Phase::Capturing { buf, .. } => buf.push_str(chunk),
            _ => self.pending.push_str(chunk),
        }
        let mut out = Vec::new();
        self.process(&mut out, false);
        out
    }

    /// End the turn, releasing everything still held.
    pub fn flush(mut self) -> Vec<SieveEvent> {
        let mut out = Vec::new();
        self.process(&mut out, true);
        match mem::take(&mut self.phase) {
            Phase::Stashed {
                verdict: Verdict::Calls(calls),
                ..
            } => out.push(SieveEvent::ToolCalls(calls)),
            Phase::Stashed {
                verdict: Verdict::Rejected,
                raw,
            } => debug!(len = raw.len(), "suppressing tool payload rejected by policy"),
            Phase::Capturing { buf, .. } => self.emit(&mut out, buf),
            Phase::Scanning => {}
        }
        let rest = mem::take(&mut self.pending);
        self.emit(&mut out, rest);
        out
    }

    fn process(&mut self, out: &mut Vec<SieveEvent>, end: bool) {
        loop {
            match &mut self.phase {
                Phase::Scanning => {
                    if self.pending.is_empty() {
                        return;
                    }
                    if let Some(start) = find_trigger(&self.pending) {
                        let buf = self.pending.split_off(start);
                        let prefix = mem::take(&mut self.pending);
                        self.emit(out, prefix);
                        self.phase = Phase::Capturing {
                            buf,
                            scanner: ObjectScanner::new(0),
                        };
                        continue;
                    }
                    let hold = if end { self.pending.len() } else { self.hold_from() };
                    let held = self.pending.split_off(hold);
                    let released = mem::replace(&mut self.pending, held);
                    self.emit(out, released);
                    return;
                }
                Phase::Capturing { buf, scanner } => {
                    let Some(object_end) = scanner.advance(buf.as_bytes()) else {
                        if end {
                            let buf = mem::take(buf);
                            self.phase = Phase::Scanning;
                            self.emit(out, buf);
                        }
                        return;
                    };
                    let buf = mem::take(buf);
                    self.phase = Phase::Scanning;
                    self.decide(out, buf, object_end);
                }
                Phase::Stashed { raw, .. } => {
                    let ws = self.pending.len() - self.pending.trim_start().len();
                    raw.extend(self.pending.drain(..ws));
                    if self.pending.is_empty() {
                        return;
                    }
                    let Phase::Stashed { raw, .. } = mem::take(&mut self.phase) else {
                        return;
                    };
                    debug!("tool payload followed by prose, releasing as text");
                    self.emit(out, raw);
                }
            }
        }
    }

    /// Resolve a capture whose object closed at `object_end`.
    fn decide(&mut self, out: &mut Vec<SieveEvent>, buf: String, object_end: usize) {
        let (object, suffix) = buf.split_at(object_end);
        if self.saw_prose || has_content(suffix) || inside_code_fence(&self.recent) {
            self.emit(out, buf);
            return;
        }
        let verdict = match self.extractor.extract(object) {
            Extracted::Calls(calls) => Verdict::Calls(calls),
            Extracted::Rejected { .. } => Verdict::Rejected,
            Extracted::NoToolSyntax => {
                self.emit(out, buf);
                return;
            }
        };
        self.phase = Phase::Stashed { verdict, raw: buf };
    }

    /// Offset in `pending` from which text must be held back.
    ///
    /// A leading object is held whole until it closes. Once it closes
    /// without having triggered a capture it is ordinary text.
    fn hold_from(&self) -> usize {
        let mut from = 0;
        if !self.saw_prose {
            let lead = self.pending.len() - self.pending.trim_start().len();
            if self.pending[lead..].starts_with('{') {
                match ObjectScanner::new(lead).advance(self.pending.as_bytes()) {
                    Some(end) => from = end,
                    None => return lead,
                }
            }
        }
        suspicious_start(&self.pending[from..]).map_or(self.pending.len(), |i| from + i)
    }

    fn emit(&mut self, out: &mut Vec<SieveEvent>, text: String) {
        if text.is_empty() {
            return;
        }
        if has_content(&text) {
            self.saw_prose = true;
        }
        self.recent.push_str(&text);
        if self.recent.len() > self.recent_window {
            let mut cut = self.recent.len() - self.recent_window;
            while !self.recent.is_char_boundary(cut) {
                cut += 1;
            }
            let _ = self.recent.drain(..cut);
        }
        out.push(SieveEvent::Text(text));
    }
}

/// Run a complete text through a fresh sieve in one step.
pub fn sieve_complete_text(extractor: ToolCallExtractor, recent_window: usize, text: &str) -> Vec<SieveEvent> {
    let mut sieve = ToolSieve::new(extractor, recent_window);
    let mut events = sieve.push(text);
    events.extend(sieve.flush());
    events
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
