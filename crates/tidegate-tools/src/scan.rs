//! Index-based scanning helpers for the sieve.
//!
//! Every marker searched for here is ASCII, so byte offsets returned by
//! these functions always fall on UTF-8 character boundaries.

/// Key that marks a tool-invocation payload.
pub const TOOL_CALLS_KEY: &str = "tool_calls";

/// Markdown code fence.
pub const FENCE: &str = "```";

/// Resumable scan for the closing brace of a JSON object.
///
/// Tracks nesting depth and string/escape state so braces inside string
/// literals are ignored. The scanned buffer may grow between calls to
/// [`ObjectScanner::advance`]; already-scanned bytes are never revisited.
#[derive(Clone, Debug)]
pub struct ObjectScanner {
    cursor: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ObjectScanner {
    /// Start scanning at `start`, which must index an opening brace.
    pub fn new(start: usize) -> Self {
        Self {
            cursor: start,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Scan newly available bytes. Returns the exclusive end of the object
    /// once its closing brace is seen.
    pub fn advance(&mut self, buf: &[u8]) -> Option<usize> {
        while let Some(&b) = buf.get(self.cursor) {
            self.cursor += 1;
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(self.cursor);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// ASCII case-insensitive substring search starting at byte `from`.
pub fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes().get(from..)?;
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|i| i + from)
}

/// Whether the end of `s` sits inside an unterminated code fence.
pub fn inside_code_fence(s: &str) -> bool {
    s.matches(FENCE).count() % 2 == 1
}

/// Nearest opening brace before `end` not closed before `end`.
pub fn unmatched_open_brace(s: &str, end: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in s.as_bytes()[..end].iter().enumerate().rev() {
        match b {
            b'}' => depth += 1,
            b'{' if depth == 0 => return Some(i),
            b'{' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Start of the first tool-call object in `s` that is not inside a code
/// fence.
///
/// The backward depth walk does not see string literals, so a `}` inside
/// an earlier string can hide the real opening brace. When the walk comes
/// up empty the last `{` before the key is used instead. A key with no
/// brace before it at all is passed over, as is a key whose object opens
/// inside a fence.
pub fn find_trigger(s: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(key) = find_ascii_ci(s, TOOL_CALLS_KEY, from) {
        if let Some(start) = unmatched_open_brace(s, key).or_else(|| s[..key].rfind('{')) {
            if !inside_code_fence(&s[..start]) {
                return Some(start);
            }
        }
        from = key + TOOL_CALLS_KEY.len();
    }
    None
}

/// Start of the trailing span that could still grow into a tool call: the
/// last opening brace, bracket, or fence marker.
pub fn suspicious_start(s: &str) -> Option<usize> {
    [s.rfind('{'), s.rfind('['), s.rfind(FENCE)]
        .into_iter()
        .flatten()
        .max()
}

/// Whether `s` holds anything other than whitespace.
pub fn has_content(s: &str) -> bool {
    !s.trim().is_empty()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
