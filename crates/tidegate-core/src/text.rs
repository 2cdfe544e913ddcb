//! Small text helpers shared by the adapters.

/// Marker prefix the backend uses for search citations.
pub const CITATION_PREFIX: &str = "[citation:";

/// Rough token estimate: one token per four characters, at least one for
/// non-empty text.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as u64;
    (chars / 4).max(1)
}

/// Whether a fragment is a search citation marker rather than content.
pub fn is_citation(text: &str) -> bool {
    text.trim_start().starts_with(CITATION_PREFIX)
}
