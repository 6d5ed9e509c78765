//! Paragraph-boundary text chunker.
//!
//! Splits page text into chunks that respect a token budget. Splitting
//! occurs on blank-line paragraph boundaries (`\n\n`) to preserve semantic
//! coherence within each chunk; a paragraph is never split in the middle,
//! so a single oversized paragraph yields a chunk over the budget.

/// Approximate chars-per-token ratio for English text.
const CHARS_PER_TOKEN: usize = 4;

/// Rough token estimate: character count divided by 4, floor.
pub fn approximate_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN
}

/// Split text into chunks of at most `max_tokens` (approximate), packing
/// consecutive paragraphs greedily. Chunks re-join with a blank line.
/// Empty input produces zero chunks.
pub fn split_text(text: &str, max_tokens: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for para in text.split("\n\n") {
        let para_tokens = approximate_tokens(para);

        if current_tokens + para_tokens > max_tokens && !current.is_empty() {
            chunks.push(current.join("\n\n"));
            current = vec![para];
            current_tokens = para_tokens;
        } else {
            current.push(para);
            current_tokens += para_tokens;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }

    chunks
}
