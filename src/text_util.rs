/// Maximum number of characters of a chunk shown to the reranking model.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// Collapse every whitespace run into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Produce a single-line preview of at most `max_chars` characters.
///
/// Truncated previews end with `...` (not counted in `max_chars`).
/// Truncation happens on character boundaries, never inside a multi-byte
/// character.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = collapse_whitespace(text);
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
