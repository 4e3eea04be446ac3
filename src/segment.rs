//! Sentence segmentation.
//!
//! Two policies exist. CJK text is cut after each ideographic terminator,
//! which stays attached to the sentence it ends. Everything else is cut on
//! the whitespace run that follows `.`, `?` or `!`; that whitespace is
//! consumed and each piece is trimmed.

use crate::language::Language;

/// Characters that terminate a sentence in CJK text.
const CJK_TERMINATORS: [char; 5] = ['。', '？', '！', '…', '；'];

/// Characters that may end a sentence when followed by whitespace.
const TERMINATORS: [char; 3] = ['.', '?', '!'];

/// Split `text` into sentences using the policy for `language`.
///
/// Never drops non-whitespace content and always yields the same sentences
/// for the same input.
///
/// # Examples
///
/// ```
/// use docrag::{language::Language, segment::split_sentences};
///
/// let en = split_sentences("One. Two? Three", &Language::from("en"));
/// assert_eq!(en, ["One.", "Two?", "Three"]);
///
/// let zh = split_sentences("你好。再见", &Language::from("zh"));
/// assert_eq!(zh, ["你好。", "再见"]);
/// ```
pub fn split_sentences(text: &str, language: &Language) -> Vec<String> {
    if language.is_cjk() {
        split_cjk(text)
    } else {
        split_on_terminal_whitespace(text)
    }
}

fn split_cjk(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        if CJK_TERMINATORS.contains(&c) {
            let end = idx + c.len_utf8();
            sentences.push(text[start..end].to_string());
            start = end;
        }
    }

    let rest = &text[start..];
    if !rest.trim().is_empty() {
        sentences.push(rest.to_string());
    }

    sentences
}

fn split_on_terminal_whitespace(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut push = |piece: &str| {
        let piece = piece.trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
    };

    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c.is_whitespace() && prev.is_some_and(|p| TERMINATORS.contains(&p))
        {
            push(&text[start..idx]);

            // Swallow the whole whitespace run.
            let mut end = idx + c.len_utf8();
            while let Some(&(next_idx, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                end = next_idx + next.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    push(&text[start..]);
    sentences
}
