//! Sentence-aware chunking with overlap.
//!
//! Documents are segmented into sentences, then sentences are packed into
//! chunks of at most `chunk_size` characters. When a chunk closes, the next
//! one starts with as many trailing sentences of the previous chunk as fit
//! in `chunk_overlap` characters. Sentences are never split, so a sentence
//! longer than `chunk_size` becomes a chunk of its own.
//!
//! Lengths are counted in Unicode scalar values, not bytes.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    document::Document,
    error::{Error, Result},
    language::Language,
    segment::split_sentences,
};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Metadata key carrying a chunk's run-wide position.
pub const CHUNK_INDEX_FIELD: &str = "chunk_index";

/// Chunk packing parameters.
///
/// # Examples
///
/// ```
/// use docrag::chunking::{ChunkingConfig, DEFAULT_CHUNK_SIZE};
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Maximum length of the sentence run shared by adjacent chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            tracing::warn!(
                chunk_size = self.chunk_size,
                chunk_overlap = self.chunk_overlap,
                "chunk_overlap is not smaller than chunk_size, chunks will overlap maximally"
            );
        }
        Ok(())
    }
}

/// A packed run of sentences from one document.
///
/// Serializes as `{"page_content": ..., "metadata": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Concatenated sentence text.
    #[serde(rename = "page_content")]
    pub text: String,
    /// Source document metadata plus [`CHUNK_INDEX_FIELD`].
    pub metadata: Map<String, Value>,
    /// Position of this chunk among all chunks of the run.
    #[serde(skip)]
    pub index: usize,
    /// Position of the source document in the input document list.
    #[serde(skip)]
    pub source_document: usize,
}

impl Chunk {
    fn new(
        text: String,
        index: usize,
        source_document: usize,
        document: &Document,
    ) -> Self {
        let mut metadata = document.metadata.clone();
        metadata.insert(CHUNK_INDEX_FIELD.to_string(), Value::from(index));
        Self {
            text,
            metadata,
            index,
            source_document,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Pack an ordered run of sentences into chunk texts.
///
/// # Examples
///
/// ```
/// use docrag::chunking::{pack_sentences, ChunkingConfig};
///
/// let sentences = ["aaaa", "bbbb", "cccc"];
/// let chunks = pack_sentences(&sentences, ChunkingConfig::new(8, 4));
/// assert_eq!(chunks, ["aaaabbbb", "bbbbcccc"]);
/// ```
pub fn pack_sentences<S: AsRef<str>>(
    sentences: &[S],
    config: ChunkingConfig,
) -> Vec<String> {
    let mut packed = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for sentence in sentences {
        let sentence = sentence.as_ref();
        let len = char_len(sentence);

        if current_len + len > config.chunk_size && !current.is_empty() {
            packed.push(current.concat());

            // Chunks of more than one sentence never exceed chunk_size, so
            // the carried overlap is capped at the room the incoming
            // sentence leaves. A plain chunk_overlap budget would break
            // that bound.
            let budget = config
                .chunk_overlap
                .min(config.chunk_size.saturating_sub(len));
            let (keep_from, overlap_len) = overlap_suffix(&current, budget);
            current.drain(..keep_from);
            current.push(sentence);
            current_len = overlap_len + len;
        } else {
            current.push(sentence);
            current_len += len;
        }
    }

    if !current.is_empty() {
        packed.push(current.concat());
    }

    packed
}

/// Find the longest sentence suffix whose total length fits in `budget`.
///
/// Returns the index where the suffix starts and its length.
fn overlap_suffix(sentences: &[&str], budget: usize) -> (usize, usize) {
    let mut start = sentences.len();
    let mut len = 0;

    for sentence in sentences.iter().rev() {
        let sentence_len = char_len(sentence);
        if len + sentence_len > budget {
            break;
        }
        len += sentence_len;
        start -= 1;
    }

    (start, len)
}

/// Chunk every document written in `language`.
///
/// Documents in other languages produce no chunks. Segmentation and packing
/// run in parallel; `chunk_index` is then assigned in document order so the
/// numbering is identical to a sequential run.
pub fn chunk_documents(
    documents: &[Document],
    language: &Language,
    config: ChunkingConfig,
) -> Vec<Chunk> {
    let packed: Vec<(usize, Vec<String>)> = documents
        .par_iter()
        .enumerate()
        .filter(|(_, doc)| doc.language == *language)
        .map(|(doc_idx, doc)| {
            let sentences = split_sentences(&doc.content, &doc.language);
            (doc_idx, pack_sentences(&sentences, config))
        })
        .collect();

    let mut chunks = Vec::new();
    for (doc_idx, texts) in packed {
        for text in texts {
            let index = chunks.len();
            chunks.push(Chunk::new(text, index, doc_idx, &documents[doc_idx]));
        }
    }

    tracing::debug!(
        documents = documents.len(),
        chunks = chunks.len(),
        language = %language,
        "chunked documents"
    );

    chunks
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cfg(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(size, overlap)
    }

    #[test]
    fn everything_fits_in_one_chunk() {
        let chunks = pack_sentences(&["One.", "Two."], cfg(500, 150));
        assert_eq!(chunks, ["One.Two."]);
    }

    #[test]
    fn no_sentences_no_chunks() {
        let empty: [&str; 0] = [];
        assert!(pack_sentences(&empty, cfg(10, 2)).is_empty());
    }

    #[test]
    fn overlap_carries_trailing_sentences() {
        let sentences = ["aaa", "bbb", "ccc", "ddd"];
        // 3 + 3 + 3 > 8 closes "aaabbb"; overlap 3 keeps "bbb".
        let chunks = pack_sentences(&sentences, cfg(8, 3));
        assert_eq!(chunks, ["aaabbb", "bbbccc", "cccddd"]);
    }

    #[test]
    fn overlap_stops_at_first_sentence_over_budget() {
        let sentences = ["aa", "bbbbb", "c", "dddddddd"];
        // "aabbbbbc" closes at 8; suffix scan takes "c" (1), then "bbbbb"
        // would make 6 > 4 and stops, even though "aa" alone would fit.
        let chunks = pack_sentences(&sentences, cfg(12, 4));
        assert_eq!(chunks, ["aabbbbbc", "cdddddddd"]);
    }

    #[test]
    fn zero_overlap_means_disjoint_chunks() {
        let chunks = pack_sentences(&["abc", "def", "ghi"], cfg(6, 0));
        assert_eq!(chunks, ["abcdef", "ghi"]);
    }

    #[test]
    fn oversized_sentence_is_its_own_chunk() {
        let long = "x".repeat(20);
        let sentences = ["ab", long.as_str(), "cd"];
        let chunks = pack_sentences(&sentences, cfg(10, 5));
        assert_eq!(chunks, vec!["ab".to_string(), long.clone(), "cd".into()]);
    }

    #[test]
    fn seed_overlap_shrinks_to_fit_incoming_sentence() {
        // Keeping "aaaa" as overlap would give an 11 char chunk.
        let chunks = pack_sentences(&["aaaa", "bbbbbbb"], cfg(10, 5));
        assert_eq!(chunks, ["aaaa", "bbbbbbb"]);
    }

    #[test]
    fn overlap_never_pushes_chunk_over_size() {
        let lens = [100, 300, 150, 400];
        let sentences: Vec<String> = lens.iter().map(|&n| "a".repeat(n)).collect();
        let chunks = pack_sentences(&sentences, cfg(500, 150));
        let sizes: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        // A 150 char seed plus the 400 char sentence would make 550.
        assert_eq!(sizes, [400, 150, 400]);
    }

    #[test]
    fn lengths_count_chars_not_bytes() {
        // Each sentence is 3 chars but 9 bytes.
        let chunks = pack_sentences(&["一二。", "三四。"], cfg(6, 0));
        assert_eq!(chunks, ["一二。三四。"]);
    }

    #[test]
    fn maximal_overlap_is_tolerated() {
        let chunks = pack_sentences(&["ab", "cd", "ef"], cfg(4, 100));
        assert_eq!(chunks, ["abcd", "cdef"]);
    }

    #[test]
    fn one_chunk_per_short_document_with_global_indices() {
        let docs = vec![
            Document::new("The cat sat. The dog ran.", "en")
                .with_metadata("name", "first"),
            Document::new("Rust is fast. It is safe.", "en")
                .with_metadata("name", "second"),
        ];
        let chunks =
            chunk_documents(&docs, &Language::from("en"), cfg(500, 150));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[0].text, "The cat sat.The dog ran.");
        assert_eq!(chunks[0].metadata.get(CHUNK_INDEX_FIELD), Some(&json!(0)));
        assert_eq!(chunks[1].metadata.get(CHUNK_INDEX_FIELD), Some(&json!(1)));
        assert_eq!(chunks[1].metadata.get("name"), Some(&json!("second")));
        assert_eq!(chunks[1].source_document, 1);
        assert!(!chunks[0].metadata.contains_key("content"));
    }

    #[test]
    fn other_languages_are_skipped() {
        let docs = vec![
            Document::new("你好。", "zh"),
            Document::new("Hello.", "en"),
            Document::new("再见。", "zh"),
        ];
        let chunks =
            chunk_documents(&docs, &Language::from("zh"), cfg(500, 150));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_document, 0);
        assert_eq!(chunks[1].source_document, 2);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn indices_continue_across_documents() {
        let long = "Sentence number one. ".repeat(40);
        let docs = vec![
            Document::new(long.clone(), "en"),
            Document::new(long, "en"),
        ];
        let chunks =
            chunk_documents(&docs, &Language::from("en"), cfg(100, 30));
        assert!(chunks.len() > 2);
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
        let first_of_second = chunks
            .iter()
            .position(|c| c.source_document == 1)
            .unwrap();
        assert!(first_of_second > 0);
    }

    #[test]
    fn serializes_like_page_records() {
        let docs = vec![Document::new("Hi.", "en")];
        let chunks = chunk_documents(&docs, &Language::from("en"), cfg(10, 0));
        let value = serde_json::to_value(&chunks[0]).unwrap();
        assert_eq!(
            value,
            json!({
                "page_content": "Hi.",
                "metadata": {"language": "en", "chunk_index": 0}
            })
        );
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(cfg(0, 0).validate().is_err());
        assert!(cfg(10, 20).validate().is_ok());
    }
}
