use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    chunking::Chunk,
    error::Result,
    language::Language,
    tantivy_index::{SearchIndex, WRITER_MEMORY_BUDGET},
};

/// File next to a persisted index describing the corpus it was built from.
pub const MANIFEST_FILE: &str = "corpus.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Manifest {
    language: String,
    chunks: usize,
    fingerprint: String,
}

impl Manifest {
    fn for_corpus(chunks: &[Chunk], language: &Language) -> Self {
        Self {
            language: language.as_str().to_string(),
            chunks: chunks.len(),
            fingerprint: corpus_fingerprint(chunks),
        }
    }

    fn read(dir: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn write(&self, dir: &Path) -> Result<()> {
        std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec(self)?)?;
        Ok(())
    }
}

/// SHA-256 over the chunk texts in order.
///
/// Each text is length-prefixed, so moving a boundary between two chunks
/// changes the fingerprint.
pub fn corpus_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update((chunk.text.len() as u64).to_le_bytes());
        hasher.update(chunk.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Index every chunk under its position in `chunks`.
///
/// Any previous content of the index is dropped first. Commits once at the
/// end and returns the number of indexed chunks.
pub fn index_chunks(index: &SearchIndex, chunks: &[Chunk]) -> Result<usize> {
    let mut writer = index.writer(WRITER_MEMORY_BUDGET)?;
    index.clear(&writer)?;

    for (position, chunk) in chunks.iter().enumerate() {
        index.add_chunk(&writer, position as u64, &chunk.text)?;
    }

    writer.commit()?;
    Ok(chunks.len())
}

/// Build an in-memory index over `chunks`.
pub fn build_in_ram(chunks: &[Chunk], language: &Language) -> Result<SearchIndex> {
    let index = SearchIndex::open_in_ram(language)?;
    let count = index_chunks(&index, chunks)?;
    tracing::info!(chunks = count, "built in-memory index");
    Ok(index)
}

/// Open the on-disk index in `dir`, rebuilding it unless its manifest
/// matches the corpus.
///
/// The manifest records the language, chunk count and a fingerprint of the
/// chunk texts. A missing or unreadable manifest forces a rebuild.
pub fn open_or_build(
    dir: &Path,
    chunks: &[Chunk],
    language: &Language,
) -> Result<SearchIndex> {
    let index = SearchIndex::open(dir, language)?;
    let expected = Manifest::for_corpus(chunks, language);
    let existing = index.num_docs()?;

    if Manifest::read(dir).as_ref() == Some(&expected)
        && existing == chunks.len() as u64
    {
        tracing::info!(
            dir = %dir.display(),
            chunks = existing,
            "loading existing index"
        );
        return Ok(index);
    }

    tracing::info!(dir = %dir.display(), "building index");
    let count = index_chunks(&index, chunks)?;
    expected.write(dir)?;
    tracing::info!(chunks = count, "index built");
    Ok(index)
}
