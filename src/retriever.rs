//! First-stage retrieval: lexical search mapped back onto the chunk corpus.

use crate::{chunking::Chunk, error::Result, tantivy_index::SearchIndex};

/// One hit from a ranked text search backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    /// Position of the hit in the corpus the backend was built from.
    pub id: u64,
    pub score: f32,
}

/// A ranked text search capability: given a query and a count, return at
/// most that many hits, best first.
pub trait RankedSearch {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredHit>>;
}

impl RankedSearch for SearchIndex {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredHit>> {
        Ok(SearchIndex::search(self, query, limit)?
            .into_iter()
            .map(|r| ScoredHit {
                id: r.chunk_id,
                score: r.score,
            })
            .collect())
    }
}

/// A chunk returned by retrieval with the backend's relevance score.
///
/// Scores are only comparable within one retrieval call.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'c> {
    pub chunk: &'c Chunk,
    pub score: f32,
}

/// Maps search hits back onto the chunks the backend indexed.
pub struct Retriever<'c> {
    chunks: &'c [Chunk],
    source: &'c dyn RankedSearch,
}

impl<'c> Retriever<'c> {
    pub fn new(chunks: &'c [Chunk], source: &'c dyn RankedSearch) -> Self {
        Self { chunks, source }
    }

    pub fn chunks(&self) -> &'c [Chunk] {
        self.chunks
    }

    /// Retrieve up to `top_n` candidates for `query`, best first.
    ///
    /// Hits pointing outside the corpus are dropped. A failing backend
    /// yields no candidates rather than an error.
    pub fn retrieve(&self, query: &str, top_n: usize) -> Vec<Candidate<'c>> {
        let hits = match self.source.search(query, top_n) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "lexical search failed, no candidates");
                return Vec::new();
            }
        };

        let mut candidates: Vec<Candidate<'c>> = hits
            .into_iter()
            .take(top_n)
            .filter_map(|hit| {
                let chunk = usize::try_from(hit.id)
                    .ok()
                    .and_then(|id| self.chunks.get(id));
                if chunk.is_none() {
                    tracing::debug!(id = hit.id, "dropping hit outside corpus");
                }
                chunk.map(|chunk| Candidate {
                    chunk,
                    score: hit.score,
                })
            })
            .collect();

        // Stable, so equal scores keep the backend's order.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates
    }
}
