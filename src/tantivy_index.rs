use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use serde::Deserialize;

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    Searcher,
    TantivyDocument,
    Term,
    collector::TopDocs,
    doc,
    query::{AllQuery, BooleanQuery, BoostQuery, Occur, Query, TermQuery},
    schema::*,
    tokenizer::{
        LowerCaser,
        NgramTokenizer,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
        TokenStream,
    },
};

use crate::{error::Result, language::Language};

/// Memory budget handed to index writers.
pub const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// Field names used in the schema.
pub mod fields {
    pub const CHUNK_ID: &str = "chunk_id";
    pub const BODY: &str = "body";
}

/// Analyzer names registered on every index.
pub mod analyzers {
    /// English: lowercase + Porter stemming.
    pub const EN_STEM: &str = "en_stem";
    /// CJK: overlapping character unigrams and bigrams.
    pub const CJK_NGRAM: &str = "cjk_ngram";
    /// Anything else: lowercase word tokens.
    pub const PLAIN: &str = "plain";
}

/// RM3 pseudo-relevance feedback.
///
/// The first-pass query is expanded with the strongest terms of its top
/// hits, then run again with the original terms weighted by
/// `original_query_weight` and the expansion terms by the rest.
///
/// ```
/// use docrag::tantivy_index::FeedbackConfig;
///
/// let fb = FeedbackConfig::default();
/// assert!(fb.enabled);
/// assert_eq!((fb.fb_terms, fb.fb_docs), (10, 10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackConfig {
    pub enabled: bool,
    /// Expansion terms kept from the feedback documents.
    pub fb_terms: usize,
    /// Top first-pass hits used as feedback documents.
    pub fb_docs: usize,
    /// Share of the final query weight kept by the original terms.
    pub original_query_weight: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fb_terms: 10,
            fb_docs: 10,
            original_query_weight: 0.5,
        }
    }
}

impl FeedbackConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn is_active(&self) -> bool {
        self.enabled && self.fb_terms > 0 && self.fb_docs > 0
    }
}

/// A BM25 full-text index over chunk texts.
///
/// Each indexed document is a chunk, identified by its position in the
/// chunk corpus. Text is analyzed with the analyzer for the index language.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
    feedback: FeedbackConfig,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub chunk_id: Field,
    pub body: Field,
}

/// A scored hit from the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub score: f32,
    pub chunk_id: u64,
}

fn analyzer_for(language: &Language) -> &'static str {
    if language.is_cjk() {
        analyzers::CJK_NGRAM
    } else if language.is_english() {
        analyzers::EN_STEM
    } else {
        analyzers::PLAIN
    }
}

fn build_schema(language: &Language) -> Schema {
    let mut builder = Schema::builder();

    builder.add_u64_field(fields::CHUNK_ID, STORED | FAST);

    let body_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(analyzer_for(language))
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    builder.add_text_field(fields::BODY, body_opts);

    builder.build()
}

fn resolve_fields(schema: &Schema) -> Result<SchemaFields> {
    Ok(SchemaFields {
        chunk_id: schema.get_field(fields::CHUNK_ID)?,
        body: schema.get_field(fields::BODY)?,
    })
}

fn register_tokenizers(index: &Index) -> Result<()> {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register(analyzers::EN_STEM, en_stem);

    let cjk = TextAnalyzer::builder(NgramTokenizer::new(1, 2, false)?)
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(analyzers::CJK_NGRAM, cjk);

    let plain = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(analyzers::PLAIN, plain);

    Ok(())
}

impl SearchIndex {
    /// Open or create an index at the given directory.
    ///
    /// An existing index keeps the analyzer it was created with.
    pub fn open(dir: &Path, language: &Language) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(language),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index)
    }

    /// Create an in-memory index.
    pub fn open_in_ram(language: &Language) -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema(language)))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizers(&index)?;
        let fields = resolve_fields(&index.schema())?;
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
            feedback: FeedbackConfig::disabled(),
        })
    }

    /// Use RM3 feedback for every search on this index.
    pub fn with_feedback(mut self, feedback: FeedbackConfig) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    /// Create a writer with the given memory budget (in bytes).
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    /// Add a chunk to the index via the given writer.
    pub fn add_chunk(
        &self,
        writer: &IndexWriter,
        chunk_id: u64,
        text: &str,
    ) -> Result<()> {
        let f = self.fields;
        writer.add_document(doc!(
            f.chunk_id => chunk_id,
            f.body => text,
        ))?;
        Ok(())
    }

    /// Remove every chunk added before this call.
    pub fn clear(&self, writer: &IndexWriter) -> Result<()> {
        writer.delete_query(Box::new(AllQuery))?;
        Ok(())
    }

    /// Number of committed chunks.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// Search the index with BM25 scoring.
    ///
    /// The query is run through the body analyzer and every distinct term
    /// becomes an optional clause, so a chunk matches when it shares any
    /// term with the query. With feedback enabled the query is expanded
    /// before the final pass. Returns at most `limit` hits, best first.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let f = self.fields;
        let tokens = self.query_tokens(query_str)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let query: Box<dyn Query> = if self.feedback.is_active() {
            self.feedback_query(&searcher, &tokens)?
        } else {
            Box::new(self.terms_query(&tokens))
        };
        let top_docs =
            searcher.search(query.as_ref(), &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            if let Some(chunk_id) =
                doc.get_first(f.chunk_id).and_then(|v| v.as_u64())
            {
                results.push(SearchResult { score, chunk_id });
            }
        }

        Ok(results)
    }

    /// Every token the body analyzer produces for `text`, in order.
    fn analyze(&self, text: &str) -> Result<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.body)?;
        let mut stream = analyzer.token_stream(text);

        let mut tokens = Vec::new();
        while stream.advance() {
            let token = &stream.token().text;
            if !token.trim().is_empty() {
                tokens.push(token.clone());
            }
        }
        Ok(tokens)
    }

    /// Distinct query tokens, first occurrence order.
    fn query_tokens(&self, query_str: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        Ok(self
            .analyze(query_str)?
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect())
    }

    fn terms_query(&self, tokens: &[String]) -> BooleanQuery {
        BooleanQuery::new_multiterms_query(
            tokens
                .iter()
                .map(|t| Term::from_field_text(self.fields.body, t))
                .collect(),
        )
    }

    /// Build the RM3 expanded query for `tokens`.
    ///
    /// P(w|R) sums, over the feedback documents, the document's share of
    /// the first-pass score times the term's relative frequency in it. The
    /// strongest `fb_terms` are renormalized and mixed with the uniform
    /// original query model.
    fn feedback_query(
        &self,
        searcher: &Searcher,
        tokens: &[String],
    ) -> Result<Box<dyn Query>> {
        let fb = self.feedback;
        let first = self.terms_query(tokens);
        let top = searcher.search(&first, &TopDocs::with_limit(fb.fb_docs))?;
        let total: f32 = top.iter().map(|(score, _)| *score).sum();

        let mut relevance: BTreeMap<String, f32> = BTreeMap::new();
        if total > 0.0 {
            for (score, address) in &top {
                let doc: TantivyDocument = searcher.doc(*address)?;
                let Some(text) =
                    doc.get_first(self.fields.body).and_then(|v| v.as_str())
                else {
                    continue;
                };
                let doc_tokens = self.analyze(text)?;
                if doc_tokens.is_empty() {
                    continue;
                }
                let weight = score / total / doc_tokens.len() as f32;
                for token in doc_tokens {
                    *relevance.entry(token).or_default() += weight;
                }
            }
        }

        let mut expansion: Vec<(String, f32)> = relevance.into_iter().collect();
        expansion
            .sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        expansion.truncate(fb.fb_terms);
        let norm: f32 = expansion.iter().map(|(_, w)| w).sum();

        let alpha = fb.original_query_weight.clamp(0.0, 1.0);
        let mut weights: BTreeMap<String, f32> = BTreeMap::new();
        let query_share = alpha / tokens.len() as f32;
        for token in tokens {
            *weights.entry(token.clone()).or_default() += query_share;
        }
        if norm > 0.0 {
            for (token, w) in expansion {
                *weights.entry(token).or_default() += (1.0 - alpha) * w / norm;
            }
        }
        tracing::trace!(?weights, "rm3 expanded query");

        let clauses: Vec<(Occur, Box<dyn Query>)> = weights
            .into_iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|(token, w)| {
                let term = TermQuery::new(
                    Term::from_field_text(self.fields.body, &token),
                    IndexRecordOption::WithFreqs,
                );
                let boosted: Box<dyn Query> =
                    Box::new(BoostQuery::new(Box::new(term), w));
                (Occur::Should, boosted)
            })
            .collect();
        Ok(Box::new(BooleanQuery::new(clauses)))
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}
