//! The per-query answering loop.
//!
//! For each query, in input order:
//!
//! 1. optional keyword expansion of the query
//! 2. lexical retrieval of the top-N candidate chunks
//! 3. model reranking down to the top-K chunks (or plain truncation)
//! 4. prompt template selection
//! 5. answer generation
//!
//! Every step degrades to a fallback on failure, so one bad query never
//! stops the batch.

use kdam::{BarExt, tqdm};
use serde_json::Value;

use crate::{
    chunking::Chunk,
    config::RetrievalConfig,
    error::Result,
    expansion,
    generator,
    language::Language,
    llm::TextCompletion,
    records,
    reranker,
    retriever::Retriever,
    templates::TemplatePool,
};

/// The result of answering one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub content: String,
    /// Text of every chunk the answer was grounded in, in rank order.
    pub references: Vec<String>,
}

pub struct Pipeline<'a> {
    retriever: Retriever<'a>,
    llm: &'a dyn TextCompletion,
    templates: &'a TemplatePool,
    language: Language,
    options: RetrievalConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        retriever: Retriever<'a>,
        llm: &'a dyn TextCompletion,
        templates: &'a TemplatePool,
        language: Language,
        options: RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            templates,
            language,
            options,
        }
    }

    /// Select the context chunks for a query.
    pub fn context_for(&self, query: &str) -> Vec<&'a Chunk> {
        let search_query = if self.options.expand_query {
            expansion::expanded_query(self.llm, query, &self.language)
        } else {
            query.to_string()
        };

        let candidates =
            self.retriever.retrieve(&search_query, self.options.top_n);
        tracing::debug!(candidates = candidates.len(), "retrieved candidates");

        if self.options.rerank {
            reranker::rerank(
                self.llm,
                query,
                &candidates,
                &self.language,
                self.options.top_k,
            )
        } else {
            reranker::truncate(&candidates, self.options.top_k)
        }
    }

    /// Answer a single query.
    pub fn answer(&self, query: &str) -> Answer {
        let chunks = self.context_for(query);
        let template =
            self.templates.select(self.llm, query, &chunks, &self.language);
        let content = generator::generate_answer(
            self.llm,
            query,
            &chunks,
            template,
            &self.language,
        );

        Answer {
            content,
            references: chunks.iter().map(|c| c.text.clone()).collect(),
        }
    }

    /// Answer every query record in place, strictly in order.
    ///
    /// Records without `query.content` are left untouched.
    pub fn answer_records(
        &self,
        queries: &mut [Value],
        show_progress: bool,
    ) -> Result<usize> {
        let mut bar = show_progress
            .then(|| tqdm!(total = queries.len(), desc = "Processing queries"));

        let mut answered = 0;
        for (idx, record) in queries.iter_mut().enumerate() {
            match records::query_text(record).map(str::to_string) {
                Some(query) => {
                    let answer = self.answer(&query);
                    records::set_prediction(
                        record,
                        &answer.content,
                        answer.references,
                    );
                    answered += 1;
                }
                None => {
                    tracing::warn!(
                        record = idx,
                        "query record has no query.content, skipped"
                    );
                }
            }

            if let Some(bar) = bar.as_mut() {
                bar.update(1)?;
            }
        }

        if show_progress {
            eprintln!();
        }
        Ok(answered)
    }
}
