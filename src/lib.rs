//! docrag - retrieval-augmented question answering over a local document set.
//!
//! Documents are split into sentences, packed into overlapping chunks and
//! indexed with [Tantivy](https://github.com/quickwit-oss/tantivy) BM25.
//! For each question the best chunks are retrieved, reranked by a local
//! model served by [Ollama](https://ollama.com), and used as context for
//! the answer. Every model-facing step falls back to a usable value when
//! the model misbehaves, so one bad reply never stops a batch.
//!
//! # Quick start
//!
//! ```no_run
//! use docrag::{Language, Settings};
//! use docrag::chunking::chunk_documents;
//! use docrag::document::Document;
//! use docrag::ingestion;
//! use docrag::llm::OllamaClient;
//! use docrag::pipeline::Pipeline;
//! use docrag::retriever::Retriever;
//! use docrag::templates::TemplatePool;
//!
//! let settings = Settings::default();
//! let language = Language::new("en");
//! let docs = vec![Document::new("Paris is the capital of France.", "en")];
//!
//! let chunks = chunk_documents(&docs, &language, settings.chunking);
//! let index = ingestion::build_in_ram(&chunks, &language).unwrap();
//! let llm = OllamaClient::new(&settings.ollama).unwrap();
//! let templates = TemplatePool::new();
//!
//! let pipeline = Pipeline::new(
//!     Retriever::new(&chunks, &index),
//!     &llm,
//!     &templates,
//!     language,
//!     settings.retrieval,
//! );
//! let answer = pipeline.answer("What is the capital of France?");
//! println!("{}", answer.content);
//! ```

pub mod chunking;
pub mod config;
pub mod data_dir;
pub mod document;
pub mod error;
pub mod expansion;
pub mod generator;
pub mod ingestion;
pub mod language;
pub mod llm;
pub mod pipeline;
pub mod records;
pub mod reranker;
pub mod retriever;
pub mod segment;
pub mod tantivy_index;
pub mod templates;
pub mod text_util;

pub use chunking::{Chunk, ChunkingConfig};
pub use config::Settings;
pub use data_dir::DataDir;
pub use document::Document;
pub use error::{Error, Result};
pub use language::Language;
pub use tantivy_index::SearchIndex;
