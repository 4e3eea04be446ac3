//! Settings file and its resolution.
//!
//! Settings come from, in increasing priority: built-in defaults, a TOML
//! file, `DOCRAG_OLLAMA_*` environment variables, and command-line flags.

use std::path::Path;

use serde::Deserialize;

use crate::{
    chunking::ChunkingConfig,
    data_dir::DataDir,
    error::{Error, Result},
    tantivy_index::FeedbackConfig,
};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "granite4:3b";
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_TOP_K: usize = 5;

pub const HOST_ENV_VAR: &str = "DOCRAG_OLLAMA_HOST";
pub const MODEL_ENV_VAR: &str = "DOCRAG_OLLAMA_MODEL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub ollama: OllamaConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub temperature: f32,
    /// Request timeout; no timeout when absent.
    pub timeout_secs: Option<u64>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            temperature: 0.0,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Candidates fetched from the lexical index per query.
    pub top_n: usize,
    /// Chunks kept after reranking.
    pub top_k: usize,
    /// Ask the model for extra keywords before searching.
    pub expand_query: bool,
    /// Rerank candidates with the model; plain truncation otherwise.
    pub rerank: bool,
    /// RM3 pseudo-relevance feedback on the lexical search.
    pub feedback: FeedbackConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            top_k: DEFAULT_TOP_K,
            expand_query: false,
            rerank: true,
            feedback: FeedbackConfig::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from a file that must exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Load settings from an explicit file, or the first config file found
    /// in the data directory, or defaults; then apply the environment.
    pub fn load(explicit: Option<&Path>, data_dir: &DataDir) -> Result<Self> {
        let mut settings = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Some(path) = data_dir
            .config_candidates()
            .into_iter()
            .find(|p| p.is_file())
        {
            tracing::debug!(path = %path.display(), "using config file");
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply `DOCRAG_OLLAMA_HOST` / `DOCRAG_OLLAMA_MODEL` overrides.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup(HOST_ENV_VAR) {
            self.ollama.host = host;
        }
        if let Some(model) = lookup(MODEL_ENV_VAR) {
            self.ollama.model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.ollama.host.trim().is_empty() {
            return Err(Error::Config("ollama.host must not be empty".into()));
        }
        if self.ollama.model.trim().is_empty() {
            return Err(Error::Config("ollama.model must not be empty".into()));
        }
        let weight = self.retrieval.feedback.original_query_weight;
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::Config(format!(
                "retrieval.feedback.original_query_weight must be in [0, 1], got {weight}"
            )));
        }
        if self.retrieval.top_k > self.retrieval.top_n {
            tracing::warn!(
                top_n = self.retrieval.top_n,
                top_k = self.retrieval.top_k,
                "top_k exceeds top_n, at most top_n chunks will be used"
            );
        }
        Ok(())
    }
}
