//! Prompt templates for answer generation.
//!
//! A template is plain text with `{query}` and `{context}` placeholders.
//! Templates are loaded from `*.txt` files in a directory and the model
//! picks one per query by file name.

use std::{collections::BTreeMap, path::Path};

use crate::{
    chunking::Chunk,
    error::Result,
    language::{Language, Locale},
    llm::{TextCompletion, complete_or_describe},
    text_util::preview,
};

pub const QUERY_PLACEHOLDER: &str = "{query}";
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Characters of each template shown to the model when choosing.
const TEMPLATE_PREVIEW_CHARS: usize = 300;

/// Characters of retrieved context shown to the model when choosing.
const CONTEXT_PREVIEW_CHARS: usize = 1000;

const DEFAULT_ENGLISH: &str = "You are an assistant for question-answering \
tasks. Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. Use three \
sentences maximum and keep the answer concise.\n\n\
Question: {query}\nContext: {context}\nAnswer:\n";

const DEFAULT_CHINESE: &str = "你是一个问答助手。请根据以下检索到的上下文回答问题。\
如果你不知道答案，就直接说不知道。最多使用三句话，保持回答简洁。\n\n\
问题：{query}\n上下文：{context}\n回答：\n";

/// The built-in template for a language.
pub fn default_template(language: &Language) -> &'static str {
    match language.locale() {
        Locale::English => DEFAULT_ENGLISH,
        Locale::Chinese => DEFAULT_CHINESE,
    }
}

/// Named templates, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct TemplatePool {
    templates: BTreeMap<String, String>,
}

impl TemplatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.txt` file in `dir`, keyed by file name.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut pool = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_txt = path.extension().is_some_and(|ext| ext == "txt");
            if !is_txt || !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                let text = std::fs::read_to_string(&path)?;
                pool.insert(name, text);
            }
        }
        tracing::info!(
            dir = %dir.display(),
            templates = pool.len(),
            "loaded prompt templates"
        );
        Ok(pool)
    }

    pub fn insert(&mut self, name: &str, text: impl Into<String>) {
        self.templates.insert(name.to_string(), text.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Choose the template for a query.
    ///
    /// An empty pool gives the built-in template and a single template is
    /// used without asking. Otherwise the model names one; an answer that
    /// matches no template falls back to the built-in one.
    pub fn select<'a>(
        &'a self,
        llm: &dyn TextCompletion,
        query: &str,
        chunks: &[&Chunk],
        language: &Language,
    ) -> &'a str {
        if self.templates.is_empty() {
            return default_template(language);
        }
        if self.templates.len() == 1
            && let Some(only) = self.templates.values().next()
        {
            return only;
        }

        let reply = complete_or_describe(llm, &self.selection_prompt(query, chunks));
        let name = clean_template_name(&reply);
        match self.get(name) {
            Some(template) => {
                tracing::debug!(template = name, "selected prompt template");
                template
            }
            None => {
                tracing::warn!(
                    reply = %preview(&reply, TEMPLATE_PREVIEW_CHARS),
                    "model named no known template, using default"
                );
                default_template(language)
            }
        }
    }

    fn selection_prompt(&self, query: &str, chunks: &[&Chunk]) -> String {
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut options = String::new();
        for (name, text) in &self.templates {
            options.push_str(&format!(
                "Template `{name}`:\n{}\n\n",
                preview(text, TEMPLATE_PREVIEW_CHARS)
            ));
        }

        format!(
            "Choose the prompt template best suited to answer the question \
             with the given context.\n\nQuestion: {query}\n\nContext:\n{}\n\n\
             {options}Respond with only the template file name, for example \
             `{}`.",
            preview(&context, CONTEXT_PREVIEW_CHARS),
            self.templates.keys().next().map_or("", String::as_str),
        )
    }
}

/// Strip whitespace, quotes and backticks from a model's template answer.
fn clean_template_name(reply: &str) -> &str {
    reply
        .trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'')
        .trim()
}
