//! Keyword expansion of queries before lexical search.

use crate::{
    language::{Language, Locale},
    llm::{TextCompletion, complete_or_describe},
};

fn expansion_prompt(query: &str, locale: Locale) -> String {
    match locale {
        Locale::Chinese => format!(
            "你是一个搜索助手。请为下面的问题生成五到十个有助于检索相关文档的关键词或同义词，\
             只输出关键词，用空格分隔，不要解释。\n\n问题：{query}\n关键词："
        ),
        Locale::English => format!(
            "You are a search assistant. Generate five to ten keywords or \
             synonyms that would help a search engine find documents \
             answering the question below. Output only the keywords, \
             separated by spaces, with no explanation.\n\n\
             Question: {query}\nKeywords:"
        ),
    }
}

/// Ask the model for extra search keywords.
///
/// The reply is untrusted free text. A failed call yields an error
/// description, which callers still use as text.
pub fn expand(llm: &dyn TextCompletion, query: &str, language: &Language) -> String {
    let prompt = expansion_prompt(query, language.locale());
    complete_or_describe(llm, &prompt).trim().to_string()
}

/// The query sent to retrieval: the original query followed by its
/// expansion, joined by a space.
pub fn expanded_query(
    llm: &dyn TextCompletion,
    query: &str,
    language: &Language,
) -> String {
    let expansion = expand(llm, query, language);
    tracing::debug!(%query, %expansion, "expanded query");
    if expansion.is_empty() {
        query.to_string()
    } else {
        format!("{query} {expansion}")
    }
}
