use crate::{
    chunking::Chunk,
    language::{Language, Locale},
    llm::{TextCompletion, complete_or_describe},
    templates::{CONTEXT_PLACEHOLDER, QUERY_PLACEHOLDER},
};

/// Join chunk texts into the context block of a prompt.
pub fn context_block(chunks: &[&Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill a template's placeholders.
///
/// A template with neither placeholder gets the question and context
/// appended after it.
pub fn render_prompt(
    template: &str,
    query: &str,
    chunks: &[&Chunk],
    language: &Language,
) -> String {
    let context = context_block(chunks);
    let has_query = template.contains(QUERY_PLACEHOLDER);
    let has_context = template.contains(CONTEXT_PLACEHOLDER);

    if !has_query && !has_context {
        let tail = match language.locale() {
            Locale::English => {
                format!("\n\nQuestion: {query}\nContext: {context}\nAnswer:\n")
            }
            Locale::Chinese => {
                format!("\n\n问题：{query}\n上下文：{context}\n回答：\n")
            }
        };
        return format!("{}{tail}", template.trim_end());
    }

    fill_placeholders(template, query, &context)
}

/// Substitute both placeholders in a single pass over `template`.
///
/// Inserted text is never scanned again, so placeholder text inside the
/// query or a retrieved chunk is kept as is.
fn fill_placeholders(template: &str, query: &str, context: &str) -> String {
    let mut out =
        String::with_capacity(template.len() + query.len() + context.len());
    let mut rest = template;

    loop {
        let next = [(QUERY_PLACEHOLDER, query), (CONTEXT_PLACEHOLDER, context)]
            .into_iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, placeholder, value))
            })
            .min_by_key(|(at, _, _)| *at);

        let Some((at, placeholder, value)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + placeholder.len()..];
    }
}

/// Generate an answer grounded in `chunks`.
///
/// Never fails: a model error comes back as an error description.
pub fn generate_answer(
    llm: &dyn TextCompletion,
    query: &str,
    chunks: &[&Chunk],
    template: &str,
    language: &Language,
) -> String {
    let prompt = render_prompt(template, query, chunks, language);
    complete_or_describe(llm, &prompt).trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        chunking::{ChunkingConfig, chunk_documents},
        document::Document,
        error::Result,
        templates::default_template,
    };

    struct Capture(RefCell<String>);

    impl TextCompletion for Capture {
        fn generate(&self, prompt: &str) -> Result<String> {
            *self.0.borrow_mut() = prompt.to_string();
            Ok("  Paris.  ".to_string())
        }
    }

    fn chunks() -> Vec<Chunk> {
        let docs = vec![
            Document::new("France is a country. Its capital is Paris.", "en"),
            Document::new("The Eiffel Tower is in Paris.", "en"),
        ];
        chunk_documents(&docs, &Language::from("en"), ChunkingConfig::default())
    }

    #[test]
    fn renders_placeholders() {
        let chunks = chunks();
        let refs: Vec<&Chunk> = chunks.iter().collect();
        let prompt = render_prompt(
            "Q={query}\nC={context}",
            "Capital?",
            &refs,
            &"en".into(),
        );
        assert_eq!(
            prompt,
            "Q=Capital?\nC=France is a country.Its capital is Paris.\n\n\
             The Eiffel Tower is in Paris."
        );
    }

    #[test]
    fn appends_block_when_no_placeholders() {
        let prompt = render_prompt("Be brief.\n", "Why?", &[], &"en".into());
        assert_eq!(prompt, "Be brief.\n\nQuestion: Why?\nContext: \nAnswer:\n");
    }

    #[test]
    fn query_text_is_not_expanded_as_placeholder() {
        let prompt =
            render_prompt("{query} | {context}", "{context}?", &[], &"en".into());
        assert_eq!(prompt, "{context}? | ");
    }

    #[test]
    fn chunk_text_is_not_expanded_as_placeholder() {
        let docs = vec![Document::new("Use {query} here.", "en")];
        let chunks =
            chunk_documents(&docs, &"en".into(), ChunkingConfig::default());
        let refs: Vec<&Chunk> = chunks.iter().collect();

        let prompt =
            render_prompt("Q={query} C={context}", "SECRET", &refs, &"en".into());
        assert_eq!(prompt, "Q=SECRET C=Use {query} here.");
    }

    #[test]
    fn repeated_placeholders_are_all_filled() {
        let prompt = render_prompt("{query}/{query}/{context}", "q", &[], &"en".into());
        assert_eq!(prompt, "q/q/");
    }

    #[test]
    fn generate_answer_trims_reply() {
        let chunks = chunks();
        let refs: Vec<&Chunk> = chunks.iter().collect();
        let llm = Capture(RefCell::new(String::new()));
        let en = Language::from("en");

        let answer =
            generate_answer(&llm, "Capital?", &refs, default_template(&en), &en);
        assert_eq!(answer, "Paris.");

        let prompt = llm.0.borrow();
        assert!(prompt.contains("Question: Capital?"));
        assert!(prompt.contains("The Eiffel Tower is in Paris."));
    }
}
