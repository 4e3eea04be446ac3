use std::collections::HashSet;

use crate::{
    chunking::Chunk,
    language::{Language, Locale},
    llm::{TextCompletion, complete_or_describe},
    retriever::Candidate,
    text_util::{DEFAULT_PREVIEW_CHARS, preview},
};

/// Rerank candidates with the model and keep the best `top_k`.
///
/// The model is shown a numbered listing of the candidates and asked for a
/// JSON list of indices, most relevant first. Valid indices are taken in
/// the model's order without repeats, then the remaining slots are filled
/// with unused candidates in their retrieval order. If the reply cannot be
/// parsed at all, the first `top_k` candidates are returned.
///
/// Makes no model call when there are no candidates.
pub fn rerank<'c>(
    llm: &dyn TextCompletion,
    query: &str,
    candidates: &[Candidate<'c>],
    language: &Language,
    top_k: usize,
) -> Vec<&'c Chunk> {
    if candidates.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let prompt = rerank_prompt(query, candidates, language.locale(), top_k);
    let reply = complete_or_describe(llm, &prompt);

    let ranking = parse_ranking(&reply).unwrap_or_else(|| {
        tracing::warn!(
            reply = %preview(&reply, DEFAULT_PREVIEW_CHARS),
            "unparsable ranking response, keeping retrieval order"
        );
        Vec::new()
    });

    let selected = select_indices(&ranking, candidates, top_k);
    tracing::debug!(?ranking, ?selected, "reranked candidates");
    selected.into_iter().map(|i| candidates[i].chunk).collect()
}

/// Keep the first `top_k` candidates in retrieval order.
pub fn truncate<'c>(candidates: &[Candidate<'c>], top_k: usize) -> Vec<&'c Chunk> {
    select_indices(&[], candidates, top_k)
        .into_iter()
        .map(|i| candidates[i].chunk)
        .collect()
}

/// Parse the index list out of a free-form model reply.
///
/// Takes the text from the first `[` to the last `]` inclusive and reads it
/// as a JSON array of integers. Returns `None` when either bracket is
/// missing or the text is not such an array.
pub fn parse_ranking(reply: &str) -> Option<Vec<i64>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

/// Turn a parsed ranking into candidate positions.
///
/// Out-of-range indices are ignored and an index (or chunk) seen before is
/// skipped. Backfills from `candidates` in order, and never returns more
/// than `top_k` positions.
fn select_indices(
    ranking: &[i64],
    candidates: &[Candidate<'_>],
    top_k: usize,
) -> Vec<usize> {
    let mut selected = Vec::with_capacity(top_k.min(candidates.len()));
    let mut used_chunks = HashSet::new();

    let ranked = ranking
        .iter()
        .filter_map(|&i| usize::try_from(i).ok())
        .filter(|&i| i < candidates.len());
    let backfill = 0..candidates.len();

    for i in ranked.chain(backfill) {
        if selected.len() == top_k {
            break;
        }
        let chunk: *const Chunk = candidates[i].chunk;
        if used_chunks.insert(chunk) {
            selected.push(i);
        }
    }

    selected
}

fn rerank_prompt(
    query: &str,
    candidates: &[Candidate<'_>],
    locale: Locale,
    top_k: usize,
) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!("[{i}] {}", preview(&c.chunk.text, DEFAULT_PREVIEW_CHARS))
        })
        .collect::<Vec<_>>()
        .join("\n");

    match locale {
        Locale::Chinese => format!(
            "请根据与问题的相关性对下列文档片段进行排序。\n\n问题：{query}\n\n\
             文档片段：\n{listing}\n\n\
             请选出最相关的{top_k}个片段，按相关性从高到低排列，\
             只输出片段编号组成的JSON列表，例如 [2, 0, 1]，不要输出其他内容。"
        ),
        Locale::English => format!(
            "Rank the following passages by how relevant they are to the \
             question.\n\nQuestion: {query}\n\nPassages:\n{listing}\n\n\
             Select the {top_k} most relevant passages, most relevant first. \
             Respond with only a JSON list of passage numbers, for example \
             [2, 0, 1], and nothing else."
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{
        chunking::{ChunkingConfig, chunk_documents},
        document::Document,
        error::Result,
    };

    struct Scripted {
        reply: &'static str,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                calls: Cell::new(0),
            }
        }
    }

    impl TextCompletion for Scripted {
        fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.reply.to_string())
        }
    }

    fn corpus(n: usize) -> Vec<Chunk> {
        let docs: Vec<Document> = (0..n)
            .map(|i| Document::new(format!("Passage {i}."), "en"))
            .collect();
        chunk_documents(&docs, &Language::from("en"), ChunkingConfig::default())
    }

    fn candidates(chunks: &[Chunk]) -> Vec<Candidate<'_>> {
        chunks
            .iter()
            .map(|chunk| Candidate { chunk, score: 1.0 })
            .collect()
    }

    fn run(reply: &'static str, n: usize, top_k: usize) -> Vec<usize> {
        let chunks = corpus(n);
        let cands = candidates(&chunks);
        let llm = Scripted::new(reply);
        rerank(&llm, "q", &cands, &Language::from("en"), top_k)
            .iter()
            .map(|c| c.index)
            .collect()
    }

    #[test]
    fn honors_ranking_then_backfills_in_order() {
        assert_eq!(run("[2,0]", 4, 3), [2, 0, 1]);
    }

    #[test]
    fn reply_without_brackets_falls_back() {
        assert_eq!(run("no idea", 4, 3), [0, 1, 2]);
    }

    #[test]
    fn duplicate_indices_collapse() {
        assert_eq!(run("[1,1,0]", 4, 2), [1, 0]);
    }

    #[test]
    fn empty_candidates_make_no_call() {
        let llm = Scripted::new("[0]");
        let out = rerank(&llm, "q", &[], &Language::from("en"), 5);
        assert!(out.is_empty());
        assert_eq!(llm.calls.get(), 0);
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        assert_eq!(
            run("Sure! The ranking is [3, 1] based on relevance.", 4, 2),
            [3, 1]
        );
    }

    #[test]
    fn out_of_range_and_negative_indices_are_dropped() {
        assert_eq!(run("[9, -1, 2]", 3, 3), [2, 0, 1]);
    }

    #[test]
    fn non_integer_content_falls_back() {
        assert_eq!(run(r#"["2", "0"]"#, 3, 2), [0, 1]);
        assert_eq!(run("[2, 0.5]", 3, 2), [0, 1]);
    }

    #[test]
    fn reversed_brackets_fall_back() {
        assert_eq!(run("] oops [", 3, 2), [0, 1]);
    }

    #[test]
    fn brackets_span_first_to_last() {
        // "[1] and [2]" is not a valid array once spanned.
        assert_eq!(run("[1] and [2]", 3, 2), [0, 1]);
    }

    #[test]
    fn output_never_exceeds_top_k() {
        assert_eq!(run("[3, 2, 1, 0]", 4, 2), [3, 2]);
    }

    #[test]
    fn fewer_candidates_than_top_k() {
        assert_eq!(run("[1]", 2, 5), [1, 0]);
    }

    #[test]
    fn repeated_chunk_in_candidates_is_not_repeated() {
        let chunks = corpus(2);
        let cands = vec![
            Candidate {
                chunk: &chunks[0],
                score: 2.0,
            },
            Candidate {
                chunk: &chunks[0],
                score: 1.0,
            },
            Candidate {
                chunk: &chunks[1],
                score: 0.5,
            },
        ];
        let llm = Scripted::new("[1, 0]");
        let out = rerank(&llm, "q", &cands, &Language::from("en"), 3);
        let ids: Vec<usize> = out.iter().map(|c| c.index).collect();
        assert_eq!(ids, [0, 1]);
    }

    #[test]
    fn model_failure_falls_back() {
        struct Down;
        impl TextCompletion for Down {
            fn generate(&self, _prompt: &str) -> Result<String> {
                Err(crate::error::Error::Config("offline".into()))
            }
        }

        let chunks = corpus(3);
        let cands = candidates(&chunks);
        let out = rerank(&Down, "q", &cands, &Language::from("en"), 2);
        let ids: Vec<usize> = out.iter().map(|c| c.index).collect();
        assert_eq!(ids, [0, 1]);
    }

    #[test]
    fn truncate_keeps_retrieval_order() {
        let chunks = corpus(4);
        let cands = candidates(&chunks);
        let ids: Vec<usize> =
            truncate(&cands, 2).iter().map(|c| c.index).collect();
        assert_eq!(ids, [0, 1]);
    }

    #[test]
    fn parse_ranking_cases() {
        assert_eq!(parse_ranking("[0, 2, 1]"), Some(vec![0, 2, 1]));
        assert_eq!(parse_ranking("```json\n[4]\n```"), Some(vec![4]));
        assert_eq!(parse_ranking("[]"), Some(vec![]));
        assert_eq!(parse_ranking("0, 1"), None);
        assert_eq!(parse_ranking("[0, 1"), None);
    }

    #[test]
    fn prompt_lists_numbered_previews() {
        let chunks = corpus(2);
        let cands = candidates(&chunks);
        let prompt = rerank_prompt("the q", &cands, Locale::English, 1);
        assert!(prompt.contains("[0] Passage 0."));
        assert!(prompt.contains("[1] Passage 1."));
        assert!(prompt.contains("Question: the q"));

        let zh = rerank_prompt("问题", &cands, Locale::Chinese, 1);
        assert!(zh.contains("问题：问题"));
    }
}
