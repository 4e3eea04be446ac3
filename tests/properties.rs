use docrag::{
    Language,
    chunking::{ChunkingConfig, chunk_documents, pack_sentences},
    document::Document,
    segment::split_sentences,
};
use proptest::prelude::*;

fn non_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Sentences tagged `<i>` so that any overlap between chunks is aligned
/// on sentence boundaries and attributable to a sentence run.
fn tagged_sentences(lengths: &[usize]) -> Vec<String> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| format!("<{i}>{}", "x".repeat(len)))
        .collect()
}

fn sentence_count(chunk: &str) -> usize {
    chunk.matches('<').count()
}

/// Length of the longest suffix of `a` that is also a prefix of `b`.
fn shared_run(a: &str, b: &str) -> usize {
    (0..=a.len().min(b.len()))
        .rev()
        .find(|&k| a.ends_with(&b[..k]))
        .unwrap_or(0)
}

proptest! {
    #[test]
    fn segmentation_keeps_all_content(
        text in "[a-zA-Z0-9 .?!\n\t,]{0,120}",
        tag in prop::sample::select(vec!["en", "de", "fr"]),
    ) {
        let sentences = split_sentences(&text, &Language::from(tag));
        prop_assert_eq!(non_whitespace(&sentences.concat()), non_whitespace(&text));
        for s in &sentences {
            prop_assert!(!s.trim().is_empty());
        }
    }

    #[test]
    fn cjk_segmentation_keeps_all_content(
        text in "[你好世界山河 。？！…；a\n]{0,80}",
        tag in prop::sample::select(vec!["zh", "ja", "ko", "zh-CN"]),
    ) {
        let sentences = split_sentences(&text, &Language::from(tag));
        prop_assert_eq!(non_whitespace(&sentences.concat()), non_whitespace(&text));
        for s in &sentences {
            prop_assert!(!s.trim().is_empty());
        }
    }

    #[test]
    fn segmentation_is_deterministic(text in "[a-z .?!。]{0,60}") {
        let en = Language::from("en");
        prop_assert_eq!(split_sentences(&text, &en), split_sentences(&text, &en));
    }

    #[test]
    fn multi_sentence_chunks_respect_size(
        lengths in prop::collection::vec(0usize..40, 0..30),
        chunk_size in 1usize..120,
        chunk_overlap in 0usize..80,
    ) {
        let sentences = tagged_sentences(&lengths);
        let chunks =
            pack_sentences(&sentences, ChunkingConfig::new(chunk_size, chunk_overlap));

        for chunk in &chunks {
            if sentence_count(chunk) > 1 {
                prop_assert!(
                    chunk.chars().count() <= chunk_size,
                    "chunk {chunk:?} longer than {chunk_size}"
                );
            }
        }
    }

    #[test]
    fn adjacent_chunks_share_at_most_the_overlap(
        lengths in prop::collection::vec(0usize..40, 0..30),
        chunk_size in 1usize..120,
        chunk_overlap in 0usize..80,
    ) {
        let sentences = tagged_sentences(&lengths);
        let chunks =
            pack_sentences(&sentences, ChunkingConfig::new(chunk_size, chunk_overlap));

        for pair in chunks.windows(2) {
            let shared = shared_run(&pair[0], &pair[1]);
            prop_assert!(
                shared <= chunk_overlap,
                "{:?} / {:?} share {shared} > {chunk_overlap}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn every_sentence_lands_in_a_chunk_in_order(
        lengths in prop::collection::vec(0usize..40, 0..30),
        chunk_size in 1usize..120,
        chunk_overlap in 0usize..80,
    ) {
        let sentences = tagged_sentences(&lengths);
        let chunks =
            pack_sentences(&sentences, ChunkingConfig::new(chunk_size, chunk_overlap));

        let joined = chunks.concat();
        let mut from = 0;
        for sentence in &sentences {
            let found = joined[from..].find(sentence.as_str());
            prop_assert!(found.is_some(), "{sentence:?} missing");
            from += found.unwrap_or(0);
        }
    }

    #[test]
    fn indices_increase_and_other_languages_are_skipped(
        docs in prop::collection::vec(
            (
                prop::sample::select(vec!["en", "zh", "de"]),
                "[a-z]{1,12}(\\. [a-z]{1,12}){0,8}\\.",
            ),
            0..12,
        ),
        chunk_size in 5usize..60,
    ) {
        let documents: Vec<Document> = docs
            .iter()
            .map(|(tag, text)| Document::new(text.as_str(), *tag))
            .collect();
        let target = Language::from("en");
        let chunks =
            chunk_documents(&documents, &target, ChunkingConfig::new(chunk_size, 10));

        for (position, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, position);
            prop_assert_eq!(&documents[chunk.source_document].language, &target);
        }
        for pair in chunks.windows(2) {
            prop_assert!(pair[0].source_document <= pair[1].source_document);
        }

        let english = documents.iter().filter(|d| d.language == target).count();
        let sources: std::collections::BTreeSet<usize> =
            chunks.iter().map(|c| c.source_document).collect();
        prop_assert_eq!(sources.len(), english);
    }
}
