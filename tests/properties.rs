//! Property tests for the chunker, cosine similarity, and diversity ranking.

use std::collections::HashMap;

use doc_rag::chunk::{chunk_text, split_sentences, ChunkParams, DEFAULT_TERMINATORS};
use doc_rag::models::{ChunkCandidate, ScoredChunk};
use doc_rag::search::{order_scored, rank, RetrievalParams};
use doc_rag::similarity::cosine_similarity;
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z]{1,10}( [a-z]{1,10}){0,5}[.!?]{1,2}\n?", 0..20)
        .prop_map(|sentences| sentences.join(" "))
}

/// `(target_size, overlap_size)` with overlap strictly below target.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (5usize..200).prop_flat_map(|target| (Just(target), 0..target))
}

fn terminators() -> Vec<char> {
    DEFAULT_TERMINATORS.chars().collect()
}

fn strip_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

mod prop_chunker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn always_returns_a_chunk(text in "\\PC{0,300}", (target, overlap) in arb_sizes()) {
            let chunks = chunk_text(&text, &ChunkParams::new(target, overlap)).unwrap();
            prop_assert!(!chunks.is_empty());
        }

        #[test]
        fn sentences_are_never_split(text in arb_text(), (target, overlap) in arb_sizes()) {
            let chunks = chunk_text(&text, &ChunkParams::new(target, overlap)).unwrap();
            for sentence in split_sentences(&text, &terminators()) {
                let sentence = sentence.trim();
                prop_assert!(
                    chunks.iter().any(|c| c.contains(sentence)),
                    "sentence {:?} not found whole in any chunk", sentence
                );
            }
        }

        #[test]
        fn without_overlap_chunks_reassemble_text(text in arb_text(), target in 5usize..200) {
            let chunks = chunk_text(&text, &ChunkParams::new(target, 0)).unwrap();
            prop_assert_eq!(strip_ws(&chunks.concat()), strip_ws(&text));
        }

        #[test]
        fn without_overlap_multi_sentence_chunks_fit(text in arb_text(), target in 5usize..200) {
            let chunks = chunk_text(&text, &ChunkParams::new(target, 0)).unwrap();
            for chunk in &chunks {
                let sentences = split_sentences(chunk, &terminators()).len();
                prop_assert!(
                    sentences <= 1 || chunk.chars().count() <= target,
                    "chunk of {} sentences has {} chars, target {}",
                    sentences, chunk.chars().count(), target
                );
            }
        }

        #[test]
        fn consecutive_chunks_share_a_sentence(text in arb_text(), (target, overlap) in arb_sizes()) {
            prop_assume!(overlap > 0);
            let chunks = chunk_text(&text, &ChunkParams::new(target, overlap)).unwrap();
            for pair in chunks.windows(2) {
                let first_of_next = split_sentences(&pair[1], &terminators())[0].trim().to_string();
                prop_assert!(
                    pair[0].contains(&first_of_next),
                    "{:?} does not carry into {:?}", pair[0], pair[1]
                );
            }
        }
    }
}

mod prop_similarity {
    use super::*;

    fn arb_vec(dim: usize) -> impl Strategy<Value = Vec<f32>> {
        proptest::collection::vec(-10.0f32..10.0f32, dim)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn symmetric(a in arb_vec(8), b in arb_vec(8)) {
            prop_assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        }

        #[test]
        fn self_similarity_is_one(a in arb_vec(8)) {
            prop_assume!(a.iter().any(|x| *x != 0.0));
            prop_assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
        }

        #[test]
        fn bounded(a in arb_vec(8), b in arb_vec(8)) {
            let s = cosine_similarity(&a, &b);
            prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&s));
        }

        #[test]
        fn mismatched_lengths_score_zero(a in arb_vec(4), b in arb_vec(5)) {
            prop_assert_eq!(cosine_similarity(&a, &b), 0.0);
        }
    }
}

mod prop_ranking {
    use super::*;

    /// Candidates spread over up to six documents with dense chunk indices.
    fn arb_candidates() -> impl Strategy<Value = Vec<ChunkCandidate>> {
        proptest::collection::vec(
            (0usize..6, proptest::collection::vec(-1.0f32..1.0f32, 4), any::<bool>()),
            0..40,
        )
        .prop_map(|rows| {
            let mut next_index: HashMap<usize, i64> = HashMap::new();
            rows.into_iter()
                .map(|(doc, embedding, embedded)| {
                    let index = next_index.entry(doc).or_insert(0);
                    let chunk_index = *index;
                    *index += 1;
                    ChunkCandidate {
                        chunk_id: format!("d{}-{}", doc, chunk_index),
                        document_id: format!("d{}", doc),
                        document_title: String::new(),
                        chunk_index,
                        content: String::new(),
                        embedding: embedded.then_some(embedding),
                    }
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn result_count_is_min_of_limit_and_embedded(
            candidates in arb_candidates(),
            query in proptest::collection::vec(-1.0f32..1.0f32, 4),
            limit in 1usize..15,
        ) {
            let embedded = candidates.iter().filter(|c| c.embedding.is_some()).count();
            let results = rank(&query, candidates, limit, &RetrievalParams::default());
            prop_assert_eq!(results.len(), limit.min(embedded));
        }

        #[test]
        fn cap_holds_when_documents_suffice(
            candidates in arb_candidates(),
            query in proptest::collection::vec(-1.0f32..1.0f32, 4),
            limit in 1usize..15,
        ) {
            let params = RetrievalParams::default();
            let mut per_doc: HashMap<String, usize> = HashMap::new();
            for c in candidates.iter().filter(|c| c.embedding.is_some()) {
                *per_doc.entry(c.document_id.clone()).or_insert(0) += 1;
            }
            let coverable: usize = per_doc.values().map(|n| (*n).min(params.max_chunks_per_doc)).sum();
            prop_assume!(coverable >= limit);

            let results = rank(&query, candidates, limit, &params);
            let mut picked: HashMap<&str, usize> = HashMap::new();
            for r in &results {
                *picked.entry(r.document_id.as_str()).or_insert(0) += 1;
            }
            prop_assert!(picked.values().all(|n| *n <= params.max_chunks_per_doc));
        }

        #[test]
        fn no_chunk_selected_twice(
            candidates in arb_candidates(),
            query in proptest::collection::vec(-1.0f32..1.0f32, 4),
            limit in 1usize..15,
        ) {
            let results = rank(&query, candidates, limit, &RetrievalParams::default());
            let mut ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), results.len());
        }
    }
}

mod prop_near_ties {
    use super::*;

    const TOLERANCE: f64 = 0.01;

    /// `a` must come before `b` under the same-document near-tie rule.
    fn precedes(a: &ScoredChunk, b: &ScoredChunk) -> bool {
        if (a.score - b.score).abs() <= TOLERANCE {
            a.chunk_index < b.chunk_index
        } else {
            a.score > b.score
        }
    }

    /// Chunks of one document with distinct indices and clustered scores.
    fn arb_same_doc() -> impl Strategy<Value = Vec<ScoredChunk>> {
        (2usize..8)
            .prop_flat_map(|n| {
                (
                    Just((0..n as i64).collect::<Vec<i64>>()).prop_shuffle(),
                    proptest::collection::vec(0.90f64..0.95f64, n),
                )
            })
            .prop_map(|(indices, scores)| {
                indices
                    .into_iter()
                    .zip(scores)
                    .map(|(chunk_index, score)| ScoredChunk {
                        chunk_id: format!("a-{}", chunk_index),
                        document_id: "a".to_string(),
                        document_title: String::new(),
                        chunk_index,
                        content: String::new(),
                        score,
                    })
                    .collect()
            })
    }

    /// True when the pairwise rule admits a total order (no cycles).
    fn rule_is_transitive(chunks: &[ScoredChunk]) -> bool {
        for a in chunks {
            for b in chunks {
                for c in chunks {
                    if precedes(a, b) && precedes(b, c) && !precedes(a, c) {
                        return false;
                    }
                }
            }
        }
        true
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn same_document_order_honors_every_pair(chunks in arb_same_doc()) {
            prop_assume!(rule_is_transitive(&chunks));

            let mut ordered = chunks;
            order_scored(&mut ordered, TOLERANCE);

            for i in 0..ordered.len() {
                for j in (i + 1)..ordered.len() {
                    prop_assert!(
                        precedes(&ordered[i], &ordered[j]),
                        "{}@{} placed before {}@{}",
                        ordered[i].chunk_index, ordered[i].score,
                        ordered[j].chunk_index, ordered[j].score
                    );
                }
            }
        }
    }
}
