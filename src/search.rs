//! Brute-force similarity search with per-document diversity.
//!
//! Every chunk the querying user owns is scored against the query vector;
//! there is no index. The scored list is ordered, then a diversity pass
//! limits how many results any one document contributes.
//!
//! # Ordering
//!
//! Scores are compared descending. Two chunks of the same document whose
//! scores differ by at most `tie_tolerance` are a near tie and go in
//! reading order (`chunk_index` ascending). Near ties across documents keep
//! score order.
//!
//! The near-tie rule is not transitive, so it is applied as a second pass
//! rather than as a sort comparator: after a stable sort by score, each
//! document's chunks are insertion-sorted in score order, a chunk moving
//! ahead of earlier near-tied chunks with a larger `chunk_index`. The
//! reordered chunks go back into the positions the document already holds.
//! Whenever some order satisfies the rule for every pair, this pass finds
//! it.
//!
//! # Diversity Selection
//!
//! 1. Scan the top `limit × candidate_multiplier` entries, admitting an
//!    entry while its document has fewer than `max_chunks_per_doc` picks.
//! 2. If short of `limit`, scan the whole list under the same cap.
//! 3. If still short, drop the cap and fill from the remaining entries in
//!    order.
//!
//! Results keep selection order; they are not re-sorted afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::{ChunkCandidate, ScoredChunk};
use crate::similarity::cosine_similarity;
use crate::store::ChunkStore;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Diversity cap: picks per document before the cap is relaxed.
    pub max_chunks_per_doc: usize,
    /// Pass 1 scans the top `limit × candidate_multiplier` entries.
    pub candidate_multiplier: usize,
    /// Scores within this distance are a near tie.
    pub tie_tolerance: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            max_chunks_per_doc: 2,
            candidate_multiplier: 3,
            tie_tolerance: 0.01,
        }
    }
}

/// Score every candidate that has an embedding. Candidates without one are
/// dropped.
pub fn score_candidates(query_vec: &[f32], candidates: Vec<ChunkCandidate>) -> Vec<ScoredChunk> {
    candidates
        .into_iter()
        .filter_map(|c| {
            let embedding = c.embedding?;
            Some(ScoredChunk {
                score: cosine_similarity(query_vec, &embedding),
                chunk_id: c.chunk_id,
                document_id: c.document_id,
                document_title: c.document_title,
                chunk_index: c.chunk_index,
                content: c.content,
            })
        })
        .collect()
}

/// NaN scores sort last.
fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Order scored chunks by score, then by reading order within each
/// document's near ties. See the [module docs](self).
pub fn order_scored(scored: &mut Vec<ScoredChunk>, tie_tolerance: f64) {
    scored.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));

    let mut positions_by_doc: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, s) in scored.iter().enumerate() {
        positions_by_doc
            .entry(s.document_id.as_str())
            .or_default()
            .push(pos);
    }

    let mut order: Vec<usize> = (0..scored.len()).collect();

    for positions in positions_by_doc.values() {
        // Stable insertion in score order: a chunk moves ahead of earlier
        // near-tied chunks with a larger index and stops at the first one
        // that must stay in front of it.
        let mut placed: Vec<usize> = Vec::with_capacity(positions.len());
        for &pos in positions {
            let score = rank_key(scored[pos].score);
            let index = scored[pos].chunk_index;
            let mut at = placed.len();
            while at > 0 {
                let prev = placed[at - 1];
                let tied = rank_key(scored[prev].score) - score <= tie_tolerance;
                if !(tied && scored[prev].chunk_index > index) {
                    break;
                }
                at -= 1;
            }
            placed.insert(at, pos);
        }

        for (&slot, &member) in positions.iter().zip(placed.iter()) {
            order[slot] = member;
        }
    }

    *scored = take_in_order(std::mem::take(scored), &order);
}

/// Pick up to `limit` entries from an ordered list under the diversity cap.
/// See the [module docs](self).
pub fn select_diverse(
    ordered: Vec<ScoredChunk>,
    limit: usize,
    params: &RetrievalParams,
) -> Vec<ScoredChunk> {
    let cap = params.max_chunks_per_doc;
    let window = limit
        .saturating_mul(params.candidate_multiplier)
        .min(ordered.len());

    let mut picked: Vec<usize> = Vec::with_capacity(limit.min(ordered.len()));
    let mut taken = vec![false; ordered.len()];
    let mut per_doc: HashMap<&str, usize> = HashMap::new();

    // Pass 1: top of the list, capped
    for pos in 0..window {
        if picked.len() >= limit {
            break;
        }
        let count = per_doc.entry(ordered[pos].document_id.as_str()).or_insert(0);
        if *count < cap {
            *count += 1;
            taken[pos] = true;
            picked.push(pos);
        }
    }

    // Pass 2: whole list, capped
    if picked.len() < limit {
        for pos in 0..ordered.len() {
            if picked.len() >= limit {
                break;
            }
            if taken[pos] {
                continue;
            }
            let count = per_doc.entry(ordered[pos].document_id.as_str()).or_insert(0);
            if *count < cap {
                *count += 1;
                taken[pos] = true;
                picked.push(pos);
            }
        }
    }

    // Pass 3: fewer documents than the cap can cover, fill uncapped
    if picked.len() < limit {
        for pos in 0..ordered.len() {
            if picked.len() >= limit {
                break;
            }
            if !taken[pos] {
                taken[pos] = true;
                picked.push(pos);
            }
        }
    }

    take_in_order(ordered, &picked)
}

/// Score, order, and diversify candidates for one query vector.
pub fn rank(
    query_vec: &[f32],
    candidates: Vec<ChunkCandidate>,
    limit: usize,
    params: &RetrievalParams,
) -> Vec<ScoredChunk> {
    let mut scored = score_candidates(query_vec, candidates);
    order_scored(&mut scored, params.tie_tolerance);
    select_diverse(scored, limit, params)
}

/// Move the entries at `positions` out of `items`, in that order.
fn take_in_order(items: Vec<ScoredChunk>, positions: &[usize]) -> Vec<ScoredChunk> {
    let mut slots: Vec<Option<ScoredChunk>> = items.into_iter().map(Some).collect();
    positions
        .iter()
        .filter_map(|&pos| slots.get_mut(pos).and_then(Option::take))
        .collect()
}

/// Query-facing retriever over an injected store and embedder.
pub struct Retriever {
    store: Arc<dyn ChunkStore>,
    embedder: Embedder,
    params: RetrievalParams,
    default_limit: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Embedder) -> Self {
        Self {
            store,
            embedder,
            params: RetrievalParams::default(),
            default_limit: 5,
        }
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Search a caller-supplied candidate pool.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLimit`] for `limit == 0`; embedding errors from the
    /// query embedding are returned as-is.
    pub async fn search_candidates(
        &self,
        query: &str,
        candidates: Vec<ChunkCandidate>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if limit == 0 {
            return Err(Error::InvalidLimit);
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let pool_size = candidates.len();
        let results = rank(&query_vec, candidates, limit, &self.params);

        debug!(
            candidates = pool_size,
            selected = results.len(),
            limit,
            "ranked candidate pool"
        );
        Ok(results)
    }

    /// Search every chunk the owner has stored.
    ///
    /// Uses the configured default limit when `limit` is `None`. An empty
    /// query or a pool without embedded chunks yields an empty result
    /// without calling the provider.
    pub async fn search_chunks(
        &self,
        owner_id: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredChunk>> {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(Error::InvalidLimit);
        }
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .scan_candidates(owner_id)
            .await
            .map_err(Error::Store)?;

        if candidates.iter().all(|c| c.embedding.is_none()) {
            info!(owner = owner_id, "no embedded chunks to search");
            return Ok(Vec::new());
        }

        let results = self.search_candidates(query, candidates, limit).await?;
        info!(owner = owner_id, selected = results.len(), "search complete");
        Ok(results)
    }
}
