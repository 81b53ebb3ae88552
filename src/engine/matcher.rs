//! Similarity Matcher: rank a candidate scope against a query vector.
//!
//! The public contract is scope-based: callers name what to match
//! against (the global set, a category slice, or a tenant's active
//! set), never hand over a raw array. The current implementation is a
//! linear cosine scan, which at this scale is exact and fast; an index-
//! backed scan can replace it behind the same contract.

use crate::core::error::CharterError;
use crate::core::store::Store;
use crate::engine::principles::{self, Principle};
use crate::engine::tenants;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum CandidateScope {
    /// Every globally active principle.
    Global,
    /// Globally active principles in one category.
    GlobalCategory(String),
    /// The named tenant's in-effect principle set.
    Tenant(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPrinciple {
    pub principle: Principle,
    pub similarity: f64,
}

/// Result of one ranking pass. `ranked` is ordered by similarity
/// descending, id ascending on exact ties.
#[derive(Debug)]
pub struct Ranking {
    pub ranked: Vec<ScoredPrinciple>,
    pub threshold: f64,
    /// Candidates excluded for lacking a usable embedding (absent,
    /// wrong dimension, or zero norm). A signal, not a failure:
    /// indexing may lag principle creation.
    pub skipped_unembedded: usize,
    matched_len: usize,
}

impl Ranking {
    /// Candidates at or above the threshold, best first.
    pub fn matched(&self) -> &[ScoredPrinciple] {
        &self.ranked[..self.matched_len]
    }

    /// Candidates below the threshold, best first.
    pub fn below(&self) -> &[ScoredPrinciple] {
        &self.ranked[self.matched_len..]
    }
}

/// Cosine similarity in f64. `None` for mismatched lengths or when
/// either vector has zero norm (degenerate embedding, no opinion).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Rank the candidates in `scope` against `query`.
pub fn rank(
    store: &Store,
    scope: &CandidateScope,
    query: &[f32],
    threshold: f64,
) -> Result<Ranking, CharterError> {
    let candidates = match scope {
        CandidateScope::Global => principles::list_active(store, None)?,
        CandidateScope::GlobalCategory(cat) => principles::list_active(store, Some(cat))?,
        CandidateScope::Tenant(tenant_id) => tenants::active_principles_for(store, tenant_id)?,
    };
    Ok(rank_candidates(candidates, query, threshold))
}

fn rank_candidates(candidates: Vec<Principle>, query: &[f32], threshold: f64) -> Ranking {
    let mut skipped = 0usize;
    let mut ranked: Vec<ScoredPrinciple> = Vec::with_capacity(candidates.len());

    for principle in candidates {
        let Some(vector) = principle.embedding.as_deref() else {
            skipped += 1;
            continue;
        };
        match cosine_similarity(query, vector) {
            Some(similarity) => ranked.push(ScoredPrinciple {
                principle,
                similarity,
            }),
            None => skipped += 1,
        }
    }

    ranked.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.principle.id.cmp(&b.principle.id))
    });

    let matched_len = ranked
        .iter()
        .take_while(|s| s.similarity >= threshold)
        .count();

    Ranking {
        ranked,
        threshold,
        skipped_unembedded: skipped,
        matched_len,
    }
}
