//! Keyword plus semantic lookup over one ranked list.
//!
//! Keyword search always runs. Semantic search runs only when a search
//! function is supplied, and a failing one falls back to keyword results
//! alone. Both lists are over-fetched (`2·top_k`) so the weighted merge has
//! room to reorder before truncation.

use std::fmt::Display;

use ddifuse_core::config::RankingConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adaptive::{AdaptiveParams, RetrievalTrail, adaptive_retrieve};
use crate::relevance::merge_and_rerank;

/// Minimum similarity a semantic hit needs to be considered.
pub const SEMANTIC_THRESHOLD: f64 = 0.6;

const OVERFETCH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub keyword: f64,
    pub semantic: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            keyword: 0.6,
            semantic: 0.4,
        }
    }
}

impl From<&RankingConfig> for HybridWeights {
    fn from(cfg: &RankingConfig) -> Self {
        Self {
            keyword: cfg.keyword_weight,
            semantic: cfg.semantic_weight,
        }
    }
}

/// Merge keyword and semantic hits for `query`, best first, at most `top_k`.
///
/// `keyword` is called as `(query, k)`; `semantic` as `(query, k, threshold)`.
/// Without semantic hits the keyword list is returned unweighted.
pub fn hybrid_search<K, S, E>(
    query: &str,
    keyword: K,
    semantic: Option<S>,
    top_k: usize,
    weights: HybridWeights,
) -> Vec<(String, f64)>
where
    K: Fn(&str, usize) -> Vec<(String, f64)>,
    S: Fn(&str, usize, f64) -> Result<Vec<(String, f64)>, E>,
    E: Display,
{
    let fetch = top_k.saturating_mul(OVERFETCH);
    let keyword_hits = keyword(query, fetch);

    let semantic_hits = match semantic.map(|search| search(query, fetch, SEMANTIC_THRESHOLD)) {
        Some(Ok(hits)) => hits,
        Some(Err(err)) => {
            warn!(query, error = %err, "semantic search failed, using keyword results only");
            Vec::new()
        }
        None => Vec::new(),
    };

    debug!(
        query,
        keyword = keyword_hits.len(),
        semantic = semantic_hits.len(),
        "hybrid search"
    );
    let mut merged = if semantic_hits.is_empty() {
        keyword_hits
    } else {
        merge_and_rerank(&keyword_hits, &semantic_hits, weights.keyword, weights.semantic)
    };
    merged.truncate(top_k);
    merged
}

/// [`hybrid_search`] under the adaptive controller: `top_k` starts at
/// `params.initial_k` and is widened once when the merged list looks weak.
pub fn adaptive_hybrid_search<K, S, E>(
    query: &str,
    keyword: K,
    semantic: Option<S>,
    params: &AdaptiveParams,
    weights: HybridWeights,
) -> (Vec<(String, f64)>, RetrievalTrail)
where
    K: Fn(&str, usize) -> Vec<(String, f64)>,
    S: Fn(&str, usize, f64) -> Result<Vec<(String, f64)>, E>,
    E: Display,
{
    adaptive_retrieve(
        query,
        |q, k| hybrid_search(q, &keyword, semantic.as_ref(), k, weights),
        params,
    )
}
