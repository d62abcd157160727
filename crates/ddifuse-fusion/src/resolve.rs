//! Free-text drug name resolution.
//!
//! A name is expanded into candidate terms ([`expand_drug_query`]); each term
//! is looked up in the [`DrugIndex`] with adaptive hybrid search, in
//! priority order, until one returns hits. The best hit of that term is the
//! resolved name.

use std::convert::Infallible;

use ddifuse_core::config::FusionConfig;
use ddifuse_rank::adaptive::{AdaptiveParams, RetrievalTrail};
use ddifuse_rank::expand::{best_match_from_expanded, expand_drug_query};
use ddifuse_rank::hybrid::{HybridWeights, adaptive_hybrid_search};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::source::DrugIndex;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugResolution {
    pub query: String,
    /// Best indexed name, if any term matched.
    pub resolved: Option<String>,
    pub score: f64,
    /// The expanded term that produced the match.
    pub matched_term: Option<String>,
    pub candidates: Vec<(String, f64)>,
    /// Every term tried, in priority order.
    pub terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail: Option<RetrievalTrail>,
}

/// Resolve `name` against `index`, using the retrieval sizing and the
/// keyword/semantic weights from `config`.
#[must_use]
pub fn resolve_drug(index: &dyn DrugIndex, name: &str, synonyms: &[String], config: &FusionConfig) -> DrugResolution {
    let terms = expand_drug_query(name, synonyms);
    let params = AdaptiveParams::from(&config.retrieval);
    let weights = HybridWeights::from(&config.ranking);

    let keyword = |q: &str, k: usize| {
        index.keyword_search(q, k).unwrap_or_else(|err| {
            warn!(query = q, code = %err.code(), error = %err, "keyword drug search failed");
            Vec::new()
        })
    };
    let semantic = |q: &str, k: usize, threshold: f64| index.semantic_search(q, k, threshold);

    let mut found: Option<(Vec<(String, f64)>, RetrievalTrail)> = None;
    let matched = best_match_from_expanded(
        &terms,
        |term| {
            let (hits, trail) = adaptive_hybrid_search(term, &keyword, Some(&semantic), &params, weights);
            if hits.is_empty() {
                return Ok::<_, Infallible>(false);
            }
            found = Some((hits, trail));
            Ok(true)
        },
        1,
    );

    let mut resolution = DrugResolution {
        query: name.to_string(),
        matched_term: matched.into_iter().next(),
        terms,
        ..DrugResolution::default()
    };
    if let Some((hits, trail)) = found {
        if let Some((best, score)) = hits.first() {
            resolution.resolved = Some(best.clone());
            resolution.score = *score;
        }
        resolution.candidates = hits;
        resolution.trail = Some(trail);
    }
    debug!(
        query = name,
        resolved = resolution.resolved.as_deref().unwrap_or("-"),
        tried = resolution.terms.len(),
        "drug name resolved"
    );
    resolution
}
