//! Adaptive result-set sizing.
//!
//! Wraps a caller-supplied retrieval function. When the first batch looks
//! weak (low average score or too few results) the controller asks once
//! more with twice the `k`, bounded by `max_k`, and keeps the larger batch
//! only if its quality score strictly improves. There is never more than one
//! extra round trip and no retrying: a retrieval function that fails should
//! return an empty batch.

use ddifuse_core::config::RetrievalConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

const EXPANSION_FACTOR: usize = 2;

/// Count at which the quality score stops being discounted.
const FULL_COUNT: f64 = 10.0;

/// A retrieval result that carries a relevance score.
pub trait Scored {
    fn score(&self) -> f64;
}

impl<T> Scored for (T, f64) {
    fn score(&self) -> f64 {
        self.1
    }
}

impl<T: Scored + ?Sized> Scored for &T {
    fn score(&self) -> f64 {
        (**self).score()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub count: usize,
    pub avg_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    /// `(0.6·avg + 0.4·max)·min(1, count/10)`
    pub quality_score: f64,
}

/// Quality of a batch. An empty batch is all zeros.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn result_quality<T: Scored>(results: &[T]) -> QualityMetrics {
    if results.is_empty() {
        return QualityMetrics::default();
    }

    let count = results.len();
    let (sum, max, min) = results.iter().map(Scored::score).fold(
        (0.0, f64::NEG_INFINITY, f64::INFINITY),
        |(sum, max, min), s| (sum + s, max.max(s), min.min(s)),
    );
    let avg = sum / count as f64;
    let coverage = (count as f64 / FULL_COUNT).min(1.0);
    QualityMetrics {
        count,
        avg_score: avg,
        max_score: max,
        min_score: min,
        quality_score: 0.6f64.mul_add(avg, 0.4 * max) * coverage,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveParams {
    pub initial_k: usize,
    pub min_relevance: f64,
    pub min_results: usize,
    pub max_k: Option<usize>,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            initial_k: 10,
            min_relevance: 0.3,
            min_results: 5,
            max_k: None,
        }
    }
}

impl From<&RetrievalConfig> for AdaptiveParams {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            initial_k: cfg.initial_k,
            min_relevance: cfg.min_relevance,
            min_results: cfg.min_results,
            max_k: cfg.max_k,
        }
    }
}

/// What the controller did and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalTrail {
    pub initial_k: usize,
    pub final_k: usize,
    pub expanded: bool,
    pub expansion_factor: f64,
    pub quality_before: QualityMetrics,
    /// Set when an expansion was attempted. Equals `quality_before` when
    /// the larger batch was rejected.
    pub quality_after: Option<QualityMetrics>,
    pub used_fallback: bool,
    pub fallback: Option<Box<RetrievalTrail>>,
}

/// Retrieve with at most one expansion.
pub fn adaptive_retrieve<T, F>(query: &str, mut retrieve: F, params: &AdaptiveParams) -> (Vec<T>, RetrievalTrail)
where
    T: Scored,
    F: FnMut(&str, usize) -> Vec<T>,
{
    let initial_k = params.initial_k;
    let mut results = retrieve(query, initial_k);
    let quality = result_quality(&results);
    let mut trail = RetrievalTrail {
        initial_k,
        final_k: initial_k,
        expanded: false,
        expansion_factor: 1.0,
        quality_before: quality,
        quality_after: None,
        used_fallback: false,
        fallback: None,
    };

    let low_relevance = quality.avg_score < params.min_relevance;
    let too_few = quality.count < params.min_results;
    if !(low_relevance || too_few) {
        return (results, trail);
    }
    debug!(
        query,
        avg = quality.avg_score,
        count = quality.count,
        low_relevance,
        too_few,
        "weak retrieval batch, considering expansion"
    );

    let mut expanded_k = initial_k.saturating_mul(EXPANSION_FACTOR);
    if let Some(max_k) = params.max_k {
        expanded_k = expanded_k.min(max_k);
    }
    if expanded_k <= initial_k {
        return (results, trail);
    }

    let expanded_results = retrieve(query, expanded_k);
    let expanded_quality = result_quality(&expanded_results);
    if expanded_quality.quality_score > quality.quality_score {
        debug!(query, from = initial_k, to = expanded_k, "expanded retrieval adopted");
        results = expanded_results;
        trail.final_k = expanded_k;
        trail.expanded = true;
        trail.expansion_factor = 2.0;
        trail.quality_after = Some(expanded_quality);
    } else {
        trail.quality_after = Some(quality);
    }
    (results, trail)
}

/// [`adaptive_retrieve`] on `primary`, then on `fallback` if the primary
/// batch is empty.
pub fn adaptive_retrieve_with_fallback<T, P>(
    query: &str,
    primary: P,
    fallback: Option<&mut dyn FnMut(&str, usize) -> Vec<T>>,
    params: &AdaptiveParams,
) -> (Vec<T>, RetrievalTrail)
where
    T: Scored,
    P: FnMut(&str, usize) -> Vec<T>,
{
    let (results, mut trail) = adaptive_retrieve(query, primary, params);
    if !results.is_empty() {
        return (results, trail);
    }
    let Some(fallback) = fallback else {
        return (results, trail);
    };

    debug!(query, "primary retrieval empty, trying fallback");
    let (fallback_results, fallback_trail) = adaptive_retrieve(query, fallback, params);
    if fallback_results.is_empty() {
        return (results, trail);
    }
    trail.used_fallback = true;
    trail.fallback = Some(Box::new(fallback_trail));
    (fallback_results, trail)
}
