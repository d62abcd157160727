//! Score-combining reranking.
//!
//! The scoring model itself (typically a cross-encoder) is a collaborator
//! behind [`Reranker`]. When it is absent, fails, or returns the wrong
//! number of scores, every document scores `1.0` and keeps its input order.

use std::collections::HashMap;

use anyhow::Result;
use tracing::warn;

use crate::relevance::rank_scored;

/// Scores query/document pairs. Higher is more relevant.
pub trait Reranker {
    /// One score per document, in input order.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the model cannot score.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f64>>;
}

/// Weights used when blending original and reranker scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombineWeights {
    pub original: f64,
    pub rerank: f64,
}

impl Default for CombineWeights {
    fn default() -> Self {
        Self {
            original: 0.3,
            rerank: 0.7,
        }
    }
}

fn neutral(documents: &[String], top_k: Option<usize>) -> Vec<(String, f64)> {
    let take = top_k.unwrap_or(documents.len());
    documents.iter().take(take).map(|d| (d.clone(), 1.0)).collect()
}

/// Rerank `documents` for `query`, best first.
#[must_use]
pub fn rerank(
    reranker: Option<&dyn Reranker>,
    query: &str,
    documents: &[String],
    top_k: Option<usize>,
) -> Vec<(String, f64)> {
    let Some(model) = reranker else {
        return neutral(documents, top_k);
    };
    if documents.is_empty() || query.trim().is_empty() {
        return neutral(documents, top_k);
    }

    match model.score(query, documents) {
        Ok(scores) if scores.len() == documents.len() => {
            let mut scored: Vec<(String, f64)> = documents.iter().cloned().zip(scores).collect();
            rank_scored(&mut scored);
            if let Some(k) = top_k {
                scored.truncate(k);
            }
            scored
        }
        Ok(scores) => {
            warn!(
                expected = documents.len(),
                got = scores.len(),
                "reranker returned wrong number of scores, keeping input order"
            );
            neutral(documents, top_k)
        }
        Err(err) => {
            warn!(error = %err, "reranking failed, keeping input order");
            neutral(documents, top_k)
        }
    }
}

/// Rerank documents that already carry scores.
///
/// With `combine` set, the result score is
/// `original·w.original + rerank·w.rerank`; otherwise the reranker score is
/// used alone.
#[must_use]
pub fn rerank_with_scores(
    reranker: Option<&dyn Reranker>,
    query: &str,
    scored: &[(String, f64)],
    top_k: Option<usize>,
    combine: Option<CombineWeights>,
) -> Vec<(String, f64)> {
    if scored.is_empty() {
        return Vec::new();
    }

    let documents: Vec<String> = scored.iter().map(|(d, _)| d.clone()).collect();
    let reranked = rerank(reranker, query, &documents, None);

    let Some(weights) = combine else {
        let mut out = reranked;
        if let Some(k) = top_k {
            out.truncate(k);
        }
        return out;
    };

    let original: HashMap<&str, f64> = scored.iter().map(|(d, s)| (d.as_str(), *s)).collect();
    let mut combined: Vec<(String, f64)> = reranked
        .into_iter()
        .map(|(doc, rerank_score)| {
            let base = original.get(doc.as_str()).copied().unwrap_or(0.0);
            let blended = base.mul_add(weights.original, rerank_score * weights.rerank);
            (doc, blended)
        })
        .collect();
    rank_scored(&mut combined);
    if let Some(k) = top_k {
        combined.truncate(k);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct LengthModel;

    impl Reranker for LengthModel {
        #[allow(clippy::cast_precision_loss)]
        fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f64>> {
            Ok(documents.iter().map(|d| d.len() as f64 / 10.0).collect())
        }
    }

    struct Broken;

    impl Reranker for Broken {
        fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f64>> {
            Err(anyhow!("model not loaded"))
        }
    }

    fn docs(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn model_scores_reorder() {
        let out = rerank(Some(&LengthModel), "q", &docs(&["ab", "abcdef", "abcd"]), Some(2));
        let order: Vec<&str> = out.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(order, vec!["abcdef", "abcd"]);
    }

    #[test]
    fn failures_degrade_to_neutral_scores() {
        for reranker in [None, Some(&Broken as &dyn Reranker)] {
            let out = rerank(reranker, "q", &docs(&["x", "y"]), None);
            assert_eq!(out, vec![("x".to_string(), 1.0), ("y".to_string(), 1.0)]);
        }
        let blank_query = rerank(Some(&LengthModel), "  ", &docs(&["x", "yy"]), Some(1));
        assert_eq!(blank_query, vec![("x".to_string(), 1.0)]);
    }

    #[test]
    fn combined_scores_blend_original_and_model() {
        let scored = vec![("short".to_string(), 1.0), ("much longer".to_string(), 0.0)];
        let out = rerank_with_scores(Some(&LengthModel), "q", &scored, None, Some(CombineWeights::default()));
        // short: 0.3 + 0.35 = 0.65, much longer: 0 + 0.77
        assert_eq!(out[0].0, "much longer");
        assert!((out[0].1 - 0.77).abs() < 1e-9);
        assert!((out[1].1 - 0.65).abs() < 1e-9);
    }

    #[test]
    fn broken_model_with_combine_keeps_original_order_by_score() {
        let scored = vec![("a".to_string(), 0.2), ("b".to_string(), 0.9)];
        let out = rerank_with_scores(Some(&Broken), "q", &scored, Some(1), Some(CombineWeights::default()));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "b");
    }
}
