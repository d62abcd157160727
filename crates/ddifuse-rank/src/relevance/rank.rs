use std::collections::{HashMap, HashSet};

use crate::relevance::signals::{EvidenceItem, score_evidence_item};

/// Sort `(item, score)` pairs by descending score. Ties keep input order.
pub fn rank_scored<T>(scored: &mut [(T, f64)]) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
}

fn score_all<F>(names: &[String], build: F) -> Vec<(String, f64)>
where
    F: Fn(&str) -> EvidenceItem,
{
    let mut scored: Vec<(String, f64)> = names
        .iter()
        .map(|name| (name.clone(), score_evidence_item(&build(name))))
        .collect();
    rank_scored(&mut scored);
    scored
}

/// Rank side effects by per-term PRR and semantic similarity.
#[must_use]
pub fn score_and_rank_side_effects(
    side_effects: &[String],
    prr: Option<&HashMap<String, f64>>,
    semantic: Option<&HashMap<String, f64>>,
) -> Vec<(String, f64)> {
    score_all(side_effects, |name| EvidenceItem::SideEffect {
        name: name.to_string(),
        prr: prr.and_then(|m| m.get(name).copied()),
        count: None,
        semantic_similarity: semantic.and_then(|m| m.get(name).copied()),
        pair_specific: false,
    })
}

/// Rank targets, lifting those shared by both drugs.
#[must_use]
pub fn score_and_rank_targets(targets: &[String], overlap: &[String]) -> Vec<(String, f64)> {
    let shared: HashSet<&str> = overlap.iter().map(String::as_str).collect();
    score_all(targets, |name| EvidenceItem::Target {
        name: name.to_string(),
        overlap: shared.contains(name),
    })
}

/// Rank pathways, lifting those shared by both drugs.
#[must_use]
pub fn score_and_rank_pathways(pathways: &[String], overlap: &[String]) -> Vec<(String, f64)> {
    let shared: HashSet<&str> = overlap.iter().map(String::as_str).collect();
    score_all(pathways, |name| EvidenceItem::Pathway {
        name: name.to_string(),
        overlap: shared.contains(name),
    })
}

/// Keep items scoring at least `min_score`, best first, at most `top_k`.
///
/// Items and scores are paired positionally; extra entries on either side
/// are ignored.
pub fn apply_relevance_filter<T, I>(
    items: I,
    scores: &[f64],
    min_score: f64,
    top_k: Option<usize>,
) -> Vec<T>
where
    I: IntoIterator<Item = T>,
{
    let mut kept: Vec<(T, f64)> = items
        .into_iter()
        .zip(scores.iter().copied())
        .filter(|(_, score)| *score >= min_score)
        .collect();
    rank_scored(&mut kept);
    if let Some(k) = top_k {
        kept.truncate(k);
    }
    kept.into_iter().map(|(item, _)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn side_effects_rank_by_prr() {
        let prr = HashMap::from([
            ("bleeding".to_string(), 3.5),
            ("nausea".to_string(), 1.2),
            ("bruising".to_string(), 2.1),
        ]);
        let ranked = score_and_rank_side_effects(&names(&["nausea", "bleeding", "bruising"]), Some(&prr), None);
        let order: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["bleeding", "bruising", "nausea"]);
        assert!((ranked[0].1 - 5.0).abs() < 1e-9);
        assert!((ranked[2].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn overlapping_targets_come_first_and_ties_are_stable() {
        let ranked = score_and_rank_targets(&names(&["t1", "t2", "t3", "t4"]), &names(&["t3", "t1"]));
        let order: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["t1", "t3", "t2", "t4"]);
    }

    #[test]
    fn pathways_without_overlap_keep_order() {
        let ranked = score_and_rank_pathways(&names(&["p2", "p1"]), &[]);
        assert_eq!(ranked, vec![("p2".to_string(), 0.0), ("p1".to_string(), 0.0)]);
    }

    #[test]
    fn relevance_filter_thresholds_and_truncates() {
        let items = vec!["a", "b", "c", "d"];
        let scores = [0.1, 0.9, 0.5, 0.9];
        assert_eq!(apply_relevance_filter(items.clone(), &scores, 0.5, None), vec!["b", "d", "c"]);
        assert_eq!(apply_relevance_filter(items.clone(), &scores, 0.0, Some(2)), vec!["b", "d"]);
        assert!(apply_relevance_filter(items, &scores, 1.0, None).is_empty());
    }

    #[test]
    fn relevance_filter_pairs_positionally() {
        let out = apply_relevance_filter(vec![1, 2, 3], &[0.2, 0.4], 0.0, None);
        assert_eq!(out, vec![2, 1]);
    }
}
