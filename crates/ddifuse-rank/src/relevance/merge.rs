use std::collections::HashMap;

use crate::relevance::rank::rank_scored;

/// Combine two scored lists with weights normalized to sum to one.
///
/// Keys missing from one list contribute zero from it. When a list repeats
/// a key, its last score wins. Output order is descending by combined score;
/// ties keep first-seen order (all of `primary`, then new keys of
/// `secondary`). Non-positive weight sums are used as given.
#[must_use]
pub fn merge_and_rerank(
    primary: &[(String, f64)],
    secondary: &[(String, f64)],
    primary_weight: f64,
    secondary_weight: f64,
) -> Vec<(String, f64)> {
    let total = primary_weight + secondary_weight;
    let (wp, ws) = if total > 0.0 {
        (primary_weight / total, secondary_weight / total)
    } else {
        (primary_weight, secondary_weight)
    };

    let mut order: Vec<&str> = Vec::new();
    let mut scores: HashMap<&str, (f64, f64)> = HashMap::new();
    for (key, score) in primary {
        scores
            .entry(key.as_str())
            .and_modify(|s| s.0 = *score)
            .or_insert_with(|| {
                order.push(key.as_str());
                (*score, 0.0)
            });
    }
    for (key, score) in secondary {
        scores
            .entry(key.as_str())
            .and_modify(|s| s.1 = *score)
            .or_insert_with(|| {
                order.push(key.as_str());
                (0.0, *score)
            });
    }

    let mut combined: Vec<(String, f64)> = order
        .into_iter()
        .map(|key| {
            let (p, s) = scores.get(key).copied().unwrap_or_default();
            (key.to_string(), p.mul_add(wp, s * ws))
        })
        .collect();
    rank_scored(&mut combined);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(xs: &[(&str, f64)]) -> Vec<(String, f64)> {
        xs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn weights_are_normalized() {
        let out = merge_and_rerank(&scored(&[("a", 1.0)]), &scored(&[("a", 1.0)]), 3.0, 1.0);
        assert_eq!(out.len(), 1);
        assert!((out[0].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn union_with_missing_as_zero() {
        let out = merge_and_rerank(
            &scored(&[("x", 1.0), ("y", 0.5)]),
            &scored(&[("y", 1.0), ("z", 0.9)]),
            0.6,
            0.4,
        );
        let order: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        // x: 0.6, y: 0.3 + 0.4 = 0.7, z: 0.36
        assert_eq!(order, vec!["y", "x", "z"]);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let out = merge_and_rerank(
            &scored(&[("b", 1.0), ("a", 1.0)]),
            &scored(&[("c", 1.0)]),
            1.0,
            1.0,
        );
        let order: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn zero_weights_leave_everything_at_zero() {
        let out = merge_and_rerank(&scored(&[("a", 2.0)]), &scored(&[("b", 3.0)]), 0.0, 0.0);
        assert!(out.iter().all(|(_, s)| s.abs() < f64::EPSILON));
        assert_eq!(out[0].0, "a");
    }
}
