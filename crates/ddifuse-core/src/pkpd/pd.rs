use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize_list;

/// Default canonicalization caps for PD inputs.
pub const DEFAULT_TARGET_TOPK: usize = 32;
pub const DEFAULT_PATHWAY_TOPK: usize = 24;

/// Overlap counts at which each half of the score saturates.
const SATURATION: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdOverlap {
    pub overlap_targets: Vec<String>,
    pub overlap_pathways: Vec<String>,
    pub pd_score: f64,
}

/// `min(1, 0.5·targets/10 + 0.5·pathways/10)`, rounded to 3 decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pd_score(common_targets: usize, common_pathways: usize) -> f64 {
    let raw = 0.5f64.mul_add(
        common_targets as f64 / SATURATION,
        0.5 * (common_pathways as f64 / SATURATION),
    );
    (raw.min(1.0) * 1000.0).round() / 1000.0
}

/// Intersect canonicalized target and pathway lists for two drugs.
#[must_use]
pub fn pd_overlap(
    targets_a: &[String],
    targets_b: &[String],
    pathways_a: &[String],
    pathways_b: &[String],
    target_topk: usize,
    pathway_topk: usize,
) -> PdOverlap {
    let intersect = |x: &[String], y: &[String], cap: usize| -> Vec<String> {
        let left: BTreeSet<String> = canonicalize_list(x, Some(cap)).into_iter().collect();
        let right: BTreeSet<String> = canonicalize_list(y, Some(cap)).into_iter().collect();
        left.intersection(&right).cloned().collect()
    };

    let overlap_targets = intersect(targets_a, targets_b, target_topk);
    let overlap_pathways = intersect(pathways_a, pathways_b, pathway_topk);
    let pd_score = pd_score(overlap_targets.len(), overlap_pathways.len());
    PdOverlap {
        overlap_targets,
        overlap_pathways,
        pd_score,
    }
}
