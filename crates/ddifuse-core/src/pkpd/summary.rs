use serde::{Deserialize, Serialize};

use crate::model::{MechanisticRecord, PairRoles};
use crate::pkpd::pd::{DEFAULT_PATHWAY_TOPK, DEFAULT_TARGET_TOPK, PdOverlap, pd_overlap};
use crate::pkpd::pk::{OverlapResult, detect_overlaps};

const PD_LIST_LIMIT: usize = 8;

/// One-line PK and PD summaries plus the details they were built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PkPdSummary {
    pub pk_summary: String,
    pub pd_summary: String,
    pub roles: PairRoles,
    pub overlaps: OverlapResult,
    pub pd: PdOverlap,
}

#[must_use]
pub fn summarize_pkpd_risk(record: &MechanisticRecord) -> PkPdSummary {
    summarize_pkpd_risk_with(record, DEFAULT_TARGET_TOPK, DEFAULT_PATHWAY_TOPK)
}

#[must_use]
pub fn summarize_pkpd_risk_with(
    record: &MechanisticRecord,
    target_topk: usize,
    pathway_topk: usize,
) -> PkPdSummary {
    let roles = record.enzymes.clone();
    let overlaps = detect_overlaps(&roles);
    let pd = pd_overlap(
        &record.targets_a,
        &record.targets_b,
        &record.pathways_a,
        &record.pathways_b,
        target_topk,
        pathway_topk,
    );

    let mut pk_flags = Vec::new();
    if !overlaps.inhibition.is_empty() {
        pk_flags.push(format!(
            "Potential ↑ exposure via inhibition at {}",
            join(overlaps.inhibition.iter())
        ));
    }
    if !overlaps.induction.is_empty() {
        pk_flags.push(format!(
            "Potential ↓ exposure via induction at {}",
            join(overlaps.induction.iter())
        ));
    }
    if !overlaps.shared_substrate.is_empty() {
        pk_flags.push(format!(
            "Both are substrates of {} (competition possible)",
            join(overlaps.shared_substrate.iter())
        ));
    }

    let mut pd_flags = Vec::new();
    if !pd.overlap_targets.is_empty() {
        pd_flags.push(format!(
            "Overlapping targets: {}",
            join(pd.overlap_targets.iter().take(PD_LIST_LIMIT))
        ));
    }
    if !pd.overlap_pathways.is_empty() {
        pd_flags.push(format!(
            "Common pathways: {}",
            join(pd.overlap_pathways.iter().take(PD_LIST_LIMIT))
        ));
    }

    PkPdSummary {
        pk_summary: or_default(&pk_flags, "No strong PK overlap detected"),
        pd_summary: or_default(&pd_flags, "No obvious PD overlap"),
        roles,
        overlaps,
        pd,
    }
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn or_default(flags: &[String], fallback: &str) -> String {
    if flags.is_empty() {
        fallback.to_string()
    } else {
        flags.join("; ")
    }
}
