//! Heuristic evidence relevance.
//!
//! Every evidence variant reduces to one [`RelevanceSignals`] bundle and is
//! scored by one additive function, [`score_signals`]:
//!
//! | Signal                                         | Contribution      |
//! |------------------------------------------------|-------------------|
//! | canonical/curated interaction                  | +10               |
//! | PRR > 2.0 / > 1.5 / > 1.0                       | +5 / +2 / +0.5    |
//! | pathway overlap / target overlap                | +3 / +2           |
//! | enzyme inhibition / induction / shared substrate| +4 / +3 / +1.5    |
//! | report count > 1000 / > 100 / > 10              | +2 / +1 / +0.5    |
//! | risk tier high·severe / medium·moderate (each)  | +2 / +1           |
//! | secondary risk score > 0.7 / > 0.4              | +1.5 / +0.5       |
//! | semantic similarity > 0.8 / > 0.6               | +1.0 / +0.5       |
//! | pair-specific                                   | +1                |
//!
//! Scores are unbounded and only meaningful for ordering.

pub mod merge;
pub mod rank;
pub mod signals;

pub use merge::merge_and_rerank;
pub use rank::{
    apply_relevance_filter, rank_scored, score_and_rank_pathways, score_and_rank_side_effects,
    score_and_rank_targets,
};
pub use signals::{EvidenceItem, RelevanceSignals, RiskTier, score_evidence_item, score_signals};
