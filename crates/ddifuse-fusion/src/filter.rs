//! Relevance filtering of a fused context.
//!
//! Side effects, targets and pathways are rescored with the evidence scorer
//! and items below the threshold are dropped; survivors are ordered best
//! first. Drugs, caveats, FAERS lists, the PK/PD summary and the source
//! manifest pass through untouched.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ddifuse_rank::relevance::{
    apply_relevance_filter, score_and_rank_pathways, score_and_rank_side_effects, score_and_rank_targets,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::PairContext;

pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    SideEffects,
    Targets,
    Pathways,
}

impl Section {
    pub const ALL: [Self; 3] = [Self::SideEffects, Self::Targets, Self::Pathways];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SideEffects => "side_effects",
            Self::Targets => "targets",
            Self::Pathways => "pathways",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == s.trim())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-term signals the question carries into scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    /// PRR per side-effect term for the pair.
    pub side_effect_prr: HashMap<String, f64>,
    /// Similarity of each side-effect term to the question.
    pub semantic: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterMetadata {
    pub items_before: usize,
    pub items_after: usize,
    /// Sections that lost at least one item.
    pub filtered_sections: Vec<Section>,
    /// `(before - after) / before`, or 0 when there was nothing to filter.
    pub filter_ratio: f64,
}

impl FilterMetadata {
    fn record(&mut self, section: Section, before: usize, after: usize) {
        self.items_before += before;
        self.items_after += after;
        if after < before {
            self.filtered_sections.push(section);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(&mut self) {
        self.filter_ratio = if self.items_before == 0 {
            0.0
        } else {
            (self.items_before - self.items_after) as f64 / self.items_before as f64
        };
    }
}

/// Filter every section of `context`.
#[must_use]
pub fn filter_context_by_relevance(
    context: &PairContext,
    query: &QueryContext,
    min_relevance: f64,
) -> (PairContext, FilterMetadata) {
    filter_context_sections(context, &Section::ALL, query, min_relevance)
}

/// Filter only `sections` of `context`; the others are kept as they are and
/// do not count toward the metadata.
#[must_use]
pub fn filter_context_sections(
    context: &PairContext,
    sections: &[Section],
    query: &QueryContext,
    min_relevance: f64,
) -> (PairContext, FilterMetadata) {
    let mut out = context.clone();
    let mut meta = FilterMetadata::default();
    let wanted: BTreeSet<Section> = sections.iter().copied().collect();

    if wanted.contains(&Section::SideEffects) {
        let signals = &mut out.signals;
        let rank = |items: &[String]| {
            keep(
                score_and_rank_side_effects(items, Some(&query.side_effect_prr), Some(&query.semantic)),
                min_relevance,
            )
        };
        let before = signals.side_effects_a.len() + signals.side_effects_b.len();
        signals.side_effects_a = rank(&signals.side_effects_a);
        signals.side_effects_b = rank(&signals.side_effects_b);
        meta.record(
            Section::SideEffects,
            before,
            signals.side_effects_a.len() + signals.side_effects_b.len(),
        );
    }

    if wanted.contains(&Section::Targets) {
        let overlap = overlap_targets(context);
        let mech = &mut out.mechanistic;
        let before = mech.targets_a.len() + mech.targets_b.len();
        mech.targets_a = keep(score_and_rank_targets(&mech.targets_a, &overlap), min_relevance);
        mech.targets_b = keep(score_and_rank_targets(&mech.targets_b, &overlap), min_relevance);
        meta.record(Section::Targets, before, mech.targets_a.len() + mech.targets_b.len());
    }

    if wanted.contains(&Section::Pathways) {
        let overlap = overlap_pathways(context);
        let mech = &mut out.mechanistic;
        let before = mech.pathways_a.len() + mech.pathways_b.len();
        mech.pathways_a = keep(score_and_rank_pathways(&mech.pathways_a, &overlap), min_relevance);
        mech.pathways_b = keep(score_and_rank_pathways(&mech.pathways_b, &overlap), min_relevance);
        meta.record(Section::Pathways, before, mech.pathways_a.len() + mech.pathways_b.len());
    }

    meta.finish();
    debug!(
        before = meta.items_before,
        after = meta.items_after,
        ratio = meta.filter_ratio,
        "context filtered by relevance"
    );
    (out, meta)
}

fn keep(scored: Vec<(String, f64)>, min_relevance: f64) -> Vec<String> {
    let (items, scores): (Vec<String>, Vec<f64>) = scored.into_iter().unzip();
    apply_relevance_filter(items, &scores, min_relevance, None)
}

/// Targets shared by both drugs: the PD overlap when summarized, otherwise
/// the intersection of the two lists.
fn overlap_targets(context: &PairContext) -> Vec<String> {
    if let Some(pkpd) = &context.pkpd {
        return pkpd.pd.overlap_targets.clone();
    }
    let mech = &context.mechanistic;
    let b: BTreeSet<&String> = mech.targets_b.iter().collect();
    mech.targets_a.iter().filter(|t| b.contains(t)).cloned().collect()
}

fn overlap_pathways(context: &PairContext) -> Vec<String> {
    let mut shared: BTreeSet<String> = context.mechanistic.common_pathways.iter().cloned().collect();
    if let Some(pkpd) = &context.pkpd {
        shared.extend(pkpd.pd.overlap_pathways.iter().cloned());
    }
    shared.into_iter().collect()
}
