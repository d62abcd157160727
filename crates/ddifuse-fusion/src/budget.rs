//! Prompt block formatting and character-budget allocation.
//!
//! A [`PairContext`] is rendered into seven prioritized text blocks. Blocks
//! are admitted in ascending priority while they fit the mode's budget. A
//! block that does not fit is dropped when short, or clipped to its first
//! 200 characters plus `" …"` (counted as 203) when longer than 220.
//! Dropped blocks come back as fixed placeholders so every key is always
//! present in [`PromptBlocks`].

use std::collections::BTreeMap;
use std::fmt;

use ddifuse_core::EnzymeRoleSet;
use ddifuse_core::config::BudgetConfig;
use ddifuse_core::error::ErrorCode;
use ddifuse_core::pkpd::pd::{DEFAULT_PATHWAY_TOPK, DEFAULT_TARGET_TOPK};
use ddifuse_core::pkpd::{OverlapResult, detect_overlaps, pd_overlap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::context::{NO_FAERS_EVIDENCE, PairContext, TabularSignals, topk_faers};

pub const DRUG_A: &str = "DRUG_A";
pub const DRUG_B: &str = "DRUG_B";
pub const PK_SUMMARY: &str = "PK_SUMMARY";
pub const PD_SUMMARY: &str = "PD_SUMMARY";
pub const FAERS_SUMMARY: &str = "FAERS_SUMMARY";
pub const RISK_FLAGS: &str = "RISK_FLAGS";
pub const EVIDENCE_TABLE: &str = "EVIDENCE_TABLE";
pub const SOURCES: &str = "SOURCES";
pub const CAVEATS: &str = "CAVEATS";

/// Every key a [`PromptBlocks`] carries.
pub const PROMPT_KEYS: [&str; 9] = [
    DRUG_A,
    DRUG_B,
    PK_SUMMARY,
    PD_SUMMARY,
    FAERS_SUMMARY,
    RISK_FLAGS,
    EVIDENCE_TABLE,
    SOURCES,
    CAVEATS,
];

/// Blocks longer than this are clipped rather than dropped on overflow.
const CLIP_THRESHOLD: usize = 220;
const CLIP_KEEP: usize = 200;
const CLIP_SUFFIX: &str = " …";
/// Budget charge for a clipped block.
pub const CLIPPED_COST: usize = 203;

const FAERS_BLOCK_K: usize = 5;
const TARGET_CEILING: usize = 8;
const PATHWAY_CEILING: usize = 6;
const COMMON_PATHWAY_CEILING: usize = 8;
const FAERS_CEILING: usize = 5;

const PK_PRIORITY_OVERLAP: u32 = 0;
const PD_PRIORITY_OVERLAP: u32 = 1;
const PK_PRIORITY: u32 = 3;
const PD_PRIORITY: u32 = 4;
const FAERS_PRIORITY: u32 = 5;
const FLAGS_PRIORITY: u32 = 10;
const TABLE_PRIORITY: u32 = 20;
const SOURCES_PRIORITY: u32 = 50;
const CAVEATS_PRIORITY: u32 = 60;

/// Audience of the rendered prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Doctor,
    Patient,
    Pharma,
}

impl Mode {
    /// Parse a mode name or alias. Unknown names fall back to `Patient`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "doc" | "doctor" | "physician" | "clinician" => Self::Doctor,
            "pharma" | "pv" | "safety" => Self::Pharma,
            _ => Self::Patient,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
            Self::Pharma => "pharma",
        }
    }

    /// Character budget for this audience.
    #[must_use]
    pub const fn budget(self, config: &BudgetConfig) -> usize {
        match self {
            Self::Doctor | Self::Pharma => config.clinical_chars,
            Self::Patient => config.patient_chars,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labeled text block competing for budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub label: &'static str,
    pub priority: u32,
    pub text: String,
}

impl Block {
    pub fn new(label: &'static str, priority: u32, text: impl Into<String>) -> Self {
        Self {
            label,
            priority,
            text: text.into(),
        }
    }

    /// Length in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Result of packing blocks into a budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub kept: BTreeMap<&'static str, String>,
    pub used: usize,
    /// Labels clipped to fit, in admission order.
    pub clipped: Vec<&'static str>,
    /// Labels dropped for lack of room, in admission order.
    pub dropped: Vec<&'static str>,
}

impl Allocation {
    #[must_use]
    pub fn truncated(&self) -> bool {
        !self.clipped.is_empty() || !self.dropped.is_empty()
    }
}

/// Admit blocks in ascending priority (stable) while they fit.
#[must_use]
pub fn allocate(mut blocks: Vec<Block>, budget: usize) -> Allocation {
    blocks.sort_by_key(|b| b.priority);

    let mut out = Allocation::default();
    for block in blocks {
        let len = block.len();
        if out.used + len <= budget {
            out.used += len;
            out.kept.insert(block.label, block.text);
        } else if len > CLIP_THRESHOLD {
            let head: String = block.text.chars().take(CLIP_KEEP).collect();
            out.kept.insert(block.label, format!("{}{CLIP_SUFFIX}", head.trim_end()));
            out.used += CLIPPED_COST;
            out.clipped.push(block.label);
        } else {
            out.dropped.push(block.label);
        }
    }
    out
}

/// The rendered prompt inputs: one text per key in [`PROMPT_KEYS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptBlocks {
    pub mode: Mode,
    pub budget: usize,
    pub used: usize,
    /// Set when a block was dropped or clipped, or when an input list was
    /// longer than its display ceiling.
    pub truncated: bool,
    pub blocks: BTreeMap<&'static str, String>,
}

impl PromptBlocks {
    /// Text for `key`; empty for keys outside [`PROMPT_KEYS`].
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.blocks.get(key).map_or("", String::as_str)
    }
}

/// Placeholder shown for a block that did not make the budget.
#[must_use]
pub fn placeholder(key: &str) -> &'static str {
    match key {
        PK_SUMMARY => "(no PK evidence)",
        PD_SUMMARY => "(no PD evidence)",
        FAERS_SUMMARY => NO_FAERS_EVIDENCE,
        RISK_FLAGS => "(no tabular risk flags)",
        EVIDENCE_TABLE => "(no evidence table)",
        SOURCES => "(no sources listed)",
        CAVEATS => "(none)",
        _ => "",
    }
}

/// Render `context` for `mode` within the configured budget.
#[must_use]
pub fn build_prompt_blocks(context: &PairContext, mode: Mode, config: &BudgetConfig) -> PromptBlocks {
    let budget = mode.budget(config);
    let allocation = allocate(context_blocks(context), budget);
    let overflow = exceeds_ceilings(context);
    let truncated = allocation.truncated() || overflow;
    if truncated {
        debug!(
            code = %ErrorCode::BudgetOverflow,
            %mode,
            budget,
            used = allocation.used,
            clipped = ?allocation.clipped,
            dropped = ?allocation.dropped,
            overflow,
            "prompt context truncated"
        );
    }

    let mut blocks = allocation.kept;
    blocks.insert(DRUG_A, context.drugs.a.name.clone());
    blocks.insert(DRUG_B, context.drugs.b.name.clone());
    for key in PROMPT_KEYS {
        blocks.entry(key).or_insert_with(|| placeholder(key).to_string());
    }

    PromptBlocks {
        mode,
        budget,
        used: allocation.used,
        truncated,
        blocks,
    }
}

/// The seven budgeted blocks for `context`, unsorted.
#[must_use]
pub fn context_blocks(context: &PairContext) -> Vec<Block> {
    vec![
        pk_block(context),
        pd_block(context),
        Block::new(FAERS_SUMMARY, FAERS_PRIORITY, faers_text(context)),
        Block::new(RISK_FLAGS, FLAGS_PRIORITY, risk_flags_text(&context.signals)),
        Block::new(EVIDENCE_TABLE, TABLE_PRIORITY, evidence_table_text(context)),
        Block::new(SOURCES, SOURCES_PRIORITY, sources_text(&context.sources)),
        Block::new(CAVEATS, CAVEATS_PRIORITY, caveats_text(context)),
    ]
}

/// Whether any raw list is longer than the prompt shows.
#[must_use]
pub fn exceeds_ceilings(context: &PairContext) -> bool {
    let m = &context.mechanistic;
    let f = &context.faers;
    m.targets_a.len() > TARGET_CEILING
        || m.targets_b.len() > TARGET_CEILING
        || m.pathways_a.len() > PATHWAY_CEILING
        || m.pathways_b.len() > PATHWAY_CEILING
        || m.common_pathways.len() > COMMON_PATHWAY_CEILING
        || f.top_reactions_a.len() > FAERS_CEILING
        || f.top_reactions_b.len() > FAERS_CEILING
        || f.combo_reactions.len() > FAERS_CEILING
}

fn pk_block(context: &PairContext) -> Block {
    if let Some(pkpd) = &context.pkpd {
        let priority = if pkpd.overlaps.has_modulation() {
            PK_PRIORITY_OVERLAP
        } else {
            PK_PRIORITY
        };
        return Block::new(PK_SUMMARY, priority, pkpd.pk_summary.clone());
    }

    let roles = &context.mechanistic.enzymes;
    let overlaps = detect_overlaps(roles);
    let priority = if overlaps.has_modulation() {
        PK_PRIORITY_OVERLAP
    } else {
        PK_PRIORITY
    };
    let text = format!(
        "{}. {}. Key PK overlap: {}",
        role_listing("A", &roles.a),
        role_listing("B", &roles.b),
        overlap_listing(&overlaps)
    );
    Block::new(PK_SUMMARY, priority, text)
}

fn role_listing(side: &str, roles: &EnzymeRoleSet) -> String {
    format!(
        "{side} substrate={}; {side} inhibitor={}; {side} inducer={}",
        join_or(roles.substrate.iter(), "none"),
        join_or(roles.inhibitor.iter(), "none"),
        join_or(roles.inducer.iter(), "none"),
    )
}

fn overlap_listing(overlaps: &OverlapResult) -> String {
    let mut parts = Vec::new();
    if !overlaps.inhibition.is_empty() {
        parts.push(format!("inhibition at {}", join_or(overlaps.inhibition.iter(), "")));
    }
    if !overlaps.induction.is_empty() {
        parts.push(format!("induction at {}", join_or(overlaps.induction.iter(), "")));
    }
    if parts.is_empty() {
        "none detected".to_string()
    } else {
        parts.join(", ")
    }
}

fn pd_block(context: &PairContext) -> Block {
    let common = &context.mechanistic.common_pathways;
    if let Some(pkpd) = &context.pkpd {
        let has_overlap =
            !common.is_empty() || !pkpd.pd.overlap_targets.is_empty() || !pkpd.pd.overlap_pathways.is_empty();
        let priority = if has_overlap { PD_PRIORITY_OVERLAP } else { PD_PRIORITY };
        return Block::new(PD_SUMMARY, priority, pkpd.pd_summary.clone());
    }

    let m = &context.mechanistic;
    let pd = pd_overlap(
        &m.targets_a,
        &m.targets_b,
        &m.pathways_a,
        &m.pathways_b,
        DEFAULT_TARGET_TOPK,
        DEFAULT_PATHWAY_TOPK,
    );
    let pathways = if common.is_empty() {
        "No common pathways found".to_string()
    } else {
        format!("Common pathways: {}", join_or(common.iter().take(COMMON_PATHWAY_CEILING), ""))
    };
    let targets = if pd.overlap_targets.is_empty() {
        "No overlapping targets found".to_string()
    } else {
        format!(
            "Overlapping targets: {}",
            join_or(pd.overlap_targets.iter().take(TARGET_CEILING), "")
        )
    };
    let priority = if common.is_empty() && pd.overlap_targets.is_empty() {
        PD_PRIORITY
    } else {
        PD_PRIORITY_OVERLAP
    };
    Block::new(PD_SUMMARY, priority, format!("{pathways}; {targets}"))
}

fn faers_text(context: &PairContext) -> String {
    let summary = topk_faers(&context.faers, FAERS_BLOCK_K);
    format!(
        "Drug A: {} | Drug B: {} | Combo: {}",
        summary.a, summary.b, summary.combo
    )
}

fn risk_flags_text(signals: &TabularSignals) -> String {
    let tier = |t: &Option<String>| t.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or("unknown").to_string();
    let number = |v: Option<f64>| v.map_or_else(|| "NA".to_string(), |v| format!("{v}"));
    [
        format!("PRR(pair)={}", number(signals.prr)),
        format!("DILI(A)={}", tier(&signals.hepatotoxicity_a)),
        format!("DILI(B)={}", tier(&signals.hepatotoxicity_b)),
        format!("DICT(A)={}", tier(&signals.cardiotoxicity_a)),
        format!("DICT(B)={}", tier(&signals.cardiotoxicity_b)),
        format!("DIQT(A)={}", number(signals.qt_score_a)),
        format!("DIQT(B)={}", number(signals.qt_score_b)),
    ]
    .join(", ")
}

fn evidence_table_text(context: &PairContext) -> String {
    let m = &context.mechanistic;
    let ids = |ids: &BTreeMap<String, Value>| {
        if ids.is_empty() {
            return "(no IDs)".to_string();
        }
        ids.iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join("; ")
    };
    [
        format!("A IDs: {}", ids(&context.drugs.a.ids)),
        format!("B IDs: {}", ids(&context.drugs.b.ids)),
        format!("A targets: {}", join_or(m.targets_a.iter().take(TARGET_CEILING), "(none)")),
        format!("B targets: {}", join_or(m.targets_b.iter().take(TARGET_CEILING), "(none)")),
        format!("A pathways: {}", join_or(m.pathways_a.iter().take(PATHWAY_CEILING), "(none)")),
        format!("B pathways: {}", join_or(m.pathways_b.iter().take(PATHWAY_CEILING), "(none)")),
    ]
    .join(" | ")
}

fn sources_text(sources: &BTreeMap<String, Vec<String>>) -> String {
    if sources.is_empty() {
        return "(none)".to_string();
    }
    sources
        .iter()
        .map(|(role, datasets)| format!("{role}: {}", join_or(datasets.iter(), "(none)")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn caveats_text(context: &PairContext) -> String {
    join_or_sep(context.caveats.iter(), "; ", "(none)")
}

fn join_or<'a>(items: impl Iterator<Item = &'a String>, empty: &str) -> String {
    join_or_sep(items, ", ", empty)
}

fn join_or_sep<'a>(items: impl Iterator<Item = &'a String>, sep: &str, empty: &str) -> String {
    let parts: Vec<&str> = items.map(String::as_str).collect();
    if parts.is_empty() {
        empty.to_string()
    } else {
        parts.join(sep)
    }
}
