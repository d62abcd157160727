//! File-backed sources.
//!
//! An [`OfflineBundle`] is a recorded snapshot of everything the upstream
//! sources returned for one or more drugs, stored as a single JSON document.
//! It implements every collaborator trait so the engine can be replayed
//! without network or database access. Drug lookups ignore ASCII case.
//!
//! ```json
//! {
//!   "pair": ["warfarin", "fluconazole"],
//!   "mechanistic": { "targets_a": ["VKORC1"], "enzymes": { "b": { "inhibitor": ["CYP2C9"] } } },
//!   "structured": { "warfarin": { "targets": ["VKORC1"], "enzymes": ["CYP2C9"], "enzyme_actions": ["substrate"] } },
//!   "potency": { "fluconazole": [{ "target_name": "CYP2C9", "standard_type": "Ki", "value": 7.0 }] },
//!   "tabular": { "pair_prr": 2.5, "side_effects": { "warfarin": ["bleeding"] } },
//!   "adverse_events": { "top_reactions": { "warfarin": [["bleeding", 120]] }, "combination": [] },
//!   "drug_index": { "names": ["warfarin", "fluconazole"], "similar": { "coumadin": [["warfarin", 0.92]] } },
//!   "datasets": { "tabular": ["TwoSides"] }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use ddifuse_core::model::SourceBlock;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::context::ReactionCount;
use crate::fallback::{EnzymeProfile, PotencyMeasurement};
use crate::source::{
    AdverseEventSource, DrugIndex, MechanisticSource, PotencySource, SourceError, SourceResult, StructuredSource,
    TabularSource,
};

const NAME: &str = "offline bundle";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StructuredEntry {
    pub targets: Vec<String>,
    #[serde(flatten)]
    pub profile: EnzymeProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TabularRecord {
    pub pair_prr: Option<f64>,
    pub hepatotoxicity: BTreeMap<String, String>,
    pub cardiotoxicity: BTreeMap<String, String>,
    pub qt_score: BTreeMap<String, f64>,
    pub side_effects: BTreeMap<String, Vec<String>>,
    pub side_effect_prr: HashMap<String, f64>,
}

/// Report rows are kept raw and parsed leniently on access.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdverseEventRecord {
    pub top_reactions: BTreeMap<String, Vec<Value>>,
    pub combination: Vec<Value>,
}

/// Known drug names plus precomputed similarity neighbours per query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DrugIndexRecord {
    pub names: Vec<String>,
    pub similar: BTreeMap<String, Vec<(String, f64)>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OfflineBundle {
    /// The pair the bundle was recorded for, if any.
    pub pair: Option<(String, String)>,
    pub mechanistic: Option<SourceBlock>,
    pub structured: Option<BTreeMap<String, StructuredEntry>>,
    pub potency: Option<BTreeMap<String, Vec<PotencyMeasurement>>>,
    pub tabular: Option<TabularRecord>,
    pub adverse_events: Option<AdverseEventRecord>,
    pub drug_index: Option<DrugIndexRecord>,
    /// Source role → dataset names, for the context's source manifest.
    pub datasets: BTreeMap<String, Vec<String>>,
}

impl OfflineBundle {
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a valid bundle.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read bundle {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse bundle {}", path.display()))
    }

    /// True when `(a, b)` names the recorded pair with its sides exchanged.
    #[must_use]
    pub fn is_reversed(&self, a: &str, b: &str) -> bool {
        let same = |x: &str, y: &str| x.trim().eq_ignore_ascii_case(y.trim());
        self.pair.as_ref().is_some_and(|(first, second)| {
            same(first, b) && same(second, a) && !same(first, second)
        })
    }

    fn datasets_for(&self, role: &str) -> Vec<String> {
        self.datasets.get(role).cloned().unwrap_or_default()
    }

    fn section<'a, T>(section: Option<&'a T>, label: &str) -> SourceResult<&'a T> {
        section.ok_or_else(|| SourceError::unavailable(NAME, format!("no {label} section recorded")))
    }
}

fn lookup<'a, V>(map: &'a BTreeMap<String, V>, drug: &str) -> Option<&'a V> {
    map.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(drug.trim()))
        .map(|(_, value)| value)
}

fn parse_rows(rows: &[Value], k: usize) -> Vec<ReactionCount> {
    rows.iter().filter_map(ReactionCount::from_value).take(k).collect()
}

impl MechanisticSource for OfflineBundle {
    /// The recorded block, with its sides exchanged when `(a, b)` is the
    /// recorded pair in reverse order.
    fn mechanistic(&self, a: &str, b: &str) -> SourceResult<SourceBlock> {
        let block = Self::section(self.mechanistic.as_ref(), "mechanistic")?.clone();
        if self.is_reversed(a, b) {
            debug!(a, b, "requested pair reverses the recorded pair");
            return Ok(block.swapped());
        }
        Ok(block)
    }

    fn datasets(&self) -> Vec<String> {
        self.datasets_for("mechanistic")
    }
}

impl StructuredSource for OfflineBundle {
    fn targets(&self, drug: &str) -> SourceResult<Vec<String>> {
        let entries = Self::section(self.structured.as_ref(), "structured")?;
        Ok(lookup(entries, drug).map(|e| e.targets.clone()).unwrap_or_default())
    }

    fn enzyme_profile(&self, drug: &str) -> SourceResult<EnzymeProfile> {
        let entries = Self::section(self.structured.as_ref(), "structured")?;
        lookup(entries, drug)
            .map(|e| e.profile.clone())
            .ok_or_else(|| SourceError::NotFound {
                source_name: NAME.to_string(),
                drug: drug.to_string(),
            })
    }

    fn datasets(&self) -> Vec<String> {
        self.datasets_for("structured")
    }
}

impl PotencySource for OfflineBundle {
    fn measurements(&self, drug: &str) -> SourceResult<Vec<PotencyMeasurement>> {
        let entries = Self::section(self.potency.as_ref(), "potency")?;
        Ok(lookup(entries, drug).cloned().unwrap_or_default())
    }

    fn datasets(&self) -> Vec<String> {
        self.datasets_for("potency")
    }
}

impl TabularSource for OfflineBundle {
    fn pair_prr(&self, _a: &str, _b: &str) -> SourceResult<Option<f64>> {
        Ok(Self::section(self.tabular.as_ref(), "tabular")?.pair_prr)
    }

    fn hepatotoxicity(&self, drug: &str) -> SourceResult<Option<String>> {
        let tabular = Self::section(self.tabular.as_ref(), "tabular")?;
        Ok(lookup(&tabular.hepatotoxicity, drug).cloned())
    }

    fn cardiotoxicity(&self, drug: &str) -> SourceResult<Option<String>> {
        let tabular = Self::section(self.tabular.as_ref(), "tabular")?;
        Ok(lookup(&tabular.cardiotoxicity, drug).cloned())
    }

    fn qt_score(&self, drug: &str) -> SourceResult<Option<f64>> {
        let tabular = Self::section(self.tabular.as_ref(), "tabular")?;
        Ok(lookup(&tabular.qt_score, drug).copied())
    }

    fn side_effects(&self, drug: &str) -> SourceResult<Vec<String>> {
        let tabular = Self::section(self.tabular.as_ref(), "tabular")?;
        Ok(lookup(&tabular.side_effects, drug).cloned().unwrap_or_default())
    }

    fn side_effect_prr(&self, _a: &str, _b: &str) -> SourceResult<HashMap<String, f64>> {
        Ok(Self::section(self.tabular.as_ref(), "tabular")?.side_effect_prr.clone())
    }

    fn datasets(&self) -> Vec<String> {
        self.datasets_for("tabular")
    }
}

impl AdverseEventSource for OfflineBundle {
    fn top_reactions(&self, drug: &str, k: usize) -> SourceResult<Vec<ReactionCount>> {
        let record = Self::section(self.adverse_events.as_ref(), "adverse_events")?;
        Ok(lookup(&record.top_reactions, drug).map(|rows| parse_rows(rows, k)).unwrap_or_default())
    }

    fn combination_reactions(&self, _a: &str, _b: &str, k: usize) -> SourceResult<Vec<ReactionCount>> {
        let record = Self::section(self.adverse_events.as_ref(), "adverse_events")?;
        Ok(parse_rows(&record.combination, k))
    }

    fn datasets(&self) -> Vec<String> {
        self.datasets_for("adverse_events")
    }
}

/// Exact name 1.0, prefix 0.8, substring 0.5; ASCII case is ignored.
fn keyword_score(name: &str, query: &str) -> Option<f64> {
    let name = name.to_ascii_lowercase();
    let query = query.trim().to_ascii_lowercase();
    if query.is_empty() {
        None
    } else if name == query {
        Some(1.0)
    } else if name.starts_with(&query) {
        Some(0.8)
    } else if name.contains(&query) {
        Some(0.5)
    } else {
        None
    }
}

impl DrugIndex for OfflineBundle {
    fn keyword_search(&self, query: &str, k: usize) -> SourceResult<Vec<(String, f64)>> {
        let index = Self::section(self.drug_index.as_ref(), "drug_index")?;
        let mut hits: Vec<(String, f64)> = index
            .names
            .iter()
            .filter_map(|name| keyword_score(name, query).map(|score| (name.clone(), score)))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(k);
        Ok(hits)
    }

    fn semantic_search(&self, query: &str, k: usize, threshold: f64) -> SourceResult<Vec<(String, f64)>> {
        let index = Self::section(self.drug_index.as_ref(), "drug_index")?;
        Ok(lookup(&index.similar, query)
            .map(|rows| {
                rows.iter()
                    .filter(|(_, score)| *score >= threshold)
                    .take(k)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
