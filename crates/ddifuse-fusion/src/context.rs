//! The fused per-pair context.
//!
//! [`PairContext`] is what the engine hands to prompt building and what the
//! context cache stores. Everything in it is plain data; sets are
//! serialized as sorted lists.

use std::collections::{BTreeMap, BTreeSet};

use ddifuse_core::model::{Caveats, MechanisticRecord};
use ddifuse_core::pkpd::PkPdSummary;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::fallback::PotencyEnrichment;

/// Placeholder for an empty FAERS list.
pub const NO_FAERS_EVIDENCE: &str = "No evidence from FAERS.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugInfo {
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub ids: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drugs {
    pub a: DrugInfo,
    pub b: DrugInfo,
}

/// Risk signals from the tabular source. Missing tiers stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularSignals {
    pub prr: Option<f64>,
    pub side_effects_a: Vec<String>,
    pub side_effects_b: Vec<String>,
    pub hepatotoxicity_a: Option<String>,
    pub hepatotoxicity_b: Option<String>,
    pub cardiotoxicity_a: Option<String>,
    pub cardiotoxicity_b: Option<String>,
    pub qt_score_a: Option<f64>,
    pub qt_score_b: Option<f64>,
}

/// One adverse-event term and its report count.
///
/// Deserializes from `{"term": .., "count": ..}` or `[term, count]`; counts
/// may arrive as numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionCount {
    pub term: String,
    pub count: u64,
}

impl ReactionCount {
    pub fn new(term: impl Into<String>, count: u64) -> Self {
        Self {
            term: term.into(),
            count,
        }
    }

    /// Lenient parse of one row; `None` for shapes that carry no usable
    /// term and count.
    #[must_use]
    pub fn from_value(row: &Value) -> Option<Self> {
        let (term, count) = match row {
            Value::Array(items) if items.len() >= 2 => (&items[0], &items[1]),
            Value::Object(map) => (map.get("term")?, map.get("count")?),
            _ => return None,
        };
        let term = match term {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            _ => return None,
        };
        Some(Self::new(term, coerce_count(count)?))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for ReactionCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).ok_or_else(|| serde::de::Error::custom("expected [term, count] or {term, count}"))
    }
}

/// Deserialize a list of reaction rows, skipping rows that don't parse.
fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<ReactionCount>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = rows.len();
    let parsed: Vec<ReactionCount> = rows.iter().filter_map(ReactionCount::from_value).collect();
    if parsed.len() < total {
        debug!(skipped = total - parsed.len(), "skipped malformed FAERS rows");
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaersSignals {
    #[serde(default, deserialize_with = "lenient_rows")]
    pub top_reactions_a: Vec<ReactionCount>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub top_reactions_b: Vec<ReactionCount>,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub combo_reactions: Vec<ReactionCount>,
}

/// Display strings for the three FAERS lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaersSummary {
    pub a: String,
    pub b: String,
    pub combo: String,
}

fn format_reactions(rows: &[ReactionCount], k: usize) -> String {
    if rows.is_empty() {
        return NO_FAERS_EVIDENCE.to_string();
    }
    rows.iter()
        .take(k)
        .map(|r| format!("{} (n={})", r.term, r.count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"term (n=count), ..."` for the first `k` rows of each list.
#[must_use]
pub fn topk_faers(faers: &FaersSignals, k: usize) -> FaersSummary {
    FaersSummary {
        a: format_reactions(&faers.top_reactions_a, k),
        b: format_reactions(&faers.top_reactions_b, k),
        combo: format_reactions(&faers.combo_reactions, k),
    }
}

/// Potency enrichment per side, present only when the potency source ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotencyPair {
    #[serde(default)]
    pub a: Option<PotencyEnrichment>,
    #[serde(default)]
    pub b: Option<PotencyEnrichment>,
}

impl PotencyPair {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.a.is_none() && self.b.is_none()
    }
}

/// Everything known about a drug pair after fusion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairContext {
    pub drugs: Drugs,
    #[serde(default)]
    pub signals: TabularSignals,
    #[serde(default)]
    pub mechanistic: MechanisticRecord,
    #[serde(default)]
    pub faers: FaersSignals,
    /// Source role → datasets it drew on.
    #[serde(default)]
    pub sources: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub caveats: Caveats,
    #[serde(default)]
    pub pkpd: Option<PkPdSummary>,
    #[serde(default, skip_serializing_if = "PotencyPair::is_empty")]
    pub potency: PotencyPair,
}

impl PairContext {
    /// Enzymes either drug touches, across roles.
    #[must_use]
    pub fn enzymes_mentioned(&self) -> BTreeSet<&str> {
        let mut all = self.mechanistic.enzymes.a.all();
        all.extend(self.mechanistic.enzymes.b.all());
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reaction_rows_parse_leniently() {
        let faers: FaersSignals = serde_json::from_value(json!({
            "top_reactions_a": [["bleeding", 120], {"term": "bruising", "count": "40"}, ["x"], 7, [null, 3]],
            "top_reactions_b": [{"term": "nausea", "count": 12.0}],
            "combo_reactions": null,
        }))
        .expect("parse");
        assert_eq!(faers.top_reactions_a, vec![
            ReactionCount::new("bleeding", 120),
            ReactionCount::new("bruising", 40),
        ]);
        assert_eq!(faers.top_reactions_b, vec![ReactionCount::new("nausea", 12)]);
        assert!(faers.combo_reactions.is_empty());
    }

    #[test]
    fn topk_formats_and_caps() {
        let faers = FaersSignals {
            top_reactions_a: vec![
                ReactionCount::new("bleeding", 120),
                ReactionCount::new("bruising", 40),
                ReactionCount::new("anaemia", 9),
            ],
            ..FaersSignals::default()
        };
        let summary = topk_faers(&faers, 2);
        assert_eq!(summary.a, "bleeding (n=120), bruising (n=40)");
        assert_eq!(summary.b, NO_FAERS_EVIDENCE);
        assert_eq!(summary.combo, NO_FAERS_EVIDENCE);
    }

    #[test]
    fn context_round_trips_through_json() {
        let mut ctx = PairContext::default();
        ctx.drugs.a.name = "warfarin".into();
        ctx.caveats.push("partial data");
        ctx.mechanistic.enzymes.a.inhibitor.insert("cyp2c9".into());
        let value = serde_json::to_value(&ctx).expect("ser");
        assert!(value.get("potency").is_none());
        let back: PairContext = serde_json::from_value(value).expect("de");
        assert_eq!(back, ctx);
        assert_eq!(back.enzymes_mentioned(), BTreeSet::from(["cyp2c9"]));
    }
}
