//! Secondary and tertiary enzyme evidence.
//!
//! When the primary source reports no enzyme roles for a drug, the engine
//! asks the structured source for its enzyme profile and derives roles from
//! it ([`derive_roles`]). If potency data is enabled, bioactivity
//! measurements are classified by strength and cross-checked against the
//! roles the structured source reported ([`enrich_with_potency`]).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use ddifuse_core::EnzymeRoleSet;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

static CYP_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:cyp|cytochrome\s*p450)\s*(\d+[a-z]?\d*)").expect("CYP pattern must compile")
});

/// Canonical CYP token (`cyp3a4`) for an enzyme or target name, if it
/// names a cytochrome P450 isoform.
#[must_use]
pub fn cyp_token(name: &str) -> Option<String> {
    CYP_FAMILY
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("cyp{}", m.as_str().to_lowercase()))
}

/// Action labels the structured source attached to one enzyme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnzymeActions {
    pub enzyme: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Per-drug enzyme listing from the structured source.
///
/// `action_map` is authoritative when present. Older exports only carry the
/// flat `enzymes` and `enzyme_actions` lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnzymeProfile {
    pub enzymes: Vec<String>,
    pub enzyme_actions: Vec<String>,
    pub action_map: Vec<EnzymeActions>,
}

impl EnzymeProfile {
    /// The action map, reconstructed from the flat lists when missing.
    #[must_use]
    pub fn resolved_action_map(&self) -> Vec<EnzymeActions> {
        if self.action_map.is_empty() {
            reconstruct_action_map(&self.enzymes, &self.enzyme_actions)
        } else {
            self.action_map.clone()
        }
    }
}

/// Pair flat enzyme and action lists.
///
/// The flat lists carry no per-enzyme association, so the pairing is an
/// approximation: with no more actions than enzymes every enzyme gets the
/// first action; with more, actions are dealt out round-robin and the
/// surplus is lost.
#[must_use]
pub fn reconstruct_action_map(enzymes: &[String], actions: &[String]) -> Vec<EnzymeActions> {
    enzymes
        .iter()
        .enumerate()
        .map(|(i, enzyme)| {
            let action = if actions.is_empty() {
                None
            } else if actions.len() <= enzymes.len() {
                actions.first()
            } else {
                actions.get(i % actions.len())
            };
            EnzymeActions {
                enzyme: enzyme.clone(),
                actions: action.into_iter().cloned().collect(),
            }
        })
        .collect()
}

/// Roles for the CYP enzymes in `profile`. Non-CYP enzymes are ignored.
#[must_use]
pub fn derive_roles(profile: &EnzymeProfile) -> EnzymeRoleSet {
    let mut roles = EnzymeRoleSet::default();
    for entry in profile.resolved_action_map() {
        let Some(token) = cyp_token(&entry.enzyme) else {
            continue;
        };
        for action in &entry.actions {
            let action = action.to_lowercase();
            if action.contains("substrate") {
                roles.substrate.insert(token.clone());
            }
            if action.contains("inhibit") {
                roles.inhibitor.insert(token.clone());
            }
            if action.contains("induc") {
                roles.inducer.insert(token.clone());
            }
        }
    }
    roles
}

/// One bioactivity record. Values are in µM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotencyMeasurement {
    pub target_name: String,
    /// `Ki`, `IC50`, `EC50`, ...
    pub standard_type: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotencyAction {
    StrongInhibitor,
    ModerateInhibitor,
    WeakInhibitor,
    Substrate,
    Unknown,
}

impl PotencyAction {
    /// Ki/IC50 below 1 µM is strong, below 10 µM moderate, otherwise weak.
    /// EC50 implies a substrate. Anything else, or a missing value, is
    /// unknown.
    #[must_use]
    pub fn classify(standard_type: &str, value: Option<f64>) -> Self {
        let Some(value) = value else {
            return Self::Unknown;
        };
        match standard_type {
            "Ki" | "IC50" if value < 1.0 => Self::StrongInhibitor,
            "Ki" | "IC50" if value < 10.0 => Self::ModerateInhibitor,
            "Ki" | "IC50" => Self::WeakInhibitor,
            "EC50" => Self::Substrate,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn is_inhibitor(self) -> bool {
        matches!(
            self,
            Self::StrongInhibitor | Self::ModerateInhibitor | Self::WeakInhibitor
        )
    }
}

/// A measurement resolved to an enzyme token and an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnzymeInteraction {
    pub enzyme: String,
    pub action: PotencyAction,
}

/// Measurements against CYP targets, classified. Others are skipped.
#[must_use]
pub fn classify_measurements(measurements: &[PotencyMeasurement]) -> Vec<EnzymeInteraction> {
    measurements
        .iter()
        .filter_map(|m| {
            cyp_token(&m.target_name).map(|enzyme| EnzymeInteraction {
                enzyme,
                action: PotencyAction::classify(&m.standard_type, m.value),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnzymeStrength {
    pub strong: BTreeSet<String>,
    pub moderate: BTreeSet<String>,
    pub weak: BTreeSet<String>,
}

impl EnzymeStrength {
    /// True when no measurement graded an inhibitor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strong.is_empty() && self.moderate.is_empty() && self.weak.is_empty()
    }
}

/// Agreement between potency data and the structured source's roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub found: bool,
    /// Enzymes the structured source lists as inhibited.
    pub matches: BTreeSet<String>,
    /// Enzymes the structured source does not list under any role.
    pub mismatches: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotencyEnrichment {
    pub enzyme_strength: EnzymeStrength,
    pub validation: CrossValidation,
}

/// Classify `interactions` by strength and cross-check against `roles`.
#[must_use]
pub fn enrich_with_potency(interactions: &[EnzymeInteraction], roles: &EnzymeRoleSet) -> PotencyEnrichment {
    let mut out = PotencyEnrichment::default();
    if interactions.is_empty() {
        return out;
    }
    out.validation.found = true;

    let known = roles.all();
    for EnzymeInteraction { enzyme, action } in interactions {
        match action {
            PotencyAction::StrongInhibitor => out.enzyme_strength.strong.insert(enzyme.clone()),
            PotencyAction::ModerateInhibitor => out.enzyme_strength.moderate.insert(enzyme.clone()),
            PotencyAction::WeakInhibitor => out.enzyme_strength.weak.insert(enzyme.clone()),
            PotencyAction::Substrate | PotencyAction::Unknown => false,
        };
        if roles.inhibitor.contains(enzyme) {
            out.validation.matches.insert(enzyme.clone());
        } else if !known.contains(enzyme.as_str()) {
            out.validation.mismatches.insert(enzyme.clone());
        }
    }
    out
}

/// Roles implied by potency data alone.
#[must_use]
pub fn roles_from_potency(interactions: &[EnzymeInteraction]) -> EnzymeRoleSet {
    let mut roles = EnzymeRoleSet::default();
    for interaction in interactions {
        if interaction.action.is_inhibitor() {
            roles.inhibitor.insert(interaction.enzyme.clone());
        } else if interaction.action == PotencyAction::Substrate {
            roles.substrate.insert(interaction.enzyme.clone());
        }
    }
    roles
}

/// Accept numbers and numeric strings; anything else reads as `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}
