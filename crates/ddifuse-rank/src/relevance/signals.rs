use serde::{Deserialize, Serialize};

/// Categorical risk reported by a tabular risk source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    /// Parse a source label. `severe` counts as high, `moderate` as medium.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "severe" => Some(Self::High),
            "medium" | "moderate" => Some(Self::Medium),
            "low" | "minor" | "none" => Some(Self::Low),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    const fn contribution(self) -> f64 {
        match self {
            Self::High => 2.0,
            Self::Medium => 1.0,
            Self::Low => 0.0,
        }
    }
}

/// Everything the scorer looks at. Absent signals contribute nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelevanceSignals {
    pub canonical_interaction: bool,
    pub prr: Option<f64>,
    pub pathway_overlap: bool,
    pub target_overlap: bool,
    pub enzyme_inhibition: bool,
    pub enzyme_induction: bool,
    pub shared_substrate: bool,
    pub report_count: Option<u64>,
    /// One entry per risk source that reported a tier.
    pub risk_tiers: Vec<RiskTier>,
    pub secondary_risk: Option<f64>,
    pub semantic_similarity: Option<f64>,
    pub pair_specific: bool,
}

const fn flag(on: bool, weight: f64) -> f64 {
    if on { weight } else { 0.0 }
}

/// First weight whose threshold `value` strictly exceeds.
fn tiered(value: Option<f64>, tiers: &[(f64, f64)]) -> f64 {
    value.map_or(0.0, |v| {
        tiers
            .iter()
            .find(|(threshold, _)| v > *threshold)
            .map_or(0.0, |(_, weight)| *weight)
    })
}

/// Additive relevance score.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_signals(s: &RelevanceSignals) -> f64 {
    let mut score = flag(s.canonical_interaction, 10.0);
    score += tiered(s.prr, &[(2.0, 5.0), (1.5, 2.0), (1.0, 0.5)]);
    score += flag(s.pathway_overlap, 3.0) + flag(s.target_overlap, 2.0);
    score += flag(s.enzyme_inhibition, 4.0)
        + flag(s.enzyme_induction, 3.0)
        + flag(s.shared_substrate, 1.5);
    score += tiered(
        s.report_count.map(|c| c as f64),
        &[(1000.0, 2.0), (100.0, 1.0), (10.0, 0.5)],
    );
    score += s.risk_tiers.iter().map(|t| t.contribution()).sum::<f64>();
    score += tiered(s.secondary_risk, &[(0.7, 1.5), (0.4, 0.5)]);
    score += tiered(s.semantic_similarity, &[(0.8, 1.0), (0.6, 0.5)]);
    score + flag(s.pair_specific, 1.0)
}

/// A piece of evidence, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceItem {
    SideEffect {
        name: String,
        #[serde(default)]
        prr: Option<f64>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        semantic_similarity: Option<f64>,
        #[serde(default)]
        pair_specific: bool,
    },
    Target {
        name: String,
        #[serde(default)]
        overlap: bool,
    },
    Pathway {
        name: String,
        #[serde(default)]
        overlap: bool,
    },
    Enzyme {
        name: String,
        #[serde(default)]
        inhibition: bool,
        #[serde(default)]
        induction: bool,
        #[serde(default)]
        shared_substrate: bool,
    },
    DrugRisk {
        name: String,
        #[serde(default)]
        canonical_interaction: bool,
        #[serde(default)]
        prr: Option<f64>,
        #[serde(default)]
        hepatotoxicity: Option<RiskTier>,
        #[serde(default)]
        cardiotoxicity: Option<RiskTier>,
        #[serde(default)]
        qt_score: Option<f64>,
    },
}

impl EvidenceItem {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SideEffect { name, .. }
            | Self::Target { name, .. }
            | Self::Pathway { name, .. }
            | Self::Enzyme { name, .. }
            | Self::DrugRisk { name, .. } => name,
        }
    }

    #[must_use]
    pub fn signals(&self) -> RelevanceSignals {
        match self {
            Self::SideEffect {
                prr,
                count,
                semantic_similarity,
                pair_specific,
                ..
            } => RelevanceSignals {
                prr: *prr,
                report_count: *count,
                semantic_similarity: *semantic_similarity,
                pair_specific: *pair_specific,
                ..RelevanceSignals::default()
            },
            Self::Target { overlap, .. } => RelevanceSignals {
                target_overlap: *overlap,
                ..RelevanceSignals::default()
            },
            Self::Pathway { overlap, .. } => RelevanceSignals {
                pathway_overlap: *overlap,
                ..RelevanceSignals::default()
            },
            Self::Enzyme {
                inhibition,
                induction,
                shared_substrate,
                ..
            } => RelevanceSignals {
                enzyme_inhibition: *inhibition,
                enzyme_induction: *induction,
                shared_substrate: *shared_substrate,
                ..RelevanceSignals::default()
            },
            Self::DrugRisk {
                canonical_interaction,
                prr,
                hepatotoxicity,
                cardiotoxicity,
                qt_score,
                ..
            } => RelevanceSignals {
                canonical_interaction: *canonical_interaction,
                prr: *prr,
                risk_tiers: hepatotoxicity.iter().chain(cardiotoxicity.iter()).copied().collect(),
                secondary_risk: *qt_score,
                pair_specific: true,
                ..RelevanceSignals::default()
            },
        }
    }
}

#[must_use]
pub fn score_evidence_item(item: &EvidenceItem) -> f64 {
    score_signals(&item.signals())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_signals_score_zero() {
        assert!(approx(score_signals(&RelevanceSignals::default()), 0.0));
    }

    #[test]
    fn prr_tiers_are_strict() {
        let at = |prr| {
            score_signals(&RelevanceSignals {
                prr: Some(prr),
                ..RelevanceSignals::default()
            })
        };
        assert!(approx(at(2.5), 5.0));
        assert!(approx(at(2.0), 2.0));
        assert!(approx(at(1.6), 2.0));
        assert!(approx(at(1.5), 0.5));
        assert!(approx(at(1.0), 0.0));
        assert!(approx(at(f64::NAN), 0.0));
    }

    #[test]
    fn contributions_add_up() {
        let s = RelevanceSignals {
            canonical_interaction: true,
            prr: Some(3.0),
            pathway_overlap: true,
            target_overlap: true,
            enzyme_inhibition: true,
            enzyme_induction: true,
            shared_substrate: true,
            report_count: Some(5000),
            risk_tiers: vec![RiskTier::High, RiskTier::Medium],
            secondary_risk: Some(0.9),
            semantic_similarity: Some(0.95),
            pair_specific: true,
        };
        // 10 + 5 + 3 + 2 + 4 + 3 + 1.5 + 2 + 2 + 1 + 1.5 + 1 + 1
        assert!(approx(score_signals(&s), 37.0));
    }

    #[test]
    fn count_and_similarity_tiers() {
        let s = |count, sim| RelevanceSignals {
            report_count: Some(count),
            semantic_similarity: Some(sim),
            ..RelevanceSignals::default()
        };
        assert!(approx(score_signals(&s(101, 0.7)), 1.5));
        assert!(approx(score_signals(&s(11, 0.6)), 0.5));
        assert!(approx(score_signals(&s(10, 0.81)), 1.0));
    }

    #[test]
    fn risk_labels_parse() {
        assert_eq!(RiskTier::from_label("Severe"), Some(RiskTier::High));
        assert_eq!(RiskTier::from_label(" moderate "), Some(RiskTier::Medium));
        assert_eq!(RiskTier::from_label("low"), Some(RiskTier::Low));
        assert_eq!(RiskTier::from_label("???"), None);
    }

    #[test]
    fn evidence_variants_reduce_to_signals() {
        let enzyme = EvidenceItem::Enzyme {
            name: "cyp3a4".into(),
            inhibition: true,
            induction: false,
            shared_substrate: true,
        };
        assert!(approx(score_evidence_item(&enzyme), 5.5));
        assert_eq!(enzyme.name(), "cyp3a4");

        let risk = EvidenceItem::DrugRisk {
            name: "warfarin+aspirin".into(),
            canonical_interaction: false,
            prr: Some(1.8),
            hepatotoxicity: Some(RiskTier::Medium),
            cardiotoxicity: Some(RiskTier::High),
            qt_score: Some(0.5),
        };
        // 2 (prr) + 1 + 2 (tiers) + 0.5 (qt) + 1 (pair)
        assert!(approx(score_evidence_item(&risk), 6.5));
    }

    #[test]
    fn evidence_items_decode_from_tagged_json() {
        let item: EvidenceItem =
            serde_json::from_str(r#"{"kind":"pathway","name":"hemostasis","overlap":true}"#)
                .expect("decode");
        assert!(approx(score_evidence_item(&item), 3.0));
    }
}
