use ddifuse_core::canonicalize_list;
use ddifuse_core::model::{Caveats, MechanisticRecord, PairRoles, SourceBlock};

/// Build the canonical record from a primary source block.
///
/// Source targets win when non-empty; otherwise the fallback targets (if
/// any) are canonicalized in their place. Never fails: an empty block yields
/// an empty record.
#[must_use]
pub fn synthesize(
    block: &SourceBlock,
    fallback_targets_a: Option<&[String]>,
    fallback_targets_b: Option<&[String]>,
) -> MechanisticRecord {
    let targets = |primary: &[ddifuse_core::Entity], fallback: Option<&[String]>| {
        if primary.is_empty() {
            canonicalize_list(fallback.unwrap_or_default(), None)
        } else {
            canonicalize_list(primary, None)
        }
    };

    MechanisticRecord {
        enzymes: PairRoles::from_sides(&block.enzymes),
        targets_a: targets(&block.targets_a, fallback_targets_a),
        targets_b: targets(&block.targets_b, fallback_targets_b),
        pathways_a: canonicalize_list(&block.pathways_a, None),
        pathways_b: canonicalize_list(&block.pathways_b, None),
        diseases_a: canonicalize_list(&block.diseases_a, None),
        diseases_b: canonicalize_list(&block.diseases_b, None),
        common_pathways: canonicalize_list(&block.common_pathways, None),
        ids_a: block.ids_a.clone(),
        ids_b: block.ids_b.clone(),
        synonyms_a: block.synonyms_a.clone(),
        synonyms_b: block.synonyms_b.clone(),
        caveats: block.caveats.iter().cloned().collect::<Caveats>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddifuse_core::Entity;
    use ddifuse_core::model::{EnzymeRoles, EnzymeSides};

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn empty_block_uses_fallback_targets() {
        let fb_a = strings(&["Target1", "Other Target"]);
        let fb_b = strings(&["target1"]);
        let record = synthesize(&SourceBlock::default(), Some(&fb_a), Some(&fb_b));
        assert_eq!(record.targets_a, vec!["target1", "other target"]);
        assert_eq!(record.targets_b, vec!["target1"]);
        assert!(record.enzymes.a.is_empty());
        assert!(record.pathways_a.is_empty());
    }

    #[test]
    fn source_targets_win_over_fallback() {
        let block = SourceBlock {
            targets_a: vec![Entity::labeled(Some("VKORC1"), None)],
            ..SourceBlock::default()
        };
        let fb = strings(&["ignored"]);
        let record = synthesize(&block, Some(&fb), None);
        assert_eq!(record.targets_a, vec!["vkorc1"]);
        assert!(record.targets_b.is_empty());
    }

    #[test]
    fn enzymes_and_lists_are_canonical() {
        let block = SourceBlock {
            enzymes: EnzymeSides {
                a: EnzymeRoles {
                    inhibitor: vec![Entity::from("Cytochrome P450 3A4")],
                    ..EnzymeRoles::default()
                },
                b: EnzymeRoles {
                    substrate: vec![Entity::from("CYP3A4"), Entity::from("")],
                    ..EnzymeRoles::default()
                },
            },
            pathways_a: vec![Entity::from("Hemostasis"), Entity::from("hemostasis")],
            common_pathways: vec![Entity::labeled(None, Some("Platelet-Activation"))],
            synonyms_a: strings(&["Coumadin"]),
            caveats: strings(&["partial", "partial"]),
            ..SourceBlock::default()
        };
        let record = synthesize(&block, None, None);
        assert!(record.enzymes.a.inhibitor.contains("cyp3a4"));
        assert_eq!(record.enzymes.b.substrate.len(), 1);
        assert_eq!(record.pathways_a, vec!["hemostasis"]);
        assert_eq!(record.common_pathways, vec!["platelet activation"]);
        assert_eq!(record.synonyms_a, vec!["Coumadin"]);
        assert_eq!(record.caveats.as_slice(), ["partial"]);
    }
}
