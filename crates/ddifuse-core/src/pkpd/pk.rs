use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{EnzymeSides, PairRoles};

/// Enzymes at which a PK interaction is plausible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapResult {
    pub inhibition: BTreeSet<String>,
    pub induction: BTreeSet<String>,
    pub shared_substrate: BTreeSet<String>,
}

impl OverlapResult {
    /// True when an inhibition or induction overlap exists.
    #[must_use]
    pub fn has_modulation(&self) -> bool {
        !self.inhibition.is_empty() || !self.induction.is_empty()
    }
}

/// Canonical enzyme roles for both sides of a pair.
#[must_use]
pub fn extract_roles(enzymes: &EnzymeSides) -> PairRoles {
    PairRoles::from_sides(enzymes)
}

/// Infer overlaps from canonical roles.
///
/// - inhibition: one drug's substrate is the other's inhibitor
/// - induction: one drug's substrate is the other's inducer
/// - shared substrate: both are substrates
#[must_use]
pub fn detect_overlaps(roles: &PairRoles) -> OverlapResult {
    let (a, b) = (&roles.a, &roles.b);
    let cross = |sub_a: &BTreeSet<String>,
                 mod_b: &BTreeSet<String>,
                 sub_b: &BTreeSet<String>,
                 mod_a: &BTreeSet<String>| {
        sub_a
            .intersection(mod_b)
            .chain(sub_b.intersection(mod_a))
            .cloned()
            .collect::<BTreeSet<_>>()
    };

    OverlapResult {
        inhibition: cross(&a.substrate, &b.inhibitor, &b.substrate, &a.inhibitor),
        induction: cross(&a.substrate, &b.inducer, &b.substrate, &a.inducer),
        shared_substrate: a.substrate.intersection(&b.substrate).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnzymeRoles, Entity};

    fn roles(sub: &[&str], inh: &[&str], ind: &[&str]) -> EnzymeRoles {
        let conv = |xs: &[&str]| xs.iter().copied().map(Entity::from).collect();
        EnzymeRoles {
            substrate: conv(sub),
            inhibitor: conv(inh),
            inducer: conv(ind),
        }
    }

    #[test]
    fn inhibition_in_either_direction() {
        let sides = EnzymeSides {
            a: roles(&["CYP3A4"], &[], &[]),
            b: roles(&["cyp2d6"], &["Cytochrome P450 3A4"], &[]),
        };
        let out = detect_overlaps(&extract_roles(&sides));
        assert_eq!(out.inhibition, BTreeSet::from(["cyp3a4".to_string()]));
        assert!(out.induction.is_empty());
        assert!(out.shared_substrate.is_empty());

        let swapped = EnzymeSides {
            a: sides.b.clone(),
            b: sides.a.clone(),
        };
        assert_eq!(detect_overlaps(&extract_roles(&swapped)), out);
    }

    #[test]
    fn induction_and_shared_substrate() {
        let sides = EnzymeSides {
            a: roles(&["cyp3a4", "cyp2c9"], &[], &["cyp1a2"]),
            b: roles(&["cyp2c9", "cyp1a2"], &[], &["cyp3a4"]),
        };
        let out = detect_overlaps(&extract_roles(&sides));
        assert_eq!(out.induction.len(), 2);
        assert!(out.induction.contains("cyp3a4"));
        assert!(out.induction.contains("cyp1a2"));
        assert_eq!(out.shared_substrate, BTreeSet::from(["cyp2c9".to_string()]));
        assert!(out.has_modulation());
    }

    #[test]
    fn roles_are_not_exclusive() {
        let sides = EnzymeSides {
            a: roles(&["cyp3a4"], &["cyp3a4"], &[]),
            b: roles(&["cyp3a4"], &["cyp3a4"], &[]),
        };
        let out = detect_overlaps(&extract_roles(&sides));
        assert!(out.inhibition.contains("cyp3a4"));
        assert!(out.shared_substrate.contains("cyp3a4"));
    }

    #[test]
    fn empty_roles_yield_empty_overlaps() {
        let out = detect_overlaps(&PairRoles::default());
        assert_eq!(out, OverlapResult::default());
        assert!(!out.has_modulation());
    }
}
