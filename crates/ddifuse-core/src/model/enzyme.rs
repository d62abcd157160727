use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::canonical::{DisplayLabel, canonicalize};
use crate::model::Entity;

/// Enzyme roles for one drug as a source reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnzymeRoles {
    #[serde(default)]
    pub substrate: Vec<Entity>,
    #[serde(default)]
    pub inhibitor: Vec<Entity>,
    #[serde(default)]
    pub inducer: Vec<Entity>,
}

impl EnzymeRoles {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.substrate.is_empty() && self.inhibitor.is_empty() && self.inducer.is_empty()
    }
}

/// Raw enzyme roles for both sides of a pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnzymeSides {
    #[serde(default)]
    pub a: EnzymeRoles,
    #[serde(default)]
    pub b: EnzymeRoles,
}

/// Canonical enzyme tokens per role for one drug.
///
/// Roles are not exclusive: one enzyme may appear under several.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnzymeRoleSet {
    #[serde(default)]
    pub substrate: BTreeSet<String>,
    #[serde(default)]
    pub inhibitor: BTreeSet<String>,
    #[serde(default)]
    pub inducer: BTreeSet<String>,
}

impl EnzymeRoleSet {
    #[must_use]
    pub fn from_roles(roles: &EnzymeRoles) -> Self {
        Self {
            substrate: canonical_set(&roles.substrate),
            inhibitor: canonical_set(&roles.inhibitor),
            inducer: canonical_set(&roles.inducer),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.substrate.is_empty() && self.inhibitor.is_empty() && self.inducer.is_empty()
    }

    /// Every enzyme mentioned under any role.
    #[must_use]
    pub fn all(&self) -> BTreeSet<&str> {
        self.substrate
            .iter()
            .chain(&self.inhibitor)
            .chain(&self.inducer)
            .map(String::as_str)
            .collect()
    }
}

fn canonical_set<T: DisplayLabel>(items: &[T]) -> BTreeSet<String> {
    items
        .iter()
        .map(|item| canonicalize(&item.display_label()))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Canonical roles for both drugs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRoles {
    pub a: EnzymeRoleSet,
    pub b: EnzymeRoleSet,
}

impl PairRoles {
    #[must_use]
    pub fn from_sides(sides: &EnzymeSides) -> Self {
        Self {
            a: EnzymeRoleSet::from_roles(&sides.a),
            b: EnzymeRoleSet::from_roles(&sides.b),
        }
    }
}
