use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Entity, EnzymeSides, PairRoles};

/// Ordered, duplicate-free list of caveat strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Caveats(Vec<String>);

impl Caveats {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `caveat` unless it is blank or already present.
    /// Returns whether it was added.
    pub fn push(&mut self, caveat: impl Into<String>) -> bool {
        let caveat = caveat.into();
        if caveat.trim().is_empty() || self.0.contains(&caveat) {
            return false;
        }
        self.0.push(caveat);
        true
    }

    pub fn extend<I, S>(&mut self, caveats: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for c in caveats {
            self.push(c);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Caveats {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for Caveats {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut out = Self::new();
        out.extend(iter);
        out
    }
}

/// Raw mechanistic evidence for a pair as the primary source delivers it.
///
/// Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceBlock {
    pub enzymes: EnzymeSides,
    pub targets_a: Vec<Entity>,
    pub targets_b: Vec<Entity>,
    pub pathways_a: Vec<Entity>,
    pub pathways_b: Vec<Entity>,
    pub diseases_a: Vec<Entity>,
    pub diseases_b: Vec<Entity>,
    pub common_pathways: Vec<Entity>,
    pub ids_a: BTreeMap<String, Value>,
    pub ids_b: BTreeMap<String, Value>,
    pub synonyms_a: Vec<String>,
    pub synonyms_b: Vec<String>,
    pub caveats: Vec<String>,
}

impl SourceBlock {
    /// The same evidence with the two sides exchanged. Shared pathways and
    /// caveats belong to the pair and stay as they are.
    #[must_use]
    pub fn swapped(mut self) -> Self {
        std::mem::swap(&mut self.enzymes.a, &mut self.enzymes.b);
        std::mem::swap(&mut self.targets_a, &mut self.targets_b);
        std::mem::swap(&mut self.pathways_a, &mut self.pathways_b);
        std::mem::swap(&mut self.diseases_a, &mut self.diseases_b);
        std::mem::swap(&mut self.ids_a, &mut self.ids_b);
        std::mem::swap(&mut self.synonyms_a, &mut self.synonyms_b);
        self
    }
}

/// Canonical mechanistic record for a pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MechanisticRecord {
    pub enzymes: PairRoles,
    pub targets_a: Vec<String>,
    pub targets_b: Vec<String>,
    pub pathways_a: Vec<String>,
    pub pathways_b: Vec<String>,
    pub diseases_a: Vec<String>,
    pub diseases_b: Vec<String>,
    pub common_pathways: Vec<String>,
    pub ids_a: BTreeMap<String, Value>,
    pub ids_b: BTreeMap<String, Value>,
    pub synonyms_a: Vec<String>,
    pub synonyms_b: Vec<String>,
    pub caveats: Caveats,
}
