//! Entity-name canonicalization.
//!
//! Turns free-text enzyme, target and pathway names coming from unrelated
//! sources into comparable tokens:
//!
//! 1. Unicode NFKC normalization.
//! 2. Lowercase and trim.
//! 3. Runs of whitespace and hyphens collapse to a single space.
//! 4. Known synonyms map to one token through a static alias table
//!    (`"Cytochrome P450 3A4"` → `cyp3a4`).
//!
//! Unknown names pass through in normalized form. Every function here is
//! total and idempotent.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;

use crate::model::Entity;

const CYP_ISOFORMS: &[&str] = &["3a4", "2c9", "2d6", "1a2", "2c19"];

static ALIASES: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for &isoform in CYP_ISOFORMS {
        let canon: &'static str = match isoform {
            "3a4" => "cyp3a4",
            "2c9" => "cyp2c9",
            "2d6" => "cyp2d6",
            "1a2" => "cyp1a2",
            _ => "cyp2c19",
        };
        for alias in [
            format!("cyp{isoform}"),
            format!("cytochrome p450 {isoform}"),
            format!("cyp {isoform}"),
            format!("p450 {isoform}"),
        ] {
            map.insert(alias, canon);
        }
    }
    map
});

/// Normalize text without consulting the alias table.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let lowered = raw.nfkc().collect::<String>().to_lowercase();
    let folded: String = lowered.nfkc().collect();
    folded
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical token for `name`. Never fails; empty input yields `""`.
///
/// ```
/// use ddifuse_core::canonical::canonicalize;
///
/// assert_eq!(canonicalize("Cytochrome  P450 3A4"), "cyp3a4");
/// assert_eq!(canonicalize("  Platelet-Activation "), "platelet activation");
/// ```
#[must_use]
pub fn canonicalize(name: &str) -> String {
    let normalized = normalize_text(name);
    match ALIASES.get(&normalized) {
        Some(canon) => (*canon).to_string(),
        None => normalized,
    }
}

/// Anything that can contribute a display label to a canonical list.
pub trait DisplayLabel {
    fn display_label(&self) -> String;
}

impl DisplayLabel for str {
    fn display_label(&self) -> String {
        self.to_string()
    }
}

impl DisplayLabel for String {
    fn display_label(&self) -> String {
        self.clone()
    }
}

impl DisplayLabel for Entity {
    fn display_label(&self) -> String {
        Self::display_label(self)
    }
}

impl<T: DisplayLabel + ?Sized> DisplayLabel for &T {
    fn display_label(&self) -> String {
        (**self).display_label()
    }
}

/// Canonicalize, drop empties, dedupe by first occurrence, and optionally cap.
///
/// A cap of `Some(0)` is treated as uncapped.
#[must_use]
pub fn canonicalize_list<I>(values: I, topk: Option<usize>) -> Vec<String>
where
    I: IntoIterator,
    I::Item: DisplayLabel,
{
    let cap = topk.filter(|&k| k > 0);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let token = canonicalize(&value.display_label());
        if token.is_empty() || !seen.insert(token.clone()) {
            continue;
        }
        out.push(token);
        if cap.is_some_and(|k| out.len() >= k) {
            break;
        }
    }
    out
}
