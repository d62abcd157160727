//! Drug-name query expansion.
//!
//! A free-text drug name rarely matches an index verbatim: it may carry a
//! salt or dosage-form suffix, a hyphen where the index has a space, or a
//! different case. [`expand_drug_query`] turns one name into an ordered list
//! of candidate terms (the original first), and the helpers here try those
//! terms against a matcher or merge what each of them returned.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Salt and dosage-form suffixes, stripped in this order.
static FORM_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["sodium", "tablet", "capsule", "injection", "oral", "iv", "im"]
        .iter()
        .map(|word| Regex::new(&format!(r"(?i)\s+{word}\s*$")).expect("suffix pattern must compile"))
        .collect()
});

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)(\d+)$").expect("digit pattern must compile"));

/// Which expansions [`expand_drug_query_with`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionOptions {
    pub variations: bool,
    pub case_variants: bool,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            variations: true,
            case_variants: true,
        }
    }
}

/// [`expand_drug_query_with`] using every expansion.
#[must_use]
pub fn expand_drug_query(name: &str, synonyms: &[String]) -> Vec<String> {
    expand_drug_query_with(name, synonyms, ExpansionOptions::default())
}

/// Candidate terms for `name`: the trimmed original first, then synonyms,
/// case variants and spelling variations, unique and sorted
/// case-insensitively. A blank name expands to nothing.
#[must_use]
pub fn expand_drug_query_with(name: &str, synonyms: &[String], options: ExpansionOptions) -> Vec<String> {
    let original = name.trim();
    if original.is_empty() {
        return Vec::new();
    }

    let mut terms: BTreeSet<String> = BTreeSet::new();
    terms.insert(original.to_string());
    terms.extend(
        synonyms
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
    if options.case_variants {
        terms.insert(original.to_lowercase());
        terms.insert(original.to_uppercase());
        terms.insert(title_case(original));
        terms.insert(capitalize(original));
    }
    if options.variations {
        terms.extend(name_variations(original));
    }
    terms.retain(|t| !t.is_empty());

    let mut out: Vec<String> = terms.into_iter().collect();
    out.sort_by_cached_key(|t| (t != original, t.to_lowercase(), t.clone()));
    out
}

/// Spelling variations of `name`, excluding `name` itself.
///
/// - salt and dosage-form suffixes removed (`warfarin sodium` → `warfarin`)
/// - hyphens as spaces or removed, spaces as hyphens or removed
/// - a trailing number dropped (`drug123` → `drug`)
#[must_use]
pub fn name_variations(name: &str) -> Vec<String> {
    let mut out = Vec::new();

    let base = FORM_SUFFIXES
        .iter()
        .fold(name.to_string(), |acc, re| re.replace(&acc, "").into_owned());
    if base != name {
        out.push(base.trim().to_string());
    }

    if name.contains('-') {
        out.push(name.replace('-', " "));
        out.push(name.replace('-', ""));
    }
    if name.contains(' ') {
        out.push(name.replace(' ', "-"));
        out.push(name.replace(' ', ""));
    }
    if let Some(stem) = TRAILING_DIGITS.captures(name).and_then(|c| c.get(1)) {
        out.push(stem.as_str().to_string());
    }

    out.retain(|v| !v.is_empty() && v != name);
    out
}

/// Expanded terms for both drugs of a pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairExpansion {
    pub drug_a: Vec<String>,
    pub drug_b: Vec<String>,
}

#[must_use]
pub fn expand_drug_pair_queries(a: &str, b: &str, synonyms_a: &[String], synonyms_b: &[String]) -> PairExpansion {
    PairExpansion {
        drug_a: expand_drug_query(a, synonyms_a),
        drug_b: expand_drug_query(b, synonyms_b),
    }
}

/// Try `terms` in order and return up to `max_results` that matched.
/// A matcher error skips the term.
pub fn best_match_from_expanded<F, E>(terms: &[String], mut matches: F, max_results: usize) -> Vec<String>
where
    F: FnMut(&str) -> Result<bool, E>,
    E: Display,
{
    let mut matched = Vec::new();
    if max_results == 0 {
        return matched;
    }
    for term in terms {
        match matches(term) {
            Ok(true) => {
                matched.push(term.clone());
                if matched.len() >= max_results {
                    break;
                }
            }
            Ok(false) => {}
            Err(err) => debug!(term = %term, error = %err, "match failed for expanded term"),
        }
    }
    matched
}

/// Union of per-term results in term order, deduplicated by display form.
#[must_use]
pub fn merge_expanded_results<T>(results_by_term: &[(String, Vec<T>)]) -> Vec<T>
where
    T: Clone + Display,
{
    let mut seen: HashSet<String> = HashSet::new();
    results_by_term
        .iter()
        .flat_map(|(_, results)| results)
        .filter(|item| seen.insert(item.to_string()))
        .cloned()
        .collect()
}

/// Fold per-term results with a caller-supplied merge, in term order.
/// `None` when there are no terms.
pub fn merge_expanded_results_with<T, F>(results_by_term: Vec<(String, T)>, merge: F) -> Option<T>
where
    F: FnMut(T, T) -> T,
{
    results_by_term.into_iter().map(|(_, result)| result).reduce(merge)
}

/// `name` followed by the distinct names a similarity search returns for it.
/// A failing search leaves just `name`.
pub fn expand_with_semantic_similarity<S, E>(name: &str, search: Option<S>) -> Vec<String>
where
    S: FnOnce(&str) -> Result<Vec<(String, f64)>, E>,
    E: Display,
{
    let mut out = vec![name.to_string()];
    let Some(search) = search else {
        return out;
    };
    match search(name) {
        Ok(similar) => {
            for (candidate, _) in similar {
                if candidate != name && !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
        Err(err) => warn!(name, error = %err, "semantic expansion failed"),
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionMethods {
    pub synonyms: bool,
    pub variations: bool,
    pub semantic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalPair {
    pub drug_a: String,
    pub drug_b: String,
}

/// Everything a pair query was expanded to, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedQueryContext {
    pub original: OriginalPair,
    pub expanded: PairExpansion,
    pub expansion_methods: ExpansionMethods,
}

/// Expand both drugs with synonyms and variations, then append the
/// similarity neighbours `similar` returns when it is supplied.
pub fn expanded_query_context<S, E>(
    a: &str,
    b: &str,
    synonyms_a: Option<&[String]>,
    synonyms_b: Option<&[String]>,
    similar: Option<S>,
) -> ExpandedQueryContext
where
    S: Fn(&str) -> Result<Vec<(String, f64)>, E>,
    E: Display,
{
    let mut expanded = expand_drug_pair_queries(a, b, synonyms_a.unwrap_or_default(), synonyms_b.unwrap_or_default());
    let semantic = similar.is_some();
    if let Some(similar) = similar {
        append_unique(&mut expanded.drug_a, expand_with_semantic_similarity(a, Some(&similar)));
        append_unique(&mut expanded.drug_b, expand_with_semantic_similarity(b, Some(&similar)));
    }
    ExpandedQueryContext {
        original: OriginalPair {
            drug_a: a.to_string(),
            drug_b: b.to_string(),
        },
        expanded,
        expansion_methods: ExpansionMethods {
            synonyms: synonyms_a.is_some() || synonyms_b.is_some(),
            variations: true,
            semantic,
        },
    }
}

fn append_unique(terms: &mut Vec<String>, extra: Vec<String>) {
    for term in extra {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}
