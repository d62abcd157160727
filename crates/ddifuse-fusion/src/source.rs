//! Collaborator seams.
//!
//! Every upstream evidence provider sits behind one of these traits. The
//! engine never lets a source error escape: [`DegradeExt::or_caveat`] turns
//! any `Err` into the empty shape plus a caveat on the record.

use std::collections::HashMap;

use ddifuse_core::Caveats;
use ddifuse_core::error::ErrorCode;
use ddifuse_core::model::SourceBlock;
use thiserror::Error;
use tracing::warn;

use crate::context::ReactionCount;
use crate::fallback::{EnzymeProfile, PotencyMeasurement};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("{source_name} returned malformed evidence: {reason}")]
    Malformed { source_name: String, reason: String },

    #[error("{source_name} has no entry for {drug}")]
    NotFound { source_name: String, drug: String },
}

impl SourceError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable { .. } | Self::NotFound { .. } => ErrorCode::CollaboratorUnavailable,
            Self::Malformed { .. } => ErrorCode::MalformedEvidence,
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Primary pair-level mechanistic source (enzymes, targets, pathways).
pub trait MechanisticSource {
    /// # Errors
    ///
    /// Any failure to produce the block.
    fn mechanistic(&self, a: &str, b: &str) -> SourceResult<SourceBlock>;

    /// Dataset names listed in the context's source manifest.
    fn datasets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Secondary per-drug structured source.
pub trait StructuredSource {
    /// # Errors
    ///
    /// Any failure to look up the drug.
    fn targets(&self, drug: &str) -> SourceResult<Vec<String>>;

    /// # Errors
    ///
    /// Any failure to look up the drug.
    fn enzyme_profile(&self, drug: &str) -> SourceResult<EnzymeProfile>;

    fn datasets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Tertiary bioactivity source.
pub trait PotencySource {
    /// # Errors
    ///
    /// Any failure to fetch measurements.
    fn measurements(&self, drug: &str) -> SourceResult<Vec<PotencyMeasurement>>;

    fn datasets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Tabular risk signals.
pub trait TabularSource {
    /// # Errors
    ///
    /// Any lookup failure. A pair with no signal is `Ok(None)`.
    fn pair_prr(&self, a: &str, b: &str) -> SourceResult<Option<f64>>;

    /// Hepatotoxicity tier label (DILI).
    ///
    /// # Errors
    ///
    /// Any lookup failure.
    fn hepatotoxicity(&self, drug: &str) -> SourceResult<Option<String>>;

    /// Cardiotoxicity tier label (DICT).
    ///
    /// # Errors
    ///
    /// Any lookup failure.
    fn cardiotoxicity(&self, drug: &str) -> SourceResult<Option<String>>;

    /// QT prolongation score (DIQT).
    ///
    /// # Errors
    ///
    /// Any lookup failure.
    fn qt_score(&self, drug: &str) -> SourceResult<Option<f64>>;

    /// # Errors
    ///
    /// Any lookup failure.
    fn side_effects(&self, drug: &str) -> SourceResult<Vec<String>>;

    /// PRR per side-effect term for the pair.
    ///
    /// # Errors
    ///
    /// Any lookup failure.
    fn side_effect_prr(&self, a: &str, b: &str) -> SourceResult<HashMap<String, f64>>;

    fn datasets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Spontaneous adverse-event reports.
pub trait AdverseEventSource {
    /// # Errors
    ///
    /// Any failure to query reports for `drug`.
    fn top_reactions(&self, drug: &str, k: usize) -> SourceResult<Vec<ReactionCount>>;

    /// # Errors
    ///
    /// Any failure to query reports for the pair.
    fn combination_reactions(&self, a: &str, b: &str, k: usize) -> SourceResult<Vec<ReactionCount>>;

    fn datasets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Drug-name index used to resolve free-text names before fusion.
pub trait DrugIndex {
    /// Indexed names matching `query` lexically, scored in `[0, 1]`, best
    /// first, at most `k`.
    ///
    /// # Errors
    ///
    /// Any failure to query the index.
    fn keyword_search(&self, query: &str, k: usize) -> SourceResult<Vec<(String, f64)>>;

    /// Indexed names whose similarity to `query` is at least `threshold`.
    /// Indexes without embeddings return nothing.
    ///
    /// # Errors
    ///
    /// Any failure to query the similarity index.
    fn semantic_search(&self, _query: &str, _k: usize, _threshold: f64) -> SourceResult<Vec<(String, f64)>> {
        Ok(Vec::new())
    }
}

/// Collapse a source failure into the default value and a caveat.
pub trait DegradeExt<T> {
    fn or_caveat(self, caveats: &mut Caveats, message: impl Into<String>) -> T;
}

impl<T: Default> DegradeExt<T> for SourceResult<T> {
    fn or_caveat(self, caveats: &mut Caveats, message: impl Into<String>) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                let message = message.into();
                warn!(code = %err.code(), error = %err, caveat = %message, "source degraded");
                caveats.push(message);
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_codes() {
        assert_eq!(
            SourceError::unavailable("tabular", "timeout").code(),
            ErrorCode::CollaboratorUnavailable
        );
        assert_eq!(
            SourceError::malformed("faers", "bad row").code(),
            ErrorCode::MalformedEvidence
        );
        let err = SourceError::NotFound {
            source_name: "structured".into(),
            drug: "x".into(),
        };
        assert_eq!(err.to_string(), "structured has no entry for x");
    }

    #[test]
    fn or_caveat_keeps_ok_and_degrades_err() {
        let mut caveats = Caveats::new();
        let ok: SourceResult<Vec<String>> = Ok(vec!["a".into()]);
        assert_eq!(ok.or_caveat(&mut caveats, "never"), vec!["a".to_string()]);
        assert!(caveats.is_empty());

        for _ in 0..2 {
            let err: SourceResult<Option<f64>> = Err(SourceError::unavailable("tabular", "down"));
            assert_eq!(err.or_caveat(&mut caveats, "Tabular signals unavailable."), None);
        }
        assert_eq!(caveats.as_slice(), ["Tabular signals unavailable."]);
    }
}
