//! Fusion engine and the cached pipeline around it.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{Context, Result};
use ddifuse_core::cache::{CacheManager, ResponseParams};
use ddifuse_core::config::FusionConfig;
use ddifuse_core::model::{Caveats, EnzymeRoleSet, SourceBlock};
use ddifuse_core::pkpd::{pd_overlap, summarize_pkpd_risk_with};
use ddifuse_rank::relevance::{score_and_rank_pathways, score_and_rank_side_effects, score_and_rank_targets};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::context::{DrugInfo, Drugs, FaersSignals, PairContext, PotencyPair, ReactionCount, TabularSignals};
use crate::fallback::{PotencyEnrichment, classify_measurements, derive_roles, enrich_with_potency, roles_from_potency};
use crate::resolve::{DrugResolution, resolve_drug};
use crate::source::{
    AdverseEventSource, DegradeExt, DrugIndex, MechanisticSource, PotencySource, StructuredSource, TabularSource,
};
use crate::synthesize::synthesize;

const MECHANISTIC_UNAVAILABLE: &str =
    "Mechanistic source unavailable; PD evidence falls back to structured targets where available.";
const TABULAR_UNAVAILABLE: &str = "Tabular risk signals unavailable; risk flags may be incomplete.";
const ADVERSE_EVENTS_UNAVAILABLE: &str = "Adverse event reports unavailable; FAERS evidence may be incomplete.";

/// Fuses evidence for a drug pair from whichever sources are attached.
///
/// Sources are borrowed; the caller owns them and any clients or caches
/// behind them. An engine with no sources still produces a well-formed
/// (empty) context.
pub struct FusionEngine<'a> {
    config: FusionConfig,
    mechanistic: Option<&'a dyn MechanisticSource>,
    structured: Option<&'a dyn StructuredSource>,
    potency: Option<&'a dyn PotencySource>,
    tabular: Option<&'a dyn TabularSource>,
    adverse_events: Option<&'a dyn AdverseEventSource>,
    drug_index: Option<&'a dyn DrugIndex>,
}

impl<'a> FusionEngine<'a> {
    #[must_use]
    pub const fn new(config: FusionConfig) -> Self {
        Self {
            config,
            mechanistic: None,
            structured: None,
            potency: None,
            tabular: None,
            adverse_events: None,
            drug_index: None,
        }
    }

    #[must_use]
    pub const fn with_mechanistic(mut self, source: &'a dyn MechanisticSource) -> Self {
        self.mechanistic = Some(source);
        self
    }

    #[must_use]
    pub const fn with_structured(mut self, source: &'a dyn StructuredSource) -> Self {
        self.structured = Some(source);
        self
    }

    #[must_use]
    pub const fn with_potency(mut self, source: &'a dyn PotencySource) -> Self {
        self.potency = Some(source);
        self
    }

    #[must_use]
    pub const fn with_tabular(mut self, source: &'a dyn TabularSource) -> Self {
        self.tabular = Some(source);
        self
    }

    #[must_use]
    pub const fn with_adverse_events(mut self, source: &'a dyn AdverseEventSource) -> Self {
        self.adverse_events = Some(source);
        self
    }

    #[must_use]
    pub const fn with_drug_index(mut self, index: &'a dyn DrugIndex) -> Self {
        self.drug_index = Some(index);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &FusionConfig {
        &self.config
    }

    fn structured_fallback(&self) -> Option<&'a dyn StructuredSource> {
        self.structured.filter(|_| self.config.fallback.structured)
    }

    fn potency_fallback(&self) -> Option<&'a dyn PotencySource> {
        self.potency.filter(|_| self.config.fallback.potency)
    }

    /// Resolve a free-text drug name against the attached index. `None`
    /// when no index is attached.
    #[must_use]
    pub fn resolve_drug(&self, name: &str, synonyms: &[String]) -> Option<DrugResolution> {
        self.drug_index
            .map(|index| resolve_drug(index, name, synonyms, &self.config))
    }

    /// Fuse all attached sources into one context. Never fails: a source
    /// error leaves its part of the context empty and adds a caveat.
    #[instrument(skip(self))]
    pub fn fuse(&self, a: &str, b: &str) -> PairContext {
        let mut mech_caveats = Caveats::new();

        let block = match self.mechanistic {
            Some(source) => source.mechanistic(a, b).or_caveat(&mut mech_caveats, MECHANISTIC_UNAVAILABLE),
            None => {
                mech_caveats.push(MECHANISTIC_UNAVAILABLE);
                SourceBlock::default()
            }
        };

        let fallback_a = self.fallback_targets(block.targets_a.is_empty(), a, &mut mech_caveats);
        let fallback_b = self.fallback_targets(block.targets_b.is_empty(), b, &mut mech_caveats);
        let mut record = synthesize(&block, Some(&fallback_a), Some(&fallback_b));

        let potency = PotencyPair {
            a: self.resolve_enzymes(a, &mut record.enzymes.a, &mut mech_caveats),
            b: self.resolve_enzymes(b, &mut record.enzymes.b, &mut mech_caveats),
        };

        let pd = pd_overlap(
            &record.targets_a,
            &record.targets_b,
            &record.pathways_a,
            &record.pathways_b,
            self.config.pd.target_topk,
            self.config.pd.pathway_topk,
        );
        record.targets_a = names(score_and_rank_targets(&record.targets_a, &pd.overlap_targets));
        record.targets_b = names(score_and_rank_targets(&record.targets_b, &pd.overlap_targets));
        record.pathways_a = names(score_and_rank_pathways(&record.pathways_a, &pd.overlap_pathways));
        record.pathways_b = names(score_and_rank_pathways(&record.pathways_b, &pd.overlap_pathways));
        record.caveats.extend(mech_caveats.iter().cloned());

        let mut caveats = record.caveats.clone();
        let signals = self
            .tabular
            .map(|source| self.tabular_signals(source, a, b, &mut caveats))
            .unwrap_or_default();
        let faers = self
            .adverse_events
            .map(|source| self.faers_signals(source, a, b, &mut caveats))
            .unwrap_or_default();

        let pkpd = summarize_pkpd_risk_with(&record, self.config.pd.target_topk, self.config.pd.pathway_topk);
        debug!(
            pd_score = pkpd.pd.pd_score,
            modulation = pkpd.overlaps.has_modulation(),
            caveats = caveats.len(),
            "pair fused"
        );

        PairContext {
            drugs: Drugs {
                a: DrugInfo {
                    name: a.to_string(),
                    synonyms: record.synonyms_a.clone(),
                    ids: record.ids_a.clone(),
                },
                b: DrugInfo {
                    name: b.to_string(),
                    synonyms: record.synonyms_b.clone(),
                    ids: record.ids_b.clone(),
                },
            },
            signals,
            mechanistic: record,
            faers,
            sources: self.source_manifest(),
            caveats,
            pkpd: Some(pkpd),
            potency,
        }
    }

    fn fallback_targets(&self, needed: bool, drug: &str, caveats: &mut Caveats) -> Vec<String> {
        match self.structured_fallback() {
            Some(source) if needed => source
                .targets(drug)
                .or_caveat(caveats, format!("Structured targets unavailable for {drug}.")),
            _ => Vec::new(),
        }
    }

    /// Fill empty enzyme roles from the structured source, then grade them
    /// with potency data when enabled.
    fn resolve_enzymes(&self, drug: &str, roles: &mut EnzymeRoleSet, caveats: &mut Caveats) -> Option<PotencyEnrichment> {
        if roles.is_empty()
            && let Some(source) = self.structured_fallback()
        {
            let profile = source
                .enzyme_profile(drug)
                .or_caveat(caveats, format!("Structured enzyme data unavailable for {drug}."));
            let derived = derive_roles(&profile);
            if !derived.is_empty() {
                debug!(drug, "enzyme roles derived from structured source");
                caveats.push(format!(
                    "Enzyme roles for {drug} derived from structured source (CYP enzymes only; per-enzyme actions may be approximate)."
                ));
                *roles = derived;
            }
        }

        let source = self.potency_fallback()?;
        let measurements = source
            .measurements(drug)
            .or_caveat(caveats, format!("Potency data unavailable for {drug}."));
        let interactions = classify_measurements(&measurements);
        if interactions.is_empty() {
            return None;
        }

        let enrichment = enrich_with_potency(&interactions, roles);
        let implied = roles_from_potency(&interactions);
        if roles.is_empty() && !implied.is_empty() {
            debug!(drug, "enzyme roles inferred from potency data");
            caveats.push(format!("Enzyme roles for {drug} inferred from potency measurements only."));
            *roles = implied;
        } else if !enrichment.enzyme_strength.is_empty() {
            caveats.push(format!("Potency measurements for {drug} used to grade inhibition strength."));
        }
        Some(enrichment)
    }

    fn tabular_signals(&self, source: &dyn TabularSource, a: &str, b: &str, caveats: &mut Caveats) -> TabularSignals {
        let term_prr: HashMap<String, f64> = source.side_effect_prr(a, b).or_caveat(caveats, TABULAR_UNAVAILABLE);
        let limit = self.config.evidence.side_effect_limit;
        let ranked = |drug: &str, caveats: &mut Caveats| {
            let effects = source.side_effects(drug).or_caveat(caveats, TABULAR_UNAVAILABLE);
            let mut out = names(score_and_rank_side_effects(&effects, Some(&term_prr), None));
            out.truncate(limit);
            out
        };
        let side_effects_a = ranked(a, caveats);
        let side_effects_b = ranked(b, caveats);

        TabularSignals {
            prr: source.pair_prr(a, b).or_caveat(caveats, TABULAR_UNAVAILABLE),
            side_effects_a,
            side_effects_b,
            hepatotoxicity_a: source.hepatotoxicity(a).or_caveat(caveats, TABULAR_UNAVAILABLE),
            hepatotoxicity_b: source.hepatotoxicity(b).or_caveat(caveats, TABULAR_UNAVAILABLE),
            cardiotoxicity_a: source.cardiotoxicity(a).or_caveat(caveats, TABULAR_UNAVAILABLE),
            cardiotoxicity_b: source.cardiotoxicity(b).or_caveat(caveats, TABULAR_UNAVAILABLE),
            qt_score_a: source.qt_score(a).or_caveat(caveats, TABULAR_UNAVAILABLE),
            qt_score_b: source.qt_score(b).or_caveat(caveats, TABULAR_UNAVAILABLE),
        }
    }

    fn faers_signals(&self, source: &dyn AdverseEventSource, a: &str, b: &str, caveats: &mut Caveats) -> FaersSignals {
        let k = self.config.evidence.faers_top_k;
        let capped = |mut rows: Vec<ReactionCount>| {
            rows.truncate(k);
            rows
        };
        FaersSignals {
            top_reactions_a: capped(source.top_reactions(a, k).or_caveat(caveats, ADVERSE_EVENTS_UNAVAILABLE)),
            top_reactions_b: capped(source.top_reactions(b, k).or_caveat(caveats, ADVERSE_EVENTS_UNAVAILABLE)),
            combo_reactions: capped(
                source
                    .combination_reactions(a, b, k)
                    .or_caveat(caveats, ADVERSE_EVENTS_UNAVAILABLE),
            ),
        }
    }

    fn source_manifest(&self) -> BTreeMap<String, Vec<String>> {
        let mut manifest = BTreeMap::new();
        if let Some(s) = self.mechanistic {
            manifest.insert("mechanistic".to_string(), s.datasets());
        }
        if let Some(s) = self.structured_fallback() {
            manifest.insert("structured".to_string(), s.datasets());
        }
        if let Some(s) = self.potency_fallback() {
            manifest.insert("potency".to_string(), s.datasets());
        }
        if let Some(s) = self.tabular {
            manifest.insert("tabular".to_string(), s.datasets());
        }
        if let Some(s) = self.adverse_events {
            manifest.insert("adverse_events".to_string(), s.datasets());
        }
        manifest
    }
}

fn names(scored: Vec<(String, f64)>) -> Vec<String> {
    scored.into_iter().map(|(name, _)| name).collect()
}

/// Fuse through the context cache.
///
/// The key is order-independent, so a cached `(B, A)` context answers an
/// `(A, B)` request. Returns the context and its cache key.
///
/// # Errors
///
/// Returns an error when the fused context cannot be written to the cache.
#[instrument(skip(engine, cache))]
pub fn fuse_cached(
    engine: &FusionEngine<'_>,
    cache: &CacheManager,
    a: &str,
    b: &str,
    force_refresh: bool,
) -> Result<(PairContext, String)> {
    let key = cache.context_key(a, b);
    if !force_refresh {
        let ttl = engine.config().cache.ttl_secs.map(Duration::from_secs);
        if let Some(context) = cache.get_context::<PairContext>(&key, ttl) {
            info!(%key, "context cache hit");
            return Ok((context, key));
        }
    }

    info!(%key, force_refresh, "context cache miss");
    let context = engine.fuse(a, b);
    cache
        .put_context(&key, &context)
        .with_context(|| format!("failed to cache context {key}"))?;
    Ok((context, key))
}

/// Return the cached response for `context` and `params`, generating and
/// storing it on a miss.
///
/// # Errors
///
/// Propagates errors from `generate` and from writing the response cache.
#[instrument(skip(cache, context, generate), fields(mode = %params.mode, model = %params.model))]
pub fn respond_cached<F>(
    cache: &CacheManager,
    context: &PairContext,
    params: &ResponseParams,
    generate: F,
) -> Result<Value>
where
    F: FnOnce(&PairContext, &ResponseParams) -> Result<Value>,
{
    let context_value = serde_json::to_value(context).context("failed to encode context for response key")?;
    let key = cache.response_key(&context_value, params);
    if let Some(hit) = cache.get_response::<Value>(&key) {
        info!(%key, "response cache hit");
        return Ok(hit);
    }

    info!(%key, "response cache miss");
    let response = generate(context, params)?;
    cache
        .put_response(&key, &response)
        .with_context(|| format!("failed to cache response {key}"))?;
    Ok(response)
}
