#![forbid(unsafe_code)]
//! ddifuse-rank library.
//!
//! Ranking-side components of the fusion engine: heuristic relevance
//! scoring of evidence items, weighted merging of ranked lists, adaptive
//! result-set sizing, drug-name query expansion and keyword/semantic hybrid
//! lookup, score-combining reranking, and feedback-learned item weights.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod adaptive;
pub mod expand;
pub mod feedback;
pub mod hybrid;
pub mod relevance;
pub mod rerank;

pub use adaptive::{
    AdaptiveParams, QualityMetrics, RetrievalTrail, Scored, adaptive_retrieve,
    adaptive_retrieve_with_fallback, result_quality,
};
pub use expand::{PairExpansion, best_match_from_expanded, expand_drug_pair_queries, expand_drug_query};
pub use hybrid::{HybridWeights, adaptive_hybrid_search, hybrid_search};
pub use relevance::{EvidenceItem, RelevanceSignals, RiskTier, score_evidence_item, score_signals};
