#![forbid(unsafe_code)]
//! ddifuse-fusion library.
//!
//! Turns per-source evidence for a drug pair into one [`PairContext`]:
//! canonical mechanistic synthesis, the structured and potency fallback
//! chains, ranked sub-lists, PK/PD summaries, and the budgeted prompt
//! blocks rendered from it. Free-text names can be resolved against a
//! [`DrugIndex`] first, and a fused context can be narrowed by relevance
//! afterwards ([`filter`]). Upstream sources plug in through the traits in
//! [`source`]; [`offline::OfflineBundle`] replays a recorded snapshot.
//!
//! # Conventions
//!
//! - **Errors**: Source failures are `SourceError` and never escape
//!   [`FusionEngine::fuse`]; cache I/O at the pipeline boundary uses
//!   `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod budget;
pub mod context;
pub mod fallback;
pub mod filter;
pub mod offline;
pub mod pipeline;
pub mod resolve;
pub mod source;
pub mod synthesize;

pub use budget::{Mode, PromptBlocks, build_prompt_blocks};
pub use context::{FaersSignals, PairContext, ReactionCount, topk_faers};
pub use filter::{FilterMetadata, QueryContext, Section, filter_context_by_relevance, filter_context_sections};
pub use pipeline::{FusionEngine, fuse_cached, respond_cached};
pub use resolve::{DrugResolution, resolve_drug};
pub use source::{
    AdverseEventSource, DegradeExt, DrugIndex, MechanisticSource, PotencySource, SourceError, SourceResult,
    StructuredSource, TabularSource,
};
pub use synthesize::synthesize;
