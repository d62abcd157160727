#![forbid(unsafe_code)]
//! ddifuse-core library.
//!
//! Leaf components of the evidence fusion engine: entity canonicalization,
//! the fused record model, PK/PD overlap inference, configuration, and the
//! content-addressed JSON cache.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types where appropriate;
//!   module-level failures get a `thiserror` enum with an [`error::ErrorCode`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod cache;
pub mod canonical;
pub mod config;
pub mod error;
pub mod hash;
pub mod model;
pub mod pkpd;

pub use canonical::{canonicalize, canonicalize_list, normalize_text};
pub use model::{Caveats, Entity, EnzymeRoleSet, MechanisticRecord, PairRoles, SourceBlock};
