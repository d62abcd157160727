//! Data model shared by the fusion pipeline.

pub mod entity;
pub mod enzyme;
pub mod record;

pub use entity::Entity;
pub use enzyme::{EnzymeRoleSet, EnzymeRoles, EnzymeSides, PairRoles};
pub use record::{Caveats, MechanisticRecord, SourceBlock};
