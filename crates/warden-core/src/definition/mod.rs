//! Encounter definition domain module.
//!
//! # Module Structure
//!
//! - `model`: immutable definition types (`EncounterDefinition`, `WaveSpec`, ...)
//! - `error`: per-entry validation failures (`DefinitionError`)
//! - `source`: where definitions are read from (`DefinitionSource`)

mod error;
mod model;
mod source;

#[cfg(test)]
pub(crate) use model::fixtures;

pub use error::DefinitionError;
pub use model::{
    BossSpec, EncounterDefinition, EncounterKind, MAX_ACTORS_PER_WAVE, PlayerGate, RewardSpec,
    Schedule, WaveSpec,
};
pub use source::{DefinitionBatch, DefinitionSource};
