//! Domain layer of the Warden encounter orchestrator.
//!
//! Holds encounter definitions, the live session state machine, schedules and
//! the contracts the engine talks through (`WorldActuator`, `RewardSink`,
//! `HistoryStore`). Nothing in here does I/O.

pub mod config;
pub mod definition;
pub mod error;
pub mod event;
pub mod reward;
pub mod schedule;
pub mod session;
pub mod world;

pub use error::{Result, StartError, WardenError};
