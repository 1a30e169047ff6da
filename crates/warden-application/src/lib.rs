//! Application layer of the Warden encounter orchestrator.
//!
//! # Module Structure
//!
//! - `orchestrator`: session lifecycle, kill attribution, persistence
//! - `progressor`: per-session wave state machine driver
//! - `settler`: wave and completion reward payout
//! - `scheduler`: automatic starts from definition schedules

pub mod orchestrator;
pub mod progressor;
pub mod scheduler;
pub mod settler;

pub use orchestrator::{EncounterOrchestrator, LoadReport};
pub use progressor::{TickOutcome, WaveProgressor};
pub use scheduler::{EncounterScheduler, FireSkipped};
pub use settler::{CompletionPayout, RewardSettler};
