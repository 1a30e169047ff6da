//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: the live session state machine (`SessionState`) and its snapshot
//! - `history`: persisted summaries (`HistoryRecord`, `SessionStarted`)
//! - `repository`: history persistence contract (`HistoryStore`)

mod history;
mod model;
mod repository;

pub use history::{HistoryRecord, ParticipantTotal, SessionStarted};
pub use model::{
    Finalized, KillCredit, NextStep, ParticipantTally, SessionId, SessionSnapshot, SessionState,
    SessionStatus, SweepOutcome, WavePhase,
};
pub use repository::HistoryStore;
