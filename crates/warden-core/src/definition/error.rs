//! Error types for definition validation and loading

use thiserror::Error;

/// Why a single encounter definition was rejected.
///
/// Loading reports one of these per bad entry and keeps going with the rest.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("definition has no id")]
    MissingId,

    #[error("definition '{id}' has no waves")]
    EmptyWaves { id: String },

    #[error("definition '{id}' wave {wave}: {reason}")]
    InvalidWave {
        id: String,
        wave: usize,
        reason: String,
    },

    #[error("definition '{id}' schedule: {reason}")]
    InvalidSchedule { id: String, reason: String },

    #[error("definition '{id}' rewards: {reason}")]
    InvalidRewards { id: String, reason: String },

    #[error("definition '{id}' player gate {min}..={max} is empty")]
    InvalidPlayerGate { id: String, min: usize, max: usize },

    #[error("definition '{id}' appears more than once")]
    Duplicate { id: String },

    #[error("entry #{index} is malformed: {reason}")]
    Malformed { index: usize, reason: String },
}
