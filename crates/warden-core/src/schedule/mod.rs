//! Scheduling domain module.

mod clock;

pub use clock::EncounterClock;
