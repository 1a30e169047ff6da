//! Lifecycle notifications published by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::definition::EncounterKind;
use crate::session::{SessionId, SessionStatus};
use crate::world::PlayerId;

/// Something observable happened to a session.
///
/// Events are fire-and-forget: a lagging subscriber misses events, it never
/// slows the engine down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncounterEvent {
    Started {
        session_id: SessionId,
        definition_id: String,
        display_name: String,
        kind: EncounterKind,
        scope: String,
        total_waves: usize,
    },
    WaveStarted {
        session_id: SessionId,
        kind: EncounterKind,
        display_name: String,
        /// Zero-based.
        wave: usize,
        total_waves: usize,
        composition: String,
        spawned: u32,
    },
    WaveCleared {
        session_id: SessionId,
        kind: EncounterKind,
        display_name: String,
        wave: usize,
        total_waves: usize,
        paid: Vec<PlayerId>,
    },
    Finished {
        session_id: SessionId,
        kind: EncounterKind,
        display_name: String,
        status: SessionStatus,
        reason: Option<String>,
        top_player: Option<PlayerId>,
    },
}

impl EncounterEvent {
    pub fn session_id(&self) -> &str {
        match self {
            EncounterEvent::Started { session_id, .. }
            | EncounterEvent::WaveStarted { session_id, .. }
            | EncounterEvent::WaveCleared { session_id, .. }
            | EncounterEvent::Finished { session_id, .. } => session_id,
        }
    }

    /// Player-facing announcement text.
    pub fn summary(&self) -> String {
        match self {
            EncounterEvent::Started {
                kind,
                display_name,
                scope,
                total_waves,
                ..
            } => format!(
                "{} {} has begun in {} ({} waves)",
                kind.banner(),
                display_name,
                scope,
                total_waves
            ),
            EncounterEvent::WaveStarted {
                kind,
                wave,
                total_waves,
                composition,
                ..
            } => format!(
                "{} Wave {}/{}: {}",
                kind.banner(),
                wave + 1,
                total_waves,
                composition
            ),
            EncounterEvent::WaveCleared {
                kind,
                wave,
                total_waves,
                paid,
                ..
            } => format!(
                "{} Wave {}/{} cleared, {} player(s) rewarded",
                kind.banner(),
                wave + 1,
                total_waves,
                paid.len()
            ),
            EncounterEvent::Finished {
                kind,
                display_name,
                status,
                reason,
                top_player,
                ..
            } => {
                let mut text = match status {
                    SessionStatus::Completed => {
                        format!("{} {} {}!", kind.banner(), display_name, kind.victory_phrase())
                    }
                    SessionStatus::Cancelled => {
                        format!("{} {} was cancelled", kind.banner(), display_name)
                    }
                    _ => format!("{} {} failed", kind.banner(), display_name),
                };
                if let Some(reason) = reason {
                    text.push_str(&format!(" ({reason})"));
                }
                if let Some(top) = top_player {
                    text.push_str(&format!(" Top fighter: {top}"));
                }
                text
            }
        }
    }
}
