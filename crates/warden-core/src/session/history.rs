//! Persisted session summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{SessionId, SessionStatus};
use crate::definition::EncounterKind;
use crate::world::PlayerId;

/// Per-player totals over a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantTotal {
    pub player: PlayerId,
    pub kills: u32,
    #[serde(default)]
    pub damage_dealt: u64,
}

/// Durable summary of a finished session. Written once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub session_id: SessionId,
    pub definition_id: String,
    pub display_name: String,
    #[serde(default)]
    pub kind: EncounterKind,
    pub scope: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub total_waves: usize,
    pub waves_cleared: usize,
    pub actors_spawned: u32,
    pub actors_killed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_participant: Option<ParticipantTotal>,
    #[serde(default)]
    pub participants: Vec<ParticipantTotal>,
}

impl HistoryRecord {
    /// Share of spawned actors that were killed, in percent.
    pub fn kill_ratio(&self) -> f64 {
        if self.actors_spawned == 0 {
            return 0.0;
        }
        f64::from(self.actors_killed) * 100.0 / f64::from(self.actors_spawned)
    }

    /// One-line summary, used by the CLI history listing.
    pub fn summary_line(&self) -> String {
        let top = self
            .top_participant
            .as_ref()
            .map(|p| format!(", top {} ({} kills)", p.player, p.kills))
            .unwrap_or_default();
        format!(
            "{} {} '{}' in {}: {} after {}s, waves {}/{}, kills {}/{}{}",
            self.started_at.format("%Y-%m-%d %H:%M"),
            self.kind.banner(),
            self.display_name,
            self.scope,
            self.status,
            self.duration_secs,
            self.waves_cleared,
            self.total_waves,
            self.actors_killed,
            self.actors_spawned,
            top
        )
    }
}

/// Marker written when a session starts, so a crash leaves a trace that can be
/// closed out on the next start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: SessionId,
    pub definition_id: String,
    pub display_name: String,
    #[serde(default)]
    pub kind: EncounterKind,
    pub scope: String,
    pub total_waves: usize,
    pub started_at: DateTime<Utc>,
}

impl SessionStarted {
    /// Closes a start marker that never got a matching record.
    pub fn into_interrupted(self, ended_at: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            session_id: self.session_id,
            definition_id: self.definition_id,
            display_name: self.display_name,
            kind: self.kind,
            scope: self.scope,
            status: SessionStatus::Failed,
            end_reason: Some("interrupted".to_string()),
            started_at: self.started_at,
            ended_at,
            duration_secs: ended_at
                .signed_duration_since(self.started_at)
                .num_seconds()
                .max(0),
            total_waves: self.total_waves,
            waves_cleared: 0,
            actors_spawned: 0,
            actors_killed: 0,
            top_participant: None,
            participants: Vec::new(),
        }
    }
}
