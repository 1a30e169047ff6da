//! Session domain model.
//!
//! A [`SessionState`] is the live record of one encounter instance. All of its
//! mutable parts sit behind a single mutex, and every transition of the wave
//! state machine is a method that checks and updates under that lock. This is
//! what makes wave clearance single-winner: whichever caller observes the
//! empty live set first moves the phase to `Cleared`, everyone else sees the
//! new phase and does nothing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::{HistoryRecord, ParticipantTotal, SessionStarted};
use crate::definition::{EncounterDefinition, EncounterKind};
use crate::world::{ActorHandle, PlayerId};

pub type SessionId = String;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the session is in its wave sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WavePhase {
    /// Waiting for `not_before` before spawning `wave`.
    Scheduled {
        wave: usize,
        not_before: DateTime<Utc>,
    },
    Spawning {
        wave: usize,
    },
    InProgress {
        wave: usize,
    },
    /// Cleared and being paid out; the next step is decided after payment.
    Cleared {
        wave: usize,
    },
    AllWavesCleared,
}

/// Kill and damage totals of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticipantTally {
    pub kills: u32,
    pub damage_dealt: u64,
}

/// Result of a clearance sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The session is not in a sweepable phase (spawning, scheduled, ...).
    Idle,
    /// Actors of `wave` are still alive.
    Pending { wave: usize, remaining: usize },
    /// This call won the clearance of `wave`. `payees` are the players with at
    /// least one kill in the wave.
    Cleared { wave: usize, payees: Vec<PlayerId> },
    /// The session already ended.
    Terminal,
}

/// What follows a paid-out wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Scheduled {
        wave: usize,
        not_before: DateTime<Utc>,
    },
    AllWavesCleared,
    /// Nothing to do: another caller advanced already or the session ended.
    Noop,
}

/// Outcome of a kill report against this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillCredit {
    /// Actor does not belong to this session, or its kill was already credited.
    NotOwned,
    Credited { wave: usize },
}

/// Actors the session removed when it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub status: SessionStatus,
    pub leftover_actors: Vec<ActorHandle>,
}

#[derive(Debug)]
struct SessionInner {
    status: SessionStatus,
    phase: WavePhase,
    current_wave_index: usize,
    waves_cleared: usize,
    live_actors: HashSet<ActorHandle>,
    /// Every actor spawned by this session and not yet credited, with the
    /// wave it was spawned for.
    roster: HashMap<ActorHandle, usize>,
    participants: HashMap<PlayerId, ParticipantTally>,
    wave_kills: HashMap<PlayerId, u32>,
    actors_spawned: u32,
    actors_killed: u32,
    ended_at: Option<DateTime<Utc>>,
    end_reason: Option<String>,
}

/// Mutable runtime record of one encounter instance.
#[derive(Debug)]
pub struct SessionState {
    session_id: SessionId,
    definition: Arc<EncounterDefinition>,
    scope: String,
    started_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
}

impl SessionState {
    /// Creates an active session whose first wave is due at `started_at`.
    pub fn new(
        definition: Arc<EncounterDefinition>,
        scope: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            definition,
            scope: scope.into(),
            started_at,
            inner: Mutex::new(SessionInner {
                status: SessionStatus::Active,
                phase: WavePhase::Scheduled {
                    wave: 0,
                    not_before: started_at,
                },
                current_wave_index: 0,
                waves_cleared: 0,
                live_actors: HashSet::new(),
                roster: HashMap::new(),
                participants: HashMap::new(),
                wave_kills: HashMap::new(),
                actors_spawned: 0,
                actors_killed: 0,
                ended_at: None,
                end_reason: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn definition_id(&self) -> &str {
        &self.definition.id
    }

    /// The definition snapshot bound when the session started.
    pub fn definition(&self) -> &Arc<EncounterDefinition> {
        &self.definition
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    pub fn phase(&self) -> WavePhase {
        self.lock().phase
    }

    pub fn current_wave_index(&self) -> usize {
        self.lock().current_wave_index
    }

    pub fn owns_actor(&self, handle: ActorHandle) -> bool {
        self.lock().roster.contains_key(&handle)
    }

    /// Whether the session ran past the definition's `max_duration`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.definition.max_duration {
            Some(limit) => now
                .signed_duration_since(self.started_at)
                .to_std()
                .map(|elapsed| elapsed >= limit)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Moves a due `Scheduled` wave to `Spawning` and returns its index.
    ///
    /// Only one caller gets `Some` for a given wave.
    pub fn begin_due_wave(&self, now: DateTime<Utc>) -> Option<usize> {
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return None;
        }
        match inner.phase {
            WavePhase::Scheduled { wave, not_before } if now >= not_before => {
                inner.phase = WavePhase::Spawning { wave };
                inner.current_wave_index = wave;
                inner.wave_kills.clear();
                Some(wave)
            }
            _ => None,
        }
    }

    /// Registers an actor spawned for `wave`. Ignored once the session ended.
    pub fn track_actor(&self, handle: ActorHandle, wave: usize) -> bool {
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return false;
        }
        inner.live_actors.insert(handle);
        inner.roster.insert(handle, wave);
        inner.actors_spawned += 1;
        true
    }

    /// Finishes spawning: the wave becomes eligible for clearance sweeps.
    pub fn mark_in_progress(&self, wave: usize) -> bool {
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return false;
        }
        if inner.phase == (WavePhase::Spawning { wave }) {
            inner.phase = WavePhase::InProgress { wave };
            return true;
        }
        false
    }

    /// Drops dead actors from the live set and, when it is empty, claims the
    /// wave clearance.
    pub fn sweep(&self, is_alive: impl Fn(ActorHandle) -> bool) -> SweepOutcome {
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return SweepOutcome::Terminal;
        }
        let WavePhase::InProgress { wave } = inner.phase else {
            return SweepOutcome::Idle;
        };

        inner.live_actors.retain(|handle| is_alive(*handle));
        if !inner.live_actors.is_empty() {
            return SweepOutcome::Pending {
                wave,
                remaining: inner.live_actors.len(),
            };
        }

        inner.phase = WavePhase::Cleared { wave };
        inner.waves_cleared += 1;
        let mut payees: Vec<PlayerId> = inner
            .wave_kills
            .iter()
            .filter(|(_, kills)| **kills > 0)
            .map(|(player, _)| player.clone())
            .collect();
        payees.sort();
        SweepOutcome::Cleared { wave, payees }
    }

    /// Decides the step after a cleared wave has been paid.
    pub fn advance_after_payout(&self, now: DateTime<Utc>) -> NextStep {
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return NextStep::Noop;
        }
        let WavePhase::Cleared { wave } = inner.phase else {
            return NextStep::Noop;
        };

        let next = wave + 1;
        match self.definition.wave(next) {
            None => {
                inner.phase = WavePhase::AllWavesCleared;
                NextStep::AllWavesCleared
            }
            Some(spec) => {
                let delay = chrono::Duration::from_std(spec.delay_before_start)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                let not_before = now + delay;
                inner.phase = WavePhase::Scheduled {
                    wave: next,
                    not_before,
                };
                NextStep::Scheduled {
                    wave: next,
                    not_before,
                }
            }
        }
    }

    /// Credits the kill of `handle` to `killer`.
    pub fn record_kill(&self, handle: ActorHandle, killer: &PlayerId) -> KillCredit {
        let mut inner = self.lock();
        let Some(wave) = inner.roster.remove(&handle) else {
            return KillCredit::NotOwned;
        };

        inner.live_actors.remove(&handle);
        inner.actors_killed += 1;
        inner.participants.entry(killer.clone()).or_default().kills += 1;
        if wave == inner.current_wave_index {
            *inner.wave_kills.entry(killer.clone()).or_default() += 1;
        }
        KillCredit::Credited { wave }
    }

    /// Adds damage dealt by `player` to an actor of this session.
    pub fn record_damage(&self, handle: ActorHandle, player: &PlayerId, amount: u64) -> bool {
        let mut inner = self.lock();
        if !inner.roster.contains_key(&handle) {
            return false;
        }
        let tally = inner.participants.entry(player.clone()).or_default();
        tally.damage_dealt = tally.damage_dealt.saturating_add(amount);
        true
    }

    /// Players with at least one kill over the whole session.
    pub fn session_participants(&self) -> Vec<PlayerId> {
        let inner = self.lock();
        let mut players: Vec<PlayerId> = inner
            .participants
            .iter()
            .filter(|(_, tally)| tally.kills > 0)
            .map(|(player, _)| player.clone())
            .collect();
        players.sort();
        players
    }

    /// Moves the session to a terminal status.
    ///
    /// Returns `None` when the session had already ended, so exactly one
    /// caller performs cleanup and persistence.
    pub fn finish(
        &self,
        status: SessionStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Finalized> {
        debug_assert!(status.is_terminal());
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return None;
        }
        inner.status = status;
        inner.ended_at = Some(now);
        inner.end_reason = reason;
        let mut leftover_actors: Vec<ActorHandle> = inner.live_actors.drain().collect();
        leftover_actors.sort();
        Some(Finalized {
            status,
            leftover_actors,
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        let mut live_actors: Vec<ActorHandle> = inner.live_actors.iter().copied().collect();
        live_actors.sort();
        SessionSnapshot {
            session_id: self.session_id.clone(),
            definition_id: self.definition.id.clone(),
            display_name: self.definition.display_name.clone(),
            kind: self.definition.kind,
            scope: self.scope.clone(),
            status: inner.status,
            phase: inner.phase,
            current_wave_index: inner.current_wave_index,
            total_waves: self.definition.total_waves(),
            waves_cleared: inner.waves_cleared,
            live_actors,
            participants: inner
                .participants
                .iter()
                .map(|(player, tally)| (player.clone(), *tally))
                .collect(),
            actors_spawned: inner.actors_spawned,
            actors_killed: inner.actors_killed,
            started_at: self.started_at,
            ended_at: inner.ended_at,
            end_reason: inner.end_reason.clone(),
        }
    }

    pub fn started_entry(&self) -> SessionStarted {
        SessionStarted {
            session_id: self.session_id.clone(),
            definition_id: self.definition.id.clone(),
            display_name: self.definition.display_name.clone(),
            kind: self.definition.kind,
            scope: self.scope.clone(),
            total_waves: self.definition.total_waves(),
            started_at: self.started_at,
        }
    }
}

/// Point-in-time copy of a session. Owning it gives no access to the live
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub definition_id: String,
    pub display_name: String,
    pub kind: EncounterKind,
    pub scope: String,
    pub status: SessionStatus,
    pub phase: WavePhase,
    pub current_wave_index: usize,
    pub total_waves: usize,
    pub waves_cleared: usize,
    pub live_actors: Vec<ActorHandle>,
    pub participants: BTreeMap<PlayerId, ParticipantTally>,
    pub actors_spawned: u32,
    pub actors_killed: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
}

impl SessionSnapshot {
    pub fn total_kills(&self) -> u32 {
        self.participants.values().map(|t| t.kills).sum()
    }

    /// Flattens a terminal snapshot into its history record.
    pub fn to_history_record(&self) -> HistoryRecord {
        let ended_at = self.ended_at.unwrap_or_else(Utc::now);
        let mut participants: Vec<ParticipantTotal> = self
            .participants
            .iter()
            .map(|(player, tally)| ParticipantTotal {
                player: player.clone(),
                kills: tally.kills,
                damage_dealt: tally.damage_dealt,
            })
            .collect();
        participants.sort_by(|a, b| b.kills.cmp(&a.kills).then_with(|| a.player.cmp(&b.player)));
        let top_participant = participants.first().filter(|p| p.kills > 0).cloned();

        HistoryRecord {
            session_id: self.session_id.clone(),
            definition_id: self.definition_id.clone(),
            display_name: self.display_name.clone(),
            kind: self.kind,
            scope: self.scope.clone(),
            status: self.status,
            end_reason: self.end_reason.clone(),
            started_at: self.started_at,
            ended_at,
            duration_secs: ended_at
                .signed_duration_since(self.started_at)
                .num_seconds()
                .max(0),
            total_waves: self.total_waves,
            waves_cleared: self.waves_cleared,
            actors_spawned: self.actors_spawned,
            actors_killed: self.actors_killed,
            top_participant,
            participants,
        }
    }
}
