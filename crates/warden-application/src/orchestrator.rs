//! The encounter orchestrator.
//!
//! One [`EncounterOrchestrator`] owns the definition table and the live
//! session map for the whole process. It is cheap to clone (all state sits
//! behind one `Arc`) so background tasks and command handlers each hold their
//! own handle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use warden_core::config::WardenConfig;
use warden_core::definition::{DefinitionError, DefinitionSource, EncounterDefinition};
use warden_core::error::{Result, StartError};
use warden_core::event::EncounterEvent;
use warden_core::reward::RewardSink;
use warden_core::session::{
    HistoryRecord, HistoryStore, KillCredit, NextStep, SessionId, SessionSnapshot, SessionState,
    SessionStatus,
};
use warden_core::world::{ActorHandle, PlayerId, WorldActuator};

use crate::progressor::{TickOutcome, WaveProgressor};
use crate::settler::RewardSettler;

const EVENT_CAPACITY: usize = 256;

/// Upper bound on transitions applied by one poll, so a degenerate
/// definition (zero-delay waves that never spawn) cannot spin a poll forever.
const MAX_STEPS_PER_POLL: usize = 64;

/// Result of a definition reload.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub rejected: Vec<DefinitionError>,
}

struct OrchestratorInner {
    definitions: RwLock<HashMap<String, Arc<EncounterDefinition>>>,
    sessions: RwLock<HashMap<SessionId, Arc<SessionState>>>,
    world: Arc<dyn WorldActuator>,
    history: Arc<dyn HistoryStore>,
    settler: RewardSettler,
    progressor: WaveProgressor,
    events: broadcast::Sender<EncounterEvent>,
    generation: watch::Sender<u64>,
    config: WardenConfig,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

/// Starts, advances, cancels and records encounter sessions.
///
/// # Invariants
///
/// - At most one `Active` session per scope.
/// - A session reaches a terminal status exactly once; only that transition
///   cleans up actors, writes history and announces the end.
/// - A session leaves the live map after its history write was attempted,
///   whether or not the write succeeded.
#[derive(Clone)]
pub struct EncounterOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl EncounterOrchestrator {
    pub fn new(
        world: Arc<dyn WorldActuator>,
        rewards: Arc<dyn RewardSink>,
        history: Arc<dyn HistoryStore>,
        config: WardenConfig,
    ) -> Self {
        let settler = RewardSettler::new(rewards);
        let progressor = WaveProgressor::new(world.clone(), settler.clone(), &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (generation, _) = watch::channel(0);

        Self {
            inner: Arc::new(OrchestratorInner {
                definitions: RwLock::new(HashMap::new()),
                sessions: RwLock::new(HashMap::new()),
                world,
                history,
                settler,
                progressor,
                events,
                generation,
                config,
                shutdown: CancellationToken::new(),
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> &WardenConfig {
        &self.inner.config
    }

    /// Receives every lifecycle event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EncounterEvent> {
        self.inner.events.subscribe()
    }

    /// Ticks each time the definition table is replaced.
    pub fn subscribe_definitions(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }

    /// Cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.inner.tasks
    }

    /// Closes sessions a previous process left open. Run once at startup.
    pub async fn recover_interrupted(&self) -> Result<Vec<HistoryRecord>> {
        let recovered = self.inner.history.recover_interrupted().await?;
        if !recovered.is_empty() {
            tracing::warn!(
                count = recovered.len(),
                "[Bootstrap] Recovered sessions interrupted by a previous run"
            );
        }
        Ok(recovered)
    }

    // ============================================================================
    // Definitions
    // ============================================================================

    /// Replaces the definition table with the valid entries of `source`.
    ///
    /// Live sessions keep the definition they were started with.
    pub async fn load_definitions(&self, source: &dyn DefinitionSource) -> Result<LoadReport> {
        let batch = source.load().await?;
        for rejected in &batch.rejected {
            tracing::warn!(source = %source.describe(), error = %rejected, "Skipping definition");
        }

        let table: HashMap<String, Arc<EncounterDefinition>> = batch
            .definitions
            .into_iter()
            .map(|definition| (definition.id.clone(), Arc::new(definition)))
            .collect();
        let loaded = table.len();

        *self.inner.definitions.write().await = table;
        self.inner.generation.send_modify(|generation| *generation += 1);

        tracing::info!(
            source = %source.describe(),
            loaded,
            rejected = batch.rejected.len(),
            "Definitions loaded"
        );
        Ok(LoadReport {
            loaded,
            rejected: batch.rejected,
        })
    }

    /// All loaded definitions, ordered by id.
    pub async fn definitions(&self) -> Vec<Arc<EncounterDefinition>> {
        let mut definitions: Vec<_> = self.inner.definitions.read().await.values().cloned().collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        definitions
    }

    pub async fn definition(&self, definition_id: &str) -> Option<Arc<EncounterDefinition>> {
        self.inner.definitions.read().await.get(definition_id).cloned()
    }

    // ============================================================================
    // Session lifecycle
    // ============================================================================

    /// Starts `definition_id` in `scope` and spawns its first wave before
    /// returning.
    pub async fn start_session(
        &self,
        definition_id: &str,
        scope: &str,
    ) -> std::result::Result<SessionId, StartError> {
        self.start_inner(definition_id, scope, false).await
    }

    /// Like [`Self::start_session`] but also starts disabled definitions.
    pub async fn force_start_session(
        &self,
        definition_id: &str,
        scope: &str,
    ) -> std::result::Result<SessionId, StartError> {
        self.start_inner(definition_id, scope, true).await
    }

    async fn start_inner(
        &self,
        definition_id: &str,
        scope: &str,
        force: bool,
    ) -> std::result::Result<SessionId, StartError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(StartError::ShuttingDown);
        }

        let definition = self
            .definition(definition_id)
            .await
            .ok_or_else(|| StartError::UnknownDefinition(definition_id.to_string()))?;
        if !definition.enabled && !force {
            return Err(StartError::DefinitionDisabled(definition.id.clone()));
        }
        if !definition.allows_scope(scope) {
            return Err(StartError::ScopeNotTargeted {
                definition_id: definition.id.clone(),
                scope: scope.to_string(),
            });
        }

        let players = self
            .inner
            .world
            .online_players_in(scope)
            .map_err(|e| StartError::ScopeUnavailable {
                scope: scope.to_string(),
                reason: e.to_string(),
            })?;
        if let Some(gate) = definition.player_gate {
            if !gate.admits(players.len()) {
                return Err(StartError::PlayerCount {
                    scope: scope.to_string(),
                    online: players.len(),
                    min: gate.min,
                    max: gate.max,
                });
            }
        }
        if players.is_empty() {
            return Err(StartError::ScopeUnavailable {
                scope: scope.to_string(),
                reason: "no players online".to_string(),
            });
        }

        let session = {
            let mut sessions = self.inner.sessions.write().await;
            // Checked under the lock so shutdown never misses a session.
            if self.inner.shutdown.is_cancelled() {
                return Err(StartError::ShuttingDown);
            }
            if let Some(existing) = sessions
                .values()
                .find(|s| s.scope() == scope && s.is_active())
            {
                return Err(StartError::AlreadyActive {
                    scope: scope.to_string(),
                    session_id: existing.session_id().to_string(),
                });
            }
            let session = Arc::new(SessionState::new(definition.clone(), scope, Utc::now()));
            sessions.insert(session.session_id().to_string(), session.clone());
            session
        };
        let session_id = session.session_id().to_string();

        tracing::info!(
            session_id = %session_id,
            definition_id = %definition.id,
            scope = %scope,
            forced = force,
            "Session started"
        );
        self.write_start_marker(&session).await;
        self.publish(EncounterEvent::Started {
            session_id: session_id.clone(),
            definition_id: definition.id.clone(),
            display_name: definition.display_name.clone(),
            kind: definition.kind,
            scope: scope.to_string(),
            total_waves: definition.total_waves(),
        });

        // Wave 0 spawns now so the caller can announce a running encounter.
        self.advance(&session, Utc::now()).await;

        let orchestrator = self.clone();
        let poll_id = session_id.clone();
        self.inner
            .tasks
            .spawn(async move { orchestrator.poll_loop(poll_id).await });

        Ok(session_id)
    }

    /// Cancels a live session. Returns `false` for unknown or already
    /// finished sessions.
    pub async fn cancel_session(&self, session_id: &str) -> bool {
        let Some(session) = self.session(session_id).await else {
            return false;
        };
        self.finish_session(&session, SessionStatus::Cancelled, Some("cancelled".to_string()))
            .await
    }

    /// Credits the kill of `actor` to `killer` in whichever session owns it.
    ///
    /// Returns `false` when no live session owns the actor.
    pub async fn record_kill(&self, actor: ActorHandle, killer: &PlayerId) -> bool {
        let sessions = self.inner.sessions.read().await;
        for session in sessions.values() {
            if let KillCredit::Credited { wave } = session.record_kill(actor, killer) {
                tracing::debug!(
                    session_id = %session.session_id(),
                    actor = %actor,
                    killer = %killer,
                    wave,
                    "Kill credited"
                );
                return true;
            }
        }
        false
    }

    /// Adds damage dealt by `player` to `actor` to the owning session's tally.
    pub async fn record_damage(&self, actor: ActorHandle, player: &PlayerId, amount: u64) -> bool {
        let sessions = self.inner.sessions.read().await;
        sessions
            .values()
            .any(|session| session.record_damage(actor, player, amount))
    }

    /// Snapshot of every active session keyed by session id.
    pub async fn get_active_sessions(&self) -> HashMap<SessionId, SessionSnapshot> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .values()
            .filter(|session| session.is_active())
            .map(|session| (session.session_id().to_string(), session.snapshot()))
            .collect()
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.session(session_id).await.map(|s| s.snapshot())
    }

    pub async fn query_history(
        &self,
        definition_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>> {
        match definition_id {
            Some(id) => self.inner.history.query_by_definition(id, limit).await,
            None => self.inner.history.query_recent(limit).await,
        }
    }

    /// Runs the timeout and abandon checks, then advances the session as far
    /// as `now` allows.
    ///
    /// The background poller calls this every `poll_interval`; tests call it
    /// directly with a chosen clock. Returns the session status afterwards,
    /// `None` once the session left the live map.
    pub async fn poll_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Option<SessionStatus> {
        let session = self.session(session_id).await?;
        if !session.is_active() {
            return Some(session.status());
        }

        if session.is_overdue(now) {
            tracing::warn!(session_id = %session_id, "Session exceeded its duration cap");
            self.finish_session(&session, SessionStatus::Failed, Some("timed out".to_string()))
                .await;
            return Some(session.status());
        }

        if self.inner.config.abandon_when_empty {
            match self.inner.world.online_players_in(session.scope()) {
                Ok(players) if players.is_empty() => {
                    tracing::warn!(
                        session_id = %session_id,
                        scope = %session.scope(),
                        "Scope emptied, abandoning session"
                    );
                    self.finish_session(
                        &session,
                        SessionStatus::Failed,
                        Some("abandoned".to_string()),
                    )
                    .await;
                    return Some(session.status());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    session_id = %session_id,
                    scope = %session.scope(),
                    error = %e,
                    "Player lookup failed during poll"
                ),
            }
        }

        self.advance(&session, now).await;
        Some(session.status())
    }

    /// Gracefully stops the orchestrator.
    ///
    /// New starts are refused, every live session is cancelled and recorded,
    /// then all background tasks are awaited.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let live: Vec<Arc<SessionState>> =
            self.inner.sessions.read().await.values().cloned().collect();
        tracing::info!(sessions = live.len(), "Shutting down orchestrator");

        let finishing = live.iter().map(|session| {
            self.finish_session(session, SessionStatus::Cancelled, Some("shutdown".to_string()))
        });
        futures::future::join_all(finishing).await;

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        tracing::info!("Orchestrator stopped");
    }

    // ============================================================================
    // Internals
    // ============================================================================

    async fn session(&self, session_id: &str) -> Option<Arc<SessionState>> {
        self.inner.sessions.read().await.get(session_id).cloned()
    }

    async fn poll_loop(self, session_id: SessionId) {
        let interval = self.inner.config.poll_interval();
        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            match self.poll_session(&session_id, Utc::now()).await {
                Some(SessionStatus::Active) => {}
                _ => break,
            }
        }
        tracing::debug!(session_id = %session_id, "Poller stopped");
    }

    /// Applies ticks until the session has to wait, publishing events and
    /// finalizing a session whose last wave was paid.
    async fn advance(&self, session: &Arc<SessionState>, now: DateTime<Utc>) {
        let definition = session.definition().clone();
        for _ in 0..MAX_STEPS_PER_POLL {
            match self.inner.progressor.tick(session, now) {
                TickOutcome::Waiting | TickOutcome::Terminal => return,
                TickOutcome::WaveSpawned { wave, spawned } => {
                    let composition = definition
                        .wave(wave)
                        .map(|spec| spec.composition())
                        .unwrap_or_default();
                    self.publish(EncounterEvent::WaveStarted {
                        session_id: session.session_id().to_string(),
                        kind: definition.kind,
                        display_name: definition.display_name.clone(),
                        wave,
                        total_waves: definition.total_waves(),
                        composition,
                        spawned,
                    });
                }
                TickOutcome::WaveCleared { wave, paid, next } => {
                    self.publish(EncounterEvent::WaveCleared {
                        session_id: session.session_id().to_string(),
                        kind: definition.kind,
                        display_name: definition.display_name.clone(),
                        wave,
                        total_waves: definition.total_waves(),
                        paid,
                    });
                    if next == NextStep::AllWavesCleared {
                        self.finish_session(session, SessionStatus::Completed, None)
                            .await;
                        return;
                    }
                }
            }
        }
        tracing::warn!(
            session_id = %session.session_id(),
            "Poll stopped after too many transitions"
        );
    }

    /// Moves `session` to `status` and does the end-of-session work.
    ///
    /// Returns `false` when another caller already finished the session.
    async fn finish_session(
        &self,
        session: &Arc<SessionState>,
        status: SessionStatus,
        reason: Option<String>,
    ) -> bool {
        let Some(finalized) = session.finish(status, reason.clone(), Utc::now()) else {
            return false;
        };
        // Shutdown waits for this finish even when a caller outside the tracker started it.
        let _in_flight = self.inner.tasks.token();
        let session_id = session.session_id().to_string();
        let definition = session.definition().clone();

        for handle in finalized.leftover_actors {
            if let Err(e) = self.inner.world.remove_actor(handle) {
                tracing::warn!(
                    session_id = %session_id,
                    actor = %handle,
                    error = %e,
                    "Actor removal failed"
                );
            }
        }

        if status == SessionStatus::Completed {
            let payout = self
                .inner
                .settler
                .pay_completion_bonus(&session.session_participants(), &definition.rewards);
            tracing::info!(
                session_id = %session_id,
                paid = payout.paid.len(),
                items = payout.items.len(),
                "Completion bonus paid"
            );
        }

        let record = session.snapshot().to_history_record();
        self.persist_record(&record).await;
        self.inner.sessions.write().await.remove(&session_id);

        tracing::info!(
            session_id = %session_id,
            definition_id = %definition.id,
            scope = %session.scope(),
            status = %status,
            waves_cleared = record.waves_cleared,
            "Session finished"
        );
        self.publish(EncounterEvent::Finished {
            session_id,
            kind: definition.kind,
            display_name: definition.display_name.clone(),
            status,
            reason,
            top_player: record.top_participant.map(|p| p.player),
        });
        true
    }

    /// Appends `record` with bounded retries. A record that still fails is
    /// logged as lost.
    async fn persist_record(&self, record: &HistoryRecord) -> bool {
        let config = &self.inner.config;
        let attempts = config.history_retry_attempts.max(1);

        for attempt in 1..=attempts {
            let write = tokio::time::timeout(
                config.history_write_timeout(),
                self.inner.history.append_record(record),
            )
            .await;
            match write {
                Ok(Ok(())) => return true,
                Ok(Err(e)) => tracing::warn!(
                    session_id = %record.session_id,
                    attempt,
                    error = %e,
                    "History write failed"
                ),
                Err(_) => tracing::warn!(
                    session_id = %record.session_id,
                    attempt,
                    "History write timed out"
                ),
            }
            if attempt < attempts {
                tokio::time::sleep(config.history_retry_backoff() * attempt).await;
            }
        }

        tracing::error!(
            session_id = %record.session_id,
            definition_id = %record.definition_id,
            status = %record.status,
            "History record lost after {} attempts",
            attempts
        );
        false
    }

    async fn write_start_marker(&self, session: &SessionState) {
        let started = session.started_entry();
        let write = tokio::time::timeout(
            self.inner.config.history_write_timeout(),
            self.inner.history.record_start(&started),
        )
        .await;
        match write {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(
                session_id = %started.session_id,
                error = %e,
                "Start marker not written"
            ),
            Err(_) => tracing::warn!(session_id = %started.session_id, "Start marker timed out"),
        }
    }

    fn publish(&self, event: EncounterEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
