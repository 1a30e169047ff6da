//! Hand-written collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use warden_application::EncounterOrchestrator;
use warden_core::config::WardenConfig;
use warden_core::definition::{
    BossSpec, EncounterDefinition, EncounterKind, RewardSpec, Schedule, WaveSpec,
};
use warden_core::error::{Result, WardenError};
use warden_core::reward::{RewardError, RewardSink};
use warden_core::session::{HistoryRecord, HistoryStore, SessionStarted};
use warden_core::world::{
    ActorHandle, ActuatorError, Location, PlayerId, PlayerPresence, SpawnRequest, WorldActuator,
};
use warden_infrastructure::InMemoryHistoryStore;

// ============================================================================
// World
// ============================================================================

#[derive(Default)]
pub struct FakeWorld {
    next_handle: AtomicU64,
    alive: Mutex<HashSet<ActorHandle>>,
    spawned: Mutex<Vec<(ActorHandle, SpawnRequest)>>,
    removed: Mutex<Vec<ActorHandle>>,
    players: Mutex<HashMap<String, Vec<PlayerPresence>>>,
    unloaded: Mutex<HashSet<String>>,
}

impl FakeWorld {
    pub fn join(&self, scope: &str, player: &str) {
        self.players
            .lock()
            .unwrap()
            .entry(scope.to_string())
            .or_default()
            .push(PlayerPresence {
                player: PlayerId::new(player),
                location: Location::new(0.0, 64.0, 0.0),
            });
    }

    pub fn clear_players(&self, scope: &str) {
        self.players.lock().unwrap().remove(scope);
    }

    pub fn unload(&self, scope: &str) {
        self.unloaded.lock().unwrap().insert(scope.to_string());
    }

    pub fn kill(&self, handle: ActorHandle) {
        self.alive.lock().unwrap().remove(&handle);
    }

    /// Handles spawned so far, in spawn order.
    pub fn spawned_handles(&self) -> Vec<ActorHandle> {
        self.spawned.lock().unwrap().iter().map(|(h, _)| *h).collect()
    }

    pub fn spawn_requests(&self) -> Vec<SpawnRequest> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn alive_handles(&self) -> Vec<ActorHandle> {
        let mut handles: Vec<_> = self.alive.lock().unwrap().iter().copied().collect();
        handles.sort();
        handles
    }

    pub fn removed(&self) -> Vec<ActorHandle> {
        self.removed.lock().unwrap().clone()
    }
}

impl WorldActuator for FakeWorld {
    fn spawn_actor(&self, request: &SpawnRequest) -> std::result::Result<ActorHandle, ActuatorError> {
        let handle = ActorHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.alive.lock().unwrap().insert(handle);
        self.spawned.lock().unwrap().push((handle, request.clone()));
        Ok(handle)
    }

    fn is_alive(&self, handle: ActorHandle) -> bool {
        self.alive.lock().unwrap().contains(&handle)
    }

    fn remove_actor(&self, handle: ActorHandle) -> std::result::Result<(), ActuatorError> {
        self.alive.lock().unwrap().remove(&handle);
        self.removed.lock().unwrap().push(handle);
        Ok(())
    }

    fn online_players_in(
        &self,
        scope: &str,
    ) -> std::result::Result<Vec<PlayerPresence>, ActuatorError> {
        if self.unloaded.lock().unwrap().contains(scope) {
            return Err(ActuatorError::ScopeUnavailable(scope.to_string()));
        }
        Ok(self
            .players
            .lock()
            .unwrap()
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Rewards
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    grants: Mutex<Vec<(PlayerId, u64, u64)>>,
    items: Mutex<Vec<PlayerId>>,
}

impl RecordingSink {
    pub fn grants(&self) -> Vec<(PlayerId, u64, u64)> {
        self.grants.lock().unwrap().clone()
    }

    pub fn grants_for(&self, player: &str) -> Vec<(u64, u64)> {
        self.grants
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _, _)| p.as_str() == player)
            .map(|(_, xp, currency)| (*xp, *currency))
            .collect()
    }

    pub fn item_draws(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

impl RewardSink for RecordingSink {
    fn grant(
        &self,
        player: &PlayerId,
        xp: u64,
        currency: u64,
    ) -> std::result::Result<(), RewardError> {
        self.grants
            .lock()
            .unwrap()
            .push((player.clone(), xp, currency));
        Ok(())
    }

    fn grant_item_chance(
        &self,
        player: &PlayerId,
        pool: &[String],
        _chance: f64,
    ) -> std::result::Result<Option<String>, RewardError> {
        self.items.lock().unwrap().push(player.clone());
        Ok(pool.first().cloned())
    }
}

// ============================================================================
// History
// ============================================================================

/// Fails the first `failures` appends, then delegates.
pub struct FlakyHistory {
    pub inner: InMemoryHistoryStore,
    failures: AtomicU32,
    pub attempts: AtomicU32,
}

impl FlakyHistory {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryHistoryStore::new(),
            failures: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl HistoryStore for FlakyHistory {
    async fn record_start(&self, started: &SessionStarted) -> Result<()> {
        self.inner.record_start(started).await
    }

    async fn append_record(&self, record: &HistoryRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(WardenError::data_access("disk full"));
        }
        self.inner.append_record(record).await
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.inner.query_recent(limit).await
    }

    async fn query_by_definition(
        &self,
        definition_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>> {
        self.inner.query_by_definition(definition_id, limit).await
    }
}

/// Never answers an append in time.
pub struct HangingHistory;

#[async_trait]
impl HistoryStore for HangingHistory {
    async fn append_record(&self, _record: &HistoryRecord) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn query_recent(&self, _limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(Vec::new())
    }

    async fn query_by_definition(&self, _id: &str, _limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(Vec::new())
    }
}

/// Takes `delay` for every append and signals `entered` when one begins.
pub struct SlowHistory {
    pub inner: InMemoryHistoryStore,
    pub entered: Notify,
    delay: Duration,
}

impl SlowHistory {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryHistoryStore::new(),
            entered: Notify::new(),
            delay,
        }
    }
}

#[async_trait]
impl HistoryStore for SlowHistory {
    async fn append_record(&self, record: &HistoryRecord) -> Result<()> {
        self.entered.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.append_record(record).await
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.inner.query_recent(limit).await
    }

    async fn query_by_definition(
        &self,
        definition_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>> {
        self.inner.query_by_definition(definition_id, limit).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn test_config() -> WardenConfig {
    WardenConfig {
        // Background polling stays idle; tests drive `poll_session` directly.
        poll_interval_ms: 60_000,
        history_retry_attempts: 3,
        history_retry_backoff_ms: 1,
        history_write_timeout_ms: 200,
        ..WardenConfig::default()
    }
}

pub fn wave(kind: &str, count: u32) -> WaveSpec {
    WaveSpec {
        actor_kind: kind.to_string(),
        count,
        level: 1,
        boss: None,
        delay_before_start: Duration::ZERO,
    }
}

pub fn definition(id: &str, waves: Vec<WaveSpec>) -> EncounterDefinition {
    EncounterDefinition {
        id: id.to_string(),
        display_name: id.to_string(),
        description: String::new(),
        kind: EncounterKind::Invasion,
        target_scopes: Default::default(),
        waves,
        rewards: RewardSpec::default(),
        schedule: Schedule::Manual,
        enabled: true,
        max_duration: None,
        player_gate: None,
    }
}

/// Two waves: three zombies, then two zombies and the King boss.
pub fn king_definition() -> EncounterDefinition {
    let mut boss_wave = wave("ZOMBIE", 2);
    boss_wave.boss = Some(BossSpec {
        name: "King".to_string(),
        health_multiplier: 5.0,
    });
    let mut def = definition("king", vec![wave("ZOMBIE", 3), boss_wave]);
    def.rewards = RewardSpec {
        xp_per_wave: 500,
        currency_per_wave: 100,
        completion_xp_bonus: 2000,
        completion_currency_bonus: 500,
        bonus_item_pool: Vec::new(),
        bonus_item_chance: 0.0,
    };
    def
}

pub struct Harness {
    pub orchestrator: EncounterOrchestrator,
    pub world: Arc<FakeWorld>,
    pub rewards: Arc<RecordingSink>,
    pub history: InMemoryHistoryStore,
}

pub async fn harness(definitions: Vec<EncounterDefinition>) -> Harness {
    let world = Arc::new(FakeWorld::default());
    let rewards = Arc::new(RecordingSink::default());
    let history = InMemoryHistoryStore::new();
    let orchestrator = EncounterOrchestrator::new(
        world.clone(),
        rewards.clone(),
        Arc::new(history.clone()),
        test_config(),
    );
    orchestrator.load_definitions(&definitions).await.unwrap();
    Harness {
        orchestrator,
        world,
        rewards,
        history,
    }
}

impl Harness {
    /// Credits and kills every actor still alive, rotating through `killers`.
    pub async fn kill_all_alive(&self, killers: &[&str]) {
        for (i, handle) in self.world.alive_handles().into_iter().enumerate() {
            let killer = PlayerId::new(killers[i % killers.len()]);
            self.orchestrator.record_kill(handle, &killer).await;
            self.world.kill(handle);
        }
    }
}
