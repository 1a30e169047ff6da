//! In-process world and economy used by the interactive shell.
//!
//! Scopes come into existence when the first player joins them. Actors live
//! until an operator kills them from the prompt.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rand::Rng;
use rand::seq::SliceRandom;

use warden_core::reward::{RewardError, RewardSink};
use warden_core::world::{
    ActorHandle, ActuatorError, Location, PlayerId, PlayerPresence, SpawnRequest, WorldActuator,
};

#[derive(Debug, Clone)]
pub struct SimActor {
    pub handle: ActorHandle,
    pub scope: String,
    pub display_name: String,
    pub boss: bool,
}

#[derive(Default)]
struct SimState {
    scopes: BTreeMap<String, Vec<PlayerPresence>>,
    actors: BTreeMap<ActorHandle, SimActor>,
}

#[derive(Default)]
pub struct SimulatedWorld {
    next_handle: AtomicU64,
    state: Mutex<SimState>,
}

impl SimulatedWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Puts `player` into `scope`, loading the scope if needed.
    pub fn join(&self, scope: &str, player: PlayerId) {
        let mut state = self.state();
        let players = state.scopes.entry(scope.to_string()).or_default();
        if players.iter().any(|p| p.player == player) {
            return;
        }
        let spot = players.len() as f64 * 2.0;
        players.push(PlayerPresence {
            player,
            location: Location::new(spot, 64.0, spot),
        });
    }

    /// Returns `false` when the player was not in the scope.
    pub fn leave(&self, scope: &str, player: &PlayerId) -> bool {
        let mut state = self.state();
        let Some(players) = state.scopes.get_mut(scope) else {
            return false;
        };
        let before = players.len();
        players.retain(|p| &p.player != player);
        before != players.len()
    }

    /// Removes the actor as if it had died. `false` if it was not alive.
    pub fn slay(&self, handle: ActorHandle) -> bool {
        self.state().actors.remove(&handle).is_some()
    }

    pub fn alive_actors(&self, scope: Option<&str>) -> Vec<SimActor> {
        self.state()
            .actors
            .values()
            .filter(|actor| scope.is_none_or(|s| actor.scope == s))
            .cloned()
            .collect()
    }

    pub fn scopes(&self) -> Vec<(String, usize)> {
        self.state()
            .scopes
            .iter()
            .map(|(scope, players)| (scope.clone(), players.len()))
            .collect()
    }
}

impl WorldActuator for SimulatedWorld {
    fn spawn_actor(&self, request: &SpawnRequest) -> Result<ActorHandle, ActuatorError> {
        let mut state = self.state();
        if !state.scopes.contains_key(&request.scope) {
            return Err(ActuatorError::ScopeUnavailable(request.scope.clone()));
        }
        let handle = ActorHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        state.actors.insert(
            handle,
            SimActor {
                handle,
                scope: request.scope.clone(),
                display_name: request.display_name.clone(),
                boss: request.boss,
            },
        );
        Ok(handle)
    }

    fn is_alive(&self, handle: ActorHandle) -> bool {
        self.state().actors.contains_key(&handle)
    }

    fn remove_actor(&self, handle: ActorHandle) -> Result<(), ActuatorError> {
        self.state().actors.remove(&handle);
        Ok(())
    }

    fn online_players_in(&self, scope: &str) -> Result<Vec<PlayerPresence>, ActuatorError> {
        self.state()
            .scopes
            .get(scope)
            .cloned()
            .ok_or_else(|| ActuatorError::ScopeUnavailable(scope.to_string()))
    }
}

/// Running totals for one player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    pub xp: u64,
    pub currency: u64,
    pub items: Vec<String>,
}

/// Reward sink that keeps balances in memory and logs every grant.
#[derive(Default)]
pub struct LedgerRewardSink {
    ledgers: Mutex<HashMap<PlayerId, Ledger>>,
}

impl LedgerRewardSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balances(&self) -> BTreeMap<PlayerId, Ledger> {
        self.ledgers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(player, ledger)| (player.clone(), ledger.clone()))
            .collect()
    }
}

impl RewardSink for LedgerRewardSink {
    fn grant(&self, player: &PlayerId, xp: u64, currency: u64) -> Result<(), RewardError> {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        let ledger = ledgers.entry(player.clone()).or_default();
        ledger.xp = ledger.xp.saturating_add(xp);
        ledger.currency = ledger.currency.saturating_add(currency);
        tracing::info!("[Rewards] {} +{} xp, +{} coins", player, xp, currency);
        Ok(())
    }

    fn grant_item_chance(
        &self,
        player: &PlayerId,
        pool: &[String],
        chance: f64,
    ) -> Result<Option<String>, RewardError> {
        let mut rng = rand::thread_rng();
        if pool.is_empty() || !rng.gen_bool(chance.clamp(0.0, 1.0)) {
            return Ok(None);
        }
        let Some(item) = pool.choose(&mut rng).cloned() else {
            return Ok(None);
        };
        self.ledgers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(player.clone())
            .or_default()
            .items
            .push(item.clone());
        tracing::info!("[Rewards] {} received {}", player, item);
        Ok(Some(item))
    }
}
