//! Wave progression for a single session.
//!
//! The progressor owns the actuator side of the state machine held by
//! [`SessionState`]: it spawns due waves, sweeps dead actors and pays cleared
//! waves. Every transition is claimed on the session first, so concurrent
//! ticks on the same session are safe and at most one of them acts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use warden_core::config::WardenConfig;
use warden_core::session::{NextStep, SessionState, SweepOutcome};
use warden_core::world::{Location, PlayerId, PlayerPresence, SpawnRequest, WorldActuator};

use crate::settler::RewardSettler;

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do yet: actors alive, or the next wave's delay has not run.
    Waiting,
    WaveSpawned {
        wave: usize,
        spawned: u32,
    },
    WaveCleared {
        wave: usize,
        paid: Vec<PlayerId>,
        next: NextStep,
    },
    /// The session is no longer active.
    Terminal,
}

#[derive(Clone)]
pub struct WaveProgressor {
    world: Arc<dyn WorldActuator>,
    settler: RewardSettler,
    spawn_spread: f64,
    boss_spawn_height: f64,
}

impl WaveProgressor {
    pub fn new(world: Arc<dyn WorldActuator>, settler: RewardSettler, config: &WardenConfig) -> Self {
        Self {
            world,
            settler,
            spawn_spread: config.spawn_spread.abs(),
            boss_spawn_height: config.boss_spawn_height,
        }
    }

    /// Advances `session` by at most one step.
    pub fn tick(&self, session: &SessionState, now: DateTime<Utc>) -> TickOutcome {
        if let Some(wave) = session.begin_due_wave(now) {
            let spawned = self.spawn_wave(session, wave);
            return TickOutcome::WaveSpawned { wave, spawned };
        }

        match session.sweep(|handle| self.world.is_alive(handle)) {
            SweepOutcome::Cleared { wave, payees } => {
                let paid = self
                    .settler
                    .pay_wave_rewards(&payees, &session.definition().rewards);
                tracing::info!(
                    session_id = %session.session_id(),
                    wave,
                    paid = paid.len(),
                    "Wave cleared"
                );
                let next = session.advance_after_payout(now);
                TickOutcome::WaveCleared { wave, paid, next }
            }
            SweepOutcome::Terminal => TickOutcome::Terminal,
            SweepOutcome::Pending { .. } | SweepOutcome::Idle => TickOutcome::Waiting,
        }
    }

    /// Spawns the regular actors and the optional boss of `wave`.
    ///
    /// Spawn failures are logged and skipped; the wave proceeds with whatever
    /// was actually spawned.
    fn spawn_wave(&self, session: &SessionState, wave: usize) -> u32 {
        let Some(spec) = session.definition().wave(wave) else {
            tracing::error!(session_id = %session.session_id(), wave, "Wave index out of range");
            session.mark_in_progress(wave);
            return 0;
        };

        let players = match self.world.online_players_in(session.scope()) {
            Ok(players) => players,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.session_id(),
                    scope = %session.scope(),
                    error = %e,
                    "Cannot locate players for spawning"
                );
                Vec::new()
            }
        };
        if players.is_empty() {
            tracing::warn!(
                session_id = %session.session_id(),
                scope = %session.scope(),
                wave,
                "No players online, wave spawns nothing"
            );
        }

        let mut requests = Vec::with_capacity(spec.planned_actors() as usize);
        {
            let mut rng = rand::thread_rng();
            if !players.is_empty() {
                for _ in 0..spec.count {
                    let anchor = pick_anchor(&players, &mut rng);
                    let location = anchor.offset(
                        self.jitter(&mut rng),
                        0.0,
                        self.jitter(&mut rng),
                    );
                    requests.push(SpawnRequest {
                        scope: session.scope().to_string(),
                        actor_kind: spec.actor_kind.clone(),
                        location,
                        level: spec.level,
                        display_name: format!("{} Lv.{}", spec.actor_kind, spec.level),
                        health_multiplier: 1.0,
                        boss: false,
                    });
                }
                if let Some(boss) = &spec.boss {
                    let anchor = pick_anchor(&players, &mut rng);
                    requests.push(SpawnRequest {
                        scope: session.scope().to_string(),
                        actor_kind: spec.actor_kind.clone(),
                        location: anchor.offset(0.0, self.boss_spawn_height, 0.0),
                        level: spec.level,
                        display_name: boss.name.clone(),
                        health_multiplier: boss.health_multiplier,
                        boss: true,
                    });
                }
            }
        }

        let mut spawned = 0;
        for request in &requests {
            match self.world.spawn_actor(request) {
                Ok(handle) => {
                    if session.track_actor(handle, wave) {
                        spawned += 1;
                    } else {
                        // Session ended while spawning; do not leave the actor behind.
                        let _ = self.world.remove_actor(handle);
                    }
                }
                Err(e) => tracing::warn!(
                    session_id = %session.session_id(),
                    wave,
                    kind = %request.actor_kind,
                    boss = request.boss,
                    error = %e,
                    "Actor spawn failed"
                ),
            }
        }

        if spawned < spec.planned_actors() {
            tracing::warn!(
                session_id = %session.session_id(),
                wave,
                planned = spec.planned_actors(),
                spawned,
                "Wave under-spawned"
            );
        }
        session.mark_in_progress(wave);
        tracing::info!(
            session_id = %session.session_id(),
            scope = %session.scope(),
            wave,
            spawned,
            "Wave spawned"
        );
        spawned
    }

    fn jitter<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.spawn_spread == 0.0 {
            return 0.0;
        }
        rng.gen_range(-self.spawn_spread..=self.spawn_spread)
    }
}

fn pick_anchor<R: Rng>(players: &[PlayerPresence], rng: &mut R) -> Location {
    players
        .choose(rng)
        .map(|presence| presence.location)
        .unwrap_or_default()
}
