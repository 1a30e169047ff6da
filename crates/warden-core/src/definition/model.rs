//! Encounter definition domain model.
//!
//! An [`EncounterDefinition`] is immutable once built. Sessions bind an
//! `Arc<EncounterDefinition>` at start time, so a reload of the definition
//! table never changes the waves or rewards of a session already running.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::error::DefinitionError;

/// Largest regular actor count a single wave may request.
pub const MAX_ACTORS_PER_WAVE: u32 = 1_000;

/// Presentation flavour of an encounter.
///
/// The engine treats every kind the same way; the kind only changes how the
/// encounter is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    #[default]
    Invasion,
    Event,
    Dungeon,
}

impl EncounterKind {
    /// Tag prepended to every broadcast for this kind.
    pub fn banner(&self) -> &'static str {
        match self {
            EncounterKind::Invasion => "[INVASION]",
            EncounterKind::Event => "[EVENT]",
            EncounterKind::Dungeon => "[DUNGEON]",
        }
    }

    /// Verb used when the encounter ends successfully.
    pub fn victory_phrase(&self) -> &'static str {
        match self {
            EncounterKind::Invasion => "has been repelled",
            EncounterKind::Event => "has been completed",
            EncounterKind::Dungeon => "has been cleared",
        }
    }
}

/// Boss modifiers for a wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossSpec {
    /// Name shown above the boss actor.
    pub name: String,
    /// Factor applied to the actor kind's base max health.
    pub health_multiplier: f64,
}

/// One ordered phase of an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveSpec {
    pub actor_kind: String,
    pub count: u32,
    pub level: u32,
    /// When set, one extra high-health actor is spawned alongside `count`.
    pub boss: Option<BossSpec>,
    /// Pause between the previous wave clearing and this wave spawning.
    pub delay_before_start: Duration,
}

impl WaveSpec {
    pub fn is_boss_wave(&self) -> bool {
        self.boss.is_some()
    }

    /// Number of actors this wave asks the world to spawn.
    pub fn planned_actors(&self) -> u32 {
        self.count.saturating_add(u32::from(self.boss.is_some()))
    }

    /// Short composition text such as `3x ZOMBIE (Lv.4) + boss King`.
    pub fn composition(&self) -> String {
        let mut text = format!("{}x {} (Lv.{})", self.count, self.actor_kind, self.level);
        if let Some(boss) = &self.boss {
            text.push_str(&format!(" + boss {}", boss.name));
        }
        text
    }
}

/// Reward formula of an encounter. All amounts are whole numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RewardSpec {
    pub xp_per_wave: u64,
    pub currency_per_wave: u64,
    pub completion_xp_bonus: u64,
    pub completion_currency_bonus: u64,
    pub bonus_item_pool: Vec<String>,
    /// Per-participant chance of a bonus item on completion, in `0.0..=1.0`.
    pub bonus_item_chance: f64,
}

/// When the clock proposes automatic starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    /// Fire at each listed local time of day.
    Fixed(Vec<NaiveTime>),
    /// Fire after a uniformly random delay in `min..=max`.
    Random { min: Duration, max: Duration },
    /// Never fire automatically.
    Manual,
}

/// Online player bounds checked when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGate {
    pub min: usize,
    pub max: usize,
}

impl PlayerGate {
    pub fn admits(&self, online: usize) -> bool {
        online >= self.min && online <= self.max
    }
}

/// Immutable configuration for one encounter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterDefinition {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub kind: EncounterKind,
    /// Scopes the encounter may run in. Empty means any scope.
    pub target_scopes: BTreeSet<String>,
    pub waves: Vec<WaveSpec>,
    pub rewards: RewardSpec,
    pub schedule: Schedule,
    pub enabled: bool,
    /// Overall cap after which a running session fails.
    pub max_duration: Option<Duration>,
    pub player_gate: Option<PlayerGate>,
}

impl EncounterDefinition {
    pub fn total_waves(&self) -> usize {
        self.waves.len()
    }

    pub fn wave(&self, index: usize) -> Option<&WaveSpec> {
        self.waves.get(index)
    }

    pub fn allows_scope(&self, scope: &str) -> bool {
        self.target_scopes.is_empty() || self.target_scopes.contains(scope)
    }

    /// Whether the clock may start this definition on its own.
    pub fn is_auto_scheduled(&self) -> bool {
        self.enabled && !matches!(self.schedule, Schedule::Manual)
    }

    /// Checks the structural invariants of the definition.
    ///
    /// Boss waves before the final wave are accepted; they only produce a
    /// warning.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::MissingId);
        }
        if self.waves.is_empty() {
            return Err(DefinitionError::EmptyWaves {
                id: self.id.clone(),
            });
        }

        for (index, wave) in self.waves.iter().enumerate() {
            if wave.actor_kind.trim().is_empty() {
                return Err(DefinitionError::InvalidWave {
                    id: self.id.clone(),
                    wave: index,
                    reason: "actor kind is empty".to_string(),
                });
            }
            if wave.count > MAX_ACTORS_PER_WAVE {
                return Err(DefinitionError::InvalidWave {
                    id: self.id.clone(),
                    wave: index,
                    reason: format!(
                        "count {} exceeds the limit of {MAX_ACTORS_PER_WAVE}",
                        wave.count
                    ),
                });
            }
            if wave.planned_actors() == 0 {
                return Err(DefinitionError::InvalidWave {
                    id: self.id.clone(),
                    wave: index,
                    reason: "wave spawns no actors".to_string(),
                });
            }
            if let Some(boss) = &wave.boss {
                if !(boss.health_multiplier.is_finite() && boss.health_multiplier > 0.0) {
                    return Err(DefinitionError::InvalidWave {
                        id: self.id.clone(),
                        wave: index,
                        reason: format!(
                            "boss health multiplier must be positive, got {}",
                            boss.health_multiplier
                        ),
                    });
                }
                if index + 1 != self.waves.len() {
                    tracing::warn!(
                        definition_id = %self.id,
                        wave = index,
                        "boss wave is not the final wave"
                    );
                }
            }
        }

        match &self.schedule {
            Schedule::Fixed(times) if times.is_empty() => {
                return Err(DefinitionError::InvalidSchedule {
                    id: self.id.clone(),
                    reason: "fixed schedule lists no times".to_string(),
                });
            }
            Schedule::Random { min, max } if min > max || max.is_zero() => {
                return Err(DefinitionError::InvalidSchedule {
                    id: self.id.clone(),
                    reason: format!("random interval {min:?}..={max:?} is empty"),
                });
            }
            _ => {}
        }
        // An automatic start picks one of the target scopes.
        if !matches!(self.schedule, Schedule::Manual) && self.target_scopes.is_empty() {
            return Err(DefinitionError::InvalidSchedule {
                id: self.id.clone(),
                reason: "automatic schedule needs at least one target scope".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.rewards.bonus_item_chance) {
            return Err(DefinitionError::InvalidRewards {
                id: self.id.clone(),
                reason: format!(
                    "bonus item chance {} is outside 0..=1",
                    self.rewards.bonus_item_chance
                ),
            });
        }

        if let Some(gate) = self.player_gate {
            if gate.min > gate.max {
                return Err(DefinitionError::InvalidPlayerGate {
                    id: self.id.clone(),
                    min: gate.min,
                    max: gate.max,
                });
            }
        }

        Ok(())
    }
}
