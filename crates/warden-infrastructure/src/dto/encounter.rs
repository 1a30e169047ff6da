//! Encounter definition DTOs and conversion to the domain model.
//!
//! File shape:
//!
//! ```json
//! {
//!   "encounters": [
//!     {
//!       "id": "night_horde",
//!       "displayName": "Night Horde",
//!       "kind": "invasion",
//!       "targetScopes": ["overworld"],
//!       "schedule": { "scheduleType": "FIXED", "fixedTimes": ["20:00"] },
//!       "waves": [{ "mobType": "ZOMBIE", "count": 5, "level": 3 }],
//!       "rewards": { "xpPerWave": 50, "coinsPerWave": 10 }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use warden_core::definition::{
    BossSpec, DefinitionBatch, DefinitionError, EncounterDefinition, EncounterKind, PlayerGate,
    RewardSpec, Schedule, WaveSpec,
};
use warden_core::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterDocumentDto {
    pub encounters: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterDto {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: EncounterKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub target_scopes: Vec<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleDto>,
    pub waves: Vec<WaveDto>,
    #[serde(default)]
    pub rewards: RewardsDto,
    #[serde(default)]
    pub player_gate: Option<PlayerGateDto>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDto {
    /// `FIXED`, `RANDOM` or `MANUAL`, case-insensitive.
    pub schedule_type: String,
    /// `HH:MM` local times.
    #[serde(default)]
    pub fixed_times: Vec<String>,
    #[serde(default)]
    pub random_min_hours: f64,
    #[serde(default)]
    pub random_max_hours: f64,
    /// Overall session cap; zero or absent means no cap.
    #[serde(default)]
    pub duration_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveDto {
    #[serde(alias = "actorKind")]
    pub mob_type: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub delay_seconds: u64,
    #[serde(default)]
    pub boss: Option<BossDto>,
}

fn default_level() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossDto {
    pub name: String,
    #[serde(default = "default_health_multiplier")]
    pub health_multiplier: f64,
}

fn default_health_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsDto {
    #[serde(default)]
    pub xp_per_wave: u64,
    #[serde(default)]
    pub coins_per_wave: u64,
    #[serde(default)]
    pub xp_bonus: u64,
    #[serde(default)]
    pub coins_bonus: u64,
    #[serde(default)]
    pub special_items: Vec<String>,
    #[serde(default)]
    pub bonus_item_chance: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerGateDto {
    pub min: usize,
    pub max: usize,
}

impl EncounterDto {
    /// Converts to the domain model. `default_item_chance` fills an absent
    /// `bonusItemChance`.
    pub fn into_domain(
        self,
        default_item_chance: f64,
    ) -> std::result::Result<EncounterDefinition, DefinitionError> {
        let id = self.id;
        let (schedule, max_duration) = match self.schedule {
            Some(dto) => dto.into_domain(&id)?,
            None => (Schedule::Manual, None),
        };

        let waves = self
            .waves
            .into_iter()
            .map(|wave| WaveSpec {
                actor_kind: wave.mob_type,
                count: wave.count,
                level: wave.level.max(1),
                boss: wave.boss.map(|boss| BossSpec {
                    name: boss.name,
                    health_multiplier: boss.health_multiplier,
                }),
                delay_before_start: Duration::from_secs(wave.delay_seconds),
            })
            .collect();

        Ok(EncounterDefinition {
            display_name: self.display_name.unwrap_or_else(|| id.clone()),
            description: self.description,
            kind: self.kind,
            target_scopes: self.target_scopes.into_iter().collect::<BTreeSet<_>>(),
            waves,
            rewards: RewardSpec {
                xp_per_wave: self.rewards.xp_per_wave,
                currency_per_wave: self.rewards.coins_per_wave,
                completion_xp_bonus: self.rewards.xp_bonus,
                completion_currency_bonus: self.rewards.coins_bonus,
                bonus_item_pool: self.rewards.special_items,
                bonus_item_chance: self.rewards.bonus_item_chance.unwrap_or(default_item_chance),
            },
            schedule,
            enabled: self.enabled,
            max_duration,
            player_gate: self.player_gate.map(|gate| PlayerGate {
                min: gate.min,
                max: gate.max,
            }),
            id,
        })
    }
}

impl ScheduleDto {
    fn into_domain(
        self,
        id: &str,
    ) -> std::result::Result<(Schedule, Option<Duration>), DefinitionError> {
        let invalid = |reason: String| DefinitionError::InvalidSchedule {
            id: id.to_string(),
            reason,
        };

        let schedule = match self.schedule_type.to_ascii_uppercase().as_str() {
            "FIXED" => {
                let times = self
                    .fixed_times
                    .iter()
                    .map(|text| {
                        NaiveTime::parse_from_str(text.trim(), "%H:%M")
                            .map_err(|e| invalid(format!("bad time '{text}': {e}")))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Schedule::Fixed(times)
            }
            "RANDOM" => {
                let hours = |h: f64| {
                    Duration::try_from_secs_f64(h * 3600.0)
                        .map_err(|_| invalid(format!("bad hour value {h}")))
                };
                Schedule::Random {
                    min: hours(self.random_min_hours)?,
                    max: hours(self.random_max_hours)?,
                }
            }
            "MANUAL" => Schedule::Manual,
            other => return Err(invalid(format!("unknown schedule type '{other}'"))),
        };

        let max_duration = match self.duration_minutes {
            0 => None,
            minutes => Some(
                minutes
                    .checked_mul(60)
                    .map(Duration::from_secs)
                    .ok_or_else(|| invalid(format!("duration of {minutes} minutes is too long")))?,
            ),
        };
        Ok((schedule, max_duration))
    }
}

/// Parses a definition document.
///
/// Fails only when the document itself is unreadable. Each entry is decoded
/// and validated on its own; bad entries end up in
/// [`DefinitionBatch::rejected`].
pub fn parse_definitions(json: &str, default_item_chance: f64) -> Result<DefinitionBatch> {
    let document: EncounterDocumentDto = serde_json::from_str(json)?;

    let mut malformed = Vec::new();
    let mut candidates = Vec::with_capacity(document.encounters.len());
    for (index, entry) in document.encounters.into_iter().enumerate() {
        let converted = serde_json::from_value::<EncounterDto>(entry)
            .map_err(|e| DefinitionError::Malformed {
                index,
                reason: e.to_string(),
            })
            .and_then(|dto| dto.into_domain(default_item_chance));
        match converted {
            Ok(definition) => candidates.push(definition),
            Err(err) => malformed.push(err),
        }
    }

    let mut batch = DefinitionBatch::from_candidates(candidates);
    malformed.append(&mut batch.rejected);
    batch.rejected = malformed;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
    {
      "encounters": [
        {
          "id": "night_horde",
          "displayName": "Night Horde",
          "targetScopes": ["overworld"],
          "schedule": {
            "scheduleType": "FIXED",
            "fixedTimes": ["20:00", "08:30"],
            "durationMinutes": 30
          },
          "waves": [
            { "mobType": "ZOMBIE", "count": 5, "level": 3 },
            { "mobType": "ZOMBIE", "count": 2, "level": 4, "delaySeconds": 20,
              "boss": { "name": "King", "healthMultiplier": 5.0 } }
          ],
          "rewards": { "xpPerWave": 50, "coinsPerWave": 10, "xpBonus": 200,
                       "coinsBonus": 40, "specialItems": ["RELIC"] }
        },
        {
          "id": "broken_schedule",
          "schedule": { "scheduleType": "HOURLY" },
          "waves": [{ "mobType": "SKELETON", "count": 1 }]
        },
        { "displayName": "no id at all", "waves": [] },
        {
          "id": "crypt",
          "kind": "dungeon",
          "enabled": false,
          "playerGate": { "min": 2, "max": 4 },
          "waves": [{ "actorKind": "SKELETON", "count": 3 }],
          "rewards": { "bonusItemChance": 0.5 }
        }
      ]
    }
    "#;

    #[test]
    fn test_bad_entries_do_not_block_good_ones() {
        let batch = parse_definitions(DOCUMENT, 0.25).unwrap();

        let ids: Vec<&str> = batch.definitions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["night_horde", "crypt"]);
        assert_eq!(batch.rejected.len(), 2);
        assert!(matches!(
            batch.rejected[0],
            DefinitionError::InvalidSchedule { ref id, .. } if id == "broken_schedule"
        ));
        assert!(matches!(
            batch.rejected[1],
            DefinitionError::Malformed { index: 2, .. }
        ));
    }

    #[test]
    fn test_fields_map_onto_domain() {
        let batch = parse_definitions(DOCUMENT, 0.25).unwrap();
        let horde = &batch.definitions[0];

        assert_eq!(horde.display_name, "Night Horde");
        assert_eq!(horde.max_duration, Some(Duration::from_secs(1800)));
        assert_eq!(horde.waves[1].delay_before_start, Duration::from_secs(20));
        assert_eq!(horde.waves[1].boss.as_ref().unwrap().name, "King");
        assert_eq!(horde.rewards.completion_currency_bonus, 40);
        assert_eq!(horde.rewards.bonus_item_chance, 0.25);
        assert!(horde.allows_scope("overworld"));
        assert!(!horde.allows_scope("nether"));

        let crypt = &batch.definitions[1];
        assert_eq!(crypt.kind, EncounterKind::Dungeon);
        assert!(!crypt.enabled);
        assert_eq!(crypt.rewards.bonus_item_chance, 0.5);
        assert_eq!(crypt.player_gate, Some(PlayerGate { min: 2, max: 4 }));
        assert_eq!(crypt.schedule, Schedule::Manual);
    }

    #[test]
    fn test_random_schedule_in_hours() {
        let json = r#"{"encounters":[{"id":"r","targetScopes":["arena"],"schedule":{"scheduleType":"random",
            "randomMinHours":4,"randomMaxHours":8},"waves":[{"mobType":"ZOMBIE","count":1}]}]}"#;
        let batch = parse_definitions(json, 0.25).unwrap();

        assert_eq!(
            batch.definitions[0].schedule,
            Schedule::Random {
                min: Duration::from_secs(4 * 3600),
                max: Duration::from_secs(8 * 3600),
            }
        );
    }

    #[test]
    fn test_out_of_range_numbers_reject_only_their_entry() {
        let json = r#"{"encounters":[
            {"id":"far","targetScopes":["arena"],
             "schedule":{"scheduleType":"RANDOM","randomMinHours":1,"randomMaxHours":1e300},
             "waves":[{"mobType":"ZOMBIE","count":1}]},
            {"id":"negative","targetScopes":["arena"],
             "schedule":{"scheduleType":"RANDOM","randomMinHours":-1,"randomMaxHours":2},
             "waves":[{"mobType":"ZOMBIE","count":1}]},
            {"id":"endless","schedule":{"scheduleType":"MANUAL","durationMinutes":18446744073709551615},
             "waves":[{"mobType":"ZOMBIE","count":1}]},
            {"id":"swarm","waves":[{"mobType":"ZOMBIE","count":4294967295,"boss":{"name":"K"}}]},
            {"id":"ok","waves":[{"mobType":"ZOMBIE","count":1}]}
        ]}"#;

        let batch = parse_definitions(json, 0.25).unwrap();

        let ids: Vec<&str> = batch.definitions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
        assert_eq!(batch.rejected.len(), 4);
        assert!(batch.rejected.iter().any(|e| matches!(
            e,
            DefinitionError::InvalidWave { id, .. } if id == "swarm"
        )));
    }

    #[test]
    fn test_unreadable_document_fails_whole_load() {
        assert!(parse_definitions("{ not json", 0.25).is_err());
        assert!(parse_definitions(r#"{"other": []}"#, 0.25).is_err());
    }

    #[test]
    fn test_demo_document_is_valid() {
        let batch =
            parse_definitions(include_str!("../../../../demos/encounters.json"), 0.25).unwrap();

        assert!(batch.rejected.is_empty(), "{:?}", batch.rejected);
        assert_eq!(batch.definitions.len(), 3);
        let king = batch
            .definitions
            .iter()
            .find(|d| d.id == "king_assault")
            .unwrap();
        assert!(king.waves[1].is_boss_wave());
        assert_eq!(king.max_duration, Some(Duration::from_secs(30 * 60)));
    }
}
