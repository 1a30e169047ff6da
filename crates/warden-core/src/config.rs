//! Runtime configuration (`~/.config/warden/config.toml`).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root of the configuration file.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ConfigRoot {
    #[serde(default)]
    pub warden: WardenConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Engine tunables. Every field has a default, so an empty table is valid.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WardenConfig {
    /// How often a session checks whether its wave is cleared.
    pub poll_interval_ms: u64,
    /// Regular actors spawn up to this far from a random player on x and z.
    pub spawn_spread: f64,
    /// Bosses spawn this far above a random player.
    pub boss_spawn_height: f64,
    pub history_retry_attempts: u32,
    pub history_retry_backoff_ms: u64,
    pub history_write_timeout_ms: u64,
    /// Fail a session when its scope has no online players left.
    pub abandon_when_empty: bool,
    /// Used by the definition loader when an entry omits `bonusItemChance`.
    pub default_bonus_item_chance: f64,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            spawn_spread: 10.0,
            boss_spawn_height: 5.0,
            history_retry_attempts: 3,
            history_retry_backoff_ms: 250,
            history_write_timeout_ms: 5000,
            abandon_when_empty: true,
            default_bonus_item_chance: 0.25,
        }
    }
}

impl WardenConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn history_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.history_retry_backoff_ms)
    }

    pub fn history_write_timeout(&self) -> Duration {
        Duration::from_millis(self.history_write_timeout_ms.max(1))
    }
}

/// File locations. Unset entries fall back to the platform directories.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}
