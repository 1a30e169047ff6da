//! Unified path management for warden files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/warden/            # Config directory
//! ├── config.toml              # Engine configuration
//! └── encounters.json          # Encounter definitions
//!
//! ~/.local/share/warden/       # Data directory
//! ├── history.jsonl            # Session history journal
//! └── logs/
//!     └── warden.log.YYYY-MM-DD
//! ```
//!
//! Every location can be overridden in the `[paths]` table of `config.toml`.

use std::path::PathBuf;

use thiserror::Error;
use warden_core::config::PathsConfig;

const APP_DIR: &str = "warden";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot find home directory")]
    HomeDirNotFound,
}

pub struct WardenPaths;

impl WardenPaths {
    /// `~/.config/warden` (platform equivalent elsewhere).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// `~/.local/share/warden` (platform equivalent elsewhere).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn definitions_file(paths: &PathsConfig) -> Result<PathBuf, PathError> {
        match &paths.definitions {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("encounters.json")),
        }
    }

    pub fn history_file(paths: &PathsConfig) -> Result<PathBuf, PathError> {
        match &paths.history {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("history.jsonl")),
        }
    }

    pub fn log_dir(paths: &PathsConfig) -> Result<PathBuf, PathError> {
        match &paths.log_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("logs")),
        }
    }
}
