//! Configuration service implementation.
//!
//! Loads the root configuration from `~/.config/warden/config.toml` (or an
//! explicit path), writing a default file when none exists yet.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use warden_core::config::ConfigRoot;
use warden_core::error::{Result, WardenError};

use crate::paths::WardenPaths;
use crate::storage::AtomicTomlFile;

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<ConfigRoot>>>,
}

impl ConfigService {
    /// Service for the platform default config file.
    pub fn new() -> Result<Self> {
        let path = WardenPaths::config_file().map_err(|e| WardenError::config(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Gets the root configuration, loading from file if not cached.
    pub fn get_config(&self) -> Result<ConfigRoot> {
        {
            let cached = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = AtomicTomlFile::<ConfigRoot>::new(self.path.clone())
            .load_or_init(ConfigRoot::default())?;
        tracing::debug!(path = %self.path.display(), "Loaded configuration");

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
