//! Atomic TOML file writes.
//!
//! Updates go to a temporary file in the same directory, are synced, then
//! renamed over the target, so readers see either the old or the new file.

use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use warden_core::WardenError;

use super::file_lock::FileLock;

#[derive(Debug, Error)]
pub enum AtomicTomlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid path {0}")]
    InvalidPath(PathBuf),
}

impl From<AtomicTomlError> for WardenError {
    fn from(err: AtomicTomlError) -> Self {
        match err {
            AtomicTomlError::Io(e) => e.into(),
            AtomicTomlError::Parse(e) => e.into(),
            AtomicTomlError::Serialize(e) => e.into(),
            AtomicTomlError::InvalidPath(path) => {
                WardenError::config(format!("invalid path {}", path.display()))
            }
        }
    }
}

/// A TOML file handle with locked, all-or-nothing updates.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file. Missing and blank files both yield `None`.
    pub fn load(&self) -> Result<Option<T>, AtomicTomlError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(toml::from_str(&content)?))
    }

    /// Writes `data` through a synced temporary file and a rename.
    pub fn save(&self, data: &T) -> Result<(), AtomicTomlError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Loads the file, or writes and returns `default_value` when it is absent.
    ///
    /// Runs under the file lock, so two processes starting at once agree on a
    /// single default file.
    pub fn load_or_init(&self, default_value: T) -> Result<T, AtomicTomlError> {
        let _lock = FileLock::acquire(&self.path)?;
        match self.load()? {
            Some(data) => Ok(data),
            None => {
                self.save(&default_value)?;
                Ok(default_value)
            }
        }
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicTomlError> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| AtomicTomlError::InvalidPath(self.path.clone()))?;
        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(match self.path.parent() {
            Some(parent) => parent.join(tmp_name),
            None => PathBuf::from(tmp_name),
        })
    }
}
