//! Error types for the Warden orchestrator.

use thiserror::Error;

/// A shared error type for storage, configuration and internal failures.
///
/// Typed start failures live in [`StartError`] and per-entry definition
/// problems in [`crate::definition::DefinitionError`]; this type covers the
/// plumbing around them.
#[derive(Error, Debug, Clone)]
pub enum WardenError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Data access error (history store / storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation did not finish within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

impl From<std::io::Error> for WardenError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for WardenError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for WardenError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for WardenError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, WardenError>`.
pub type Result<T> = std::result::Result<T, WardenError>;

/// Why a session could not be started.
///
/// Returned to the command layer as a value; the caller decides how to word it
/// for players.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("an encounter is already active in scope '{scope}' (session {session_id})")]
    AlreadyActive { scope: String, session_id: String },

    #[error("unknown encounter definition '{0}'")]
    UnknownDefinition(String),

    #[error("encounter '{0}' is disabled")]
    DefinitionDisabled(String),

    #[error("scope '{scope}' is unavailable: {reason}")]
    ScopeUnavailable { scope: String, reason: String },

    #[error("encounter '{definition_id}' cannot run in scope '{scope}'")]
    ScopeNotTargeted { definition_id: String, scope: String },

    #[error("{online} player(s) online in '{scope}', encounter needs {min}..={max}")]
    PlayerCount {
        scope: String,
        online: usize,
        min: usize,
        max: usize,
    },

    #[error("orchestrator is shutting down")]
    ShuttingDown,
}
