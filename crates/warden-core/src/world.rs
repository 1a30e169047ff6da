//! World actuator interface.
//!
//! The orchestrator never touches game entities directly. Everything it needs
//! from the world (spawning, liveness checks, despawning, player lookup) goes
//! through [`WorldActuator`]. Calls are expected to be fast in-memory lookups,
//! which is why the trait is synchronous.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque reference to a spawned actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorHandle(pub u64);

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Opaque player identity (a UUID string in most worlds).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A point in a scope.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

/// An online player and where they stand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPresence {
    pub player: PlayerId,
    pub location: Location,
}

/// What to spawn and where.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub scope: String,
    pub actor_kind: String,
    pub location: Location,
    pub level: u32,
    /// Name displayed above the actor, e.g. `ZOMBIE Lv.4` or the boss name.
    pub display_name: String,
    /// Multiplier on the kind's base max health; `1.0` for regular actors.
    pub health_multiplier: f64,
    pub boss: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("scope '{0}' is not loaded")]
    ScopeUnavailable(String),

    #[error("spawn of '{kind}' failed: {reason}")]
    SpawnFailed { kind: String, reason: String },

    #[error("{0} is unknown to the world")]
    UnknownActor(ActorHandle),

    #[error("world error: {0}")]
    Other(String),
}

/// Narrow view of the game world used by the orchestrator.
pub trait WorldActuator: Send + Sync {
    fn spawn_actor(&self, request: &SpawnRequest) -> Result<ActorHandle, ActuatorError>;

    /// `false` for dead, despawned or unknown actors.
    fn is_alive(&self, handle: ActorHandle) -> bool;

    fn remove_actor(&self, handle: ActorHandle) -> Result<(), ActuatorError>;

    /// Fails with [`ActuatorError::ScopeUnavailable`] when the scope cannot
    /// be resolved (world not loaded).
    fn online_players_in(&self, scope: &str) -> Result<Vec<PlayerPresence>, ActuatorError>;
}
