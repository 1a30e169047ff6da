//! Reward sink interface (economy and XP are owned elsewhere).

use thiserror::Error;

use crate::world::PlayerId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewardError {
    #[error("player {0} is offline")]
    PlayerOffline(PlayerId),

    #[error("reward rejected for {player}: {reason}")]
    Rejected { player: PlayerId, reason: String },
}

/// Where XP, currency and items end up.
pub trait RewardSink: Send + Sync {
    fn grant(&self, player: &PlayerId, xp: u64, currency: u64) -> Result<(), RewardError>;

    /// Gives `player` one item from `pool` with probability `chance`.
    ///
    /// The sink performs the draw, so every call is an independent roll.
    /// Returns the item actually granted, if any.
    fn grant_item_chance(
        &self,
        player: &PlayerId,
        pool: &[String],
        chance: f64,
    ) -> Result<Option<String>, RewardError>;
}
