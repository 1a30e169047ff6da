//! Reward payout for cleared waves and completed sessions.

use std::sync::Arc;

use warden_core::definition::RewardSpec;
use warden_core::reward::RewardSink;
use warden_core::world::PlayerId;

/// What a completion payout handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionPayout {
    pub paid: Vec<PlayerId>,
    pub items: Vec<(PlayerId, String)>,
}

/// Turns a [`RewardSpec`] into [`RewardSink`] calls.
///
/// Every payee gets the same flat amount; there is no contribution-weighted
/// split. A failed grant for one player is logged and does not stop the
/// others from being paid.
#[derive(Clone)]
pub struct RewardSettler {
    sink: Arc<dyn RewardSink>,
}

impl RewardSettler {
    pub fn new(sink: Arc<dyn RewardSink>) -> Self {
        Self { sink }
    }

    /// Pays `xp_per_wave` and `currency_per_wave` to each payee. Returns the
    /// players actually paid.
    pub fn pay_wave_rewards(&self, payees: &[PlayerId], rewards: &RewardSpec) -> Vec<PlayerId> {
        self.grant_all(payees, rewards.xp_per_wave, rewards.currency_per_wave)
    }

    /// Pays the completion bonus to every session participant and rolls one
    /// independent bonus item draw for each of them.
    pub fn pay_completion_bonus(
        &self,
        participants: &[PlayerId],
        rewards: &RewardSpec,
    ) -> CompletionPayout {
        let paid = self.grant_all(
            participants,
            rewards.completion_xp_bonus,
            rewards.completion_currency_bonus,
        );

        let mut items = Vec::new();
        if !rewards.bonus_item_pool.is_empty() && rewards.bonus_item_chance > 0.0 {
            for player in participants {
                match self.sink.grant_item_chance(
                    player,
                    &rewards.bonus_item_pool,
                    rewards.bonus_item_chance,
                ) {
                    Ok(Some(item)) => {
                        tracing::info!(player = %player, item = %item, "Bonus item granted");
                        items.push((player.clone(), item));
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(player = %player, error = %e, "Bonus item draw failed"),
                }
            }
        }

        CompletionPayout { paid, items }
    }

    fn grant_all(&self, players: &[PlayerId], xp: u64, currency: u64) -> Vec<PlayerId> {
        if xp == 0 && currency == 0 {
            return Vec::new();
        }
        players
            .iter()
            .filter(|player| match self.sink.grant(player, xp, currency) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(player = %player, xp, currency, error = %e, "Reward grant failed");
                    false
                }
            })
            .cloned()
            .collect()
    }
}
