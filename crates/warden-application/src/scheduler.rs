//! Automatic starts for scheduled definitions.
//!
//! The scheduler runs one timer task per enabled, non-manual definition. When
//! the definition table is reloaded, every timer of the previous generation
//! is cancelled and the new table is armed from the current time.

use std::sync::Arc;

use chrono::Local;
use rand::seq::IteratorRandom;
use tokio_util::sync::CancellationToken;
use warden_core::definition::EncounterDefinition;
use warden_core::error::StartError;
use warden_core::schedule::EncounterClock;
use warden_core::session::SessionId;

use crate::orchestrator::EncounterOrchestrator;

/// Why a scheduled fire did not start a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireSkipped {
    NoTargetScope,
    Refused(StartError),
}

#[derive(Clone)]
pub struct EncounterScheduler {
    orchestrator: EncounterOrchestrator,
    clock: EncounterClock,
}

impl EncounterScheduler {
    pub fn new(orchestrator: EncounterOrchestrator) -> Self {
        Self {
            orchestrator,
            clock: EncounterClock::new(),
        }
    }

    /// Starts the supervisor on the orchestrator's task tracker. It stops when
    /// the orchestrator shuts down.
    pub fn spawn(self) {
        let tasks = self.orchestrator.tasks().clone();
        tasks.spawn(async move { self.supervise().await });
    }

    async fn supervise(self) {
        let shutdown = self.orchestrator.shutdown_token();
        let mut generations = self.orchestrator.subscribe_definitions();

        loop {
            let generation = shutdown.child_token();
            let armed = self.arm_all(&generation).await;
            tracing::info!(armed, "Scheduler armed");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = generations.changed() => {
                    generation.cancel();
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Scheduler stopped");
    }

    async fn arm_all(&self, generation: &CancellationToken) -> usize {
        let definitions = self.orchestrator.definitions().await;
        let mut armed = 0;
        for definition in definitions.into_iter().filter(|d| d.is_auto_scheduled()) {
            let scheduler = self.clone();
            let token = generation.clone();
            self.orchestrator
                .tasks()
                .spawn(async move { scheduler.run_timer(definition, token).await });
            armed += 1;
        }
        armed
    }

    async fn run_timer(self, definition: Arc<EncounterDefinition>, token: CancellationToken) {
        loop {
            let now = Local::now();
            let Some(fire_at) = self.clock.next_fire_time(&definition, &now) else {
                tracing::warn!(
                    definition_id = %definition.id,
                    "Schedule yields no next start; timer stopped"
                );
                break;
            };
            let wait = EncounterClock::delay_until(&fire_at, &now);
            tracing::debug!(
                definition_id = %definition.id,
                fire_at = %fire_at,
                "Next automatic start"
            );

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            // Outcome is logged inside; the timer re-arms from the current
            // time either way.
            let _ = self.fire(&definition).await;
        }
    }

    /// Attempts one scheduled start of `definition` in a random target scope.
    pub async fn fire(
        &self,
        definition: &EncounterDefinition,
    ) -> Result<SessionId, FireSkipped> {
        let scope = {
            let mut rng = rand::thread_rng();
            definition.target_scopes.iter().choose(&mut rng).cloned()
        };
        let Some(scope) = scope else {
            tracing::warn!(
                definition_id = %definition.id,
                "Scheduled start skipped: definition targets no scope"
            );
            return Err(FireSkipped::NoTargetScope);
        };

        match self.orchestrator.start_session(&definition.id, &scope).await {
            Ok(session_id) => {
                tracing::info!(
                    definition_id = %definition.id,
                    scope = %scope,
                    session_id = %session_id,
                    "Scheduled start fired"
                );
                Ok(session_id)
            }
            Err(e) => {
                tracing::info!(
                    definition_id = %definition.id,
                    scope = %scope,
                    reason = %e,
                    "Scheduled start skipped"
                );
                Err(FireSkipped::Refused(e))
            }
        }
    }
}
