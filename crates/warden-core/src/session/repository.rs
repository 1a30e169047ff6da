//! History store trait.

use async_trait::async_trait;

use super::history::{HistoryRecord, SessionStarted};
use crate::error::Result;

/// An abstract store for finished-session records.
///
/// This trait defines the contract for history persistence, decoupling the
/// orchestrator from the storage mechanism (JSON lines file, database, memory).
///
/// # Write semantics
///
/// - `append_record` is called exactly once per finished session. Callers may
///   retry it after a failure, so implementations should not half-write.
/// - Records are append-only; there is no update or delete.
///
/// # Query semantics
///
/// Both queries return the newest records first, truncated to `limit`.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Notes that a session started.
    ///
    /// Stores that can detect sessions interrupted by a crash use this marker;
    /// the default implementation ignores it.
    async fn record_start(&self, _started: &SessionStarted) -> Result<()> {
        Ok(())
    }

    /// Appends the summary of a finished session.
    async fn append_record(&self, record: &HistoryRecord) -> Result<()>;

    /// Closes sessions that started but never finished (the process died).
    ///
    /// Returns the `Failed` records written for them. Stores without start
    /// markers have nothing to recover.
    async fn recover_interrupted(&self) -> Result<Vec<HistoryRecord>> {
        Ok(Vec::new())
    }

    /// Newest records across all definitions.
    async fn query_recent(&self, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Newest records of one definition.
    async fn query_by_definition(
        &self,
        definition_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>>;
}
