//! In-memory history store for tests and dry runs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_core::error::Result;
use warden_core::session::{HistoryRecord, HistoryStore, SessionStarted};

#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryStore {
    records: Arc<RwLock<Vec<HistoryRecord>>>,
    started: Arc<RwLock<Vec<SessionStarted>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record in append order.
    pub async fn all_records(&self) -> Vec<HistoryRecord> {
        self.records.read().await.clone()
    }

    pub async fn started_sessions(&self) -> Vec<SessionStarted> {
        self.started.read().await.clone()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record_start(&self, started: &SessionStarted) -> Result<()> {
        self.started.write().await.push(started.clone());
        Ok(())
    }

    async fn append_record(&self, record: &HistoryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if !records.iter().any(|r| r.session_id == record.session_id) {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    async fn query_by_definition(
        &self,
        definition_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|record| record.definition_id == definition_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
