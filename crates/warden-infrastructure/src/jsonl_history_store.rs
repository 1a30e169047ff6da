//! Append-only JSON-lines history journal.
//!
//! Each line is one entry: a `started` marker written when a session begins
//! and a `finished` record written when it ends. Writers hold an exclusive
//! lock on `<file>.lock` for the duration of an append, so several processes
//! can share one journal.
//!
//! A session has at most one `finished` line: appending a record for a
//! session that is already finished is a no-op, so a retried write whose
//! earlier attempt did land leaves no duplicate.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use warden_core::error::{Result, WardenError};
use warden_core::session::{HistoryRecord, HistoryStore, SessionStarted};

use crate::storage::FileLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
enum JournalEntry {
    Started(SessionStarted),
    Finished(HistoryRecord),
}

#[derive(Debug, Clone)]
pub struct JsonlHistoryStore {
    path: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: JournalEntry) -> Result<()> {
        let path = self.path.clone();
        run_blocking(move || {
            let _lock = FileLock::acquire(&path)?;
            if let JournalEntry::Finished(record) = &entry {
                if is_finished(&path, &record.session_id)? {
                    tracing::debug!(
                        session_id = %record.session_id,
                        "History record already journaled"
                    );
                    return Ok(());
                }
            }
            append_entry(&path, &entry)
        })
        .await
    }

    async fn finished_newest_first(
        &self,
        filter: impl Fn(&HistoryRecord) -> bool + Send + 'static,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>> {
        let path = self.path.clone();
        run_blocking(move || {
            let entries = read_entries(&path)?;
            Ok(entries
                .into_iter()
                .rev()
                .filter_map(|entry| match entry {
                    JournalEntry::Finished(record) if filter(&record) => Some(record),
                    _ => None,
                })
                .take(limit)
                .collect())
        })
        .await
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn record_start(&self, started: &SessionStarted) -> Result<()> {
        self.append(JournalEntry::Started(started.clone())).await
    }

    async fn append_record(&self, record: &HistoryRecord) -> Result<()> {
        self.append(JournalEntry::Finished(record.clone())).await
    }

    /// A `started` marker without a `finished` record means the process died
    /// mid-session. Each one gets a `Failed` record with reason `interrupted`.
    async fn recover_interrupted(&self) -> Result<Vec<HistoryRecord>> {
        let path = self.path.clone();
        run_blocking(move || {
            let _lock = FileLock::acquire(&path)?;
            let entries = read_entries(&path)?;

            let finished: HashSet<String> = entries
                .iter()
                .filter_map(|entry| match entry {
                    JournalEntry::Finished(record) => Some(record.session_id.clone()),
                    JournalEntry::Started(_) => None,
                })
                .collect();

            let now = Utc::now();
            let recovered: Vec<HistoryRecord> = entries
                .into_iter()
                .filter_map(|entry| match entry {
                    JournalEntry::Started(started) if !finished.contains(&started.session_id) => {
                        Some(started.into_interrupted(now))
                    }
                    _ => None,
                })
                .collect();

            for record in &recovered {
                tracing::warn!(
                    session_id = %record.session_id,
                    definition_id = %record.definition_id,
                    scope = %record.scope,
                    "Closing session interrupted by a previous shutdown"
                );
                append_entry(&path, &JournalEntry::Finished(record.clone()))?;
            }
            Ok(recovered)
        })
        .await
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.finished_newest_first(|_| true, limit).await
    }

    async fn query_by_definition(
        &self,
        definition_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>> {
        let definition_id = definition_id.to_string();
        self.finished_newest_first(move |record| record.definition_id == definition_id, limit)
            .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WardenError::internal(format!("history task failed: {e}")))?
}

fn append_entry(path: &Path, entry: &JournalEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    // A crash mid-append leaves a torn last line; terminate it so the new
    // entry starts on its own line.
    if ends_without_newline(&mut file)? {
        line.insert(0, '\n');
    }
    file.write_all(line.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

fn ends_without_newline(file: &mut fs::File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn is_finished(path: &Path, session_id: &str) -> Result<bool> {
    Ok(read_entries(path)?.iter().any(|entry| {
        matches!(entry, JournalEntry::Finished(record) if record.session_id == session_id)
    }))
}

/// Reads every parseable entry. A torn or corrupt line is skipped.
fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = number + 1,
                error = %e,
                "Skipping unreadable history line"
            ),
        }
    }
    Ok(entries)
}
