//! Debate persistence: best-effort durable log of debate records.
//!
//! The orchestrator writes a record when a debate starts and overwrites it on
//! every later transition. Failures are reported to the caller, which logs
//! them and carries on with in-memory state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::state::DebateRecord;

/// Error during durable-log writes.
#[derive(Debug, thiserror::Error)]
pub enum DurableLogError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for durable-log operations.
pub type DurableLogResult<T> = Result<T, DurableLogError>;

/// Shared durable-log collaborator.
pub type SharedDurableLog = Arc<dyn DurableLog>;

/// External record of in-progress and completed debates.
#[async_trait]
pub trait DurableLog: Send + Sync {
    /// Record a newly started debate.
    async fn write_debate_log(&self, record: &DebateRecord) -> DurableLogResult<()>;

    /// Overwrite the stored record for `id`.
    async fn update_debate_log(&self, id: &str, record: &DebateRecord) -> DurableLogResult<()>;
}

/// One pretty-printed JSON file per debate under a directory.
pub struct JsonFileDebateLog {
    dir: PathBuf,
}

impl JsonFileDebateLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding debate `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Load a stored record. `Ok(None)` when no file exists.
    pub async fn load(&self, id: &str) -> DurableLogResult<Option<DebateRecord>> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DurableLogError::Io { path, source }),
        }
    }

    async fn store(&self, id: &str, record: &DebateRecord) -> DurableLogResult<()> {
        let json = serde_json::to_string_pretty(record)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| DurableLogError::Io {
                path: self.dir.clone(),
                source,
            })?;

        // Write then rename so readers never observe a half-written file
        let path = self.path_for(id);
        let tmp = self.dir.join(format!(".{}.json.tmp", id));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| DurableLogError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| DurableLogError::Io { path, source })
    }
}

#[async_trait]
impl DurableLog for JsonFileDebateLog {
    async fn write_debate_log(&self, record: &DebateRecord) -> DurableLogResult<()> {
        self.store(&record.id, record).await
    }

    async fn update_debate_log(&self, id: &str, record: &DebateRecord) -> DurableLogResult<()> {
        self.store(id, record).await
    }
}

/// Keeps every write in memory, in order. Useful for tests and dry runs.
#[derive(Default)]
pub struct InMemoryDebateLog {
    writes: Mutex<HashMap<String, Vec<DebateRecord>>>,
}

impl InMemoryDebateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written for `id`, oldest first.
    pub fn writes_for(&self, id: &str) -> Vec<DebateRecord> {
        self.lock().get(id).cloned().unwrap_or_default()
    }

    /// Most recent record written for `id`.
    pub fn latest(&self, id: &str) -> Option<DebateRecord> {
        self.lock().get(id).and_then(|w| w.last().cloned())
    }

    pub fn debate_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<DebateRecord>>> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DurableLog for InMemoryDebateLog {
    async fn write_debate_log(&self, record: &DebateRecord) -> DurableLogResult<()> {
        self.lock()
            .entry(record.id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn update_debate_log(&self, id: &str, record: &DebateRecord) -> DurableLogResult<()> {
        self.lock()
            .entry(id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}

/// Discards every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDebateLog;

#[async_trait]
impl DurableLog for NoopDebateLog {
    async fn write_debate_log(&self, _record: &DebateRecord) -> DurableLogResult<()> {
        Ok(())
    }

    async fn update_debate_log(&self, _id: &str, _record: &DebateRecord) -> DurableLogResult<()> {
        Ok(())
    }
}
