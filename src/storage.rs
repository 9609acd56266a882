//! Local persistence for the report history.
//!
//! The history is a convenience feature: reads and writes never fail the
//! caller, they degrade to an empty or stale log and log a warning.

use crate::model::{AnalysisResult, HistoryEntry, HistoryLog};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Slot holding the serialized history log.
const HISTORY_KEY: &str = "reports";

/// Named-blob persistence capability.
pub trait BlobStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn write(&self, key: &str, data: &[u8]) -> Result<()>;
}

/// Stores each blob as `<dir>/<key>.json`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.path_for(key);
        // Write next to the target and rename so readers never see a partial file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path).with_context(|| format!("rename to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl BlobStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(blobs.get(key).cloned())
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

/// Default directory for persisted state.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("csv-insights")
}

#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn BlobStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// File-backed history under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(Arc::new(FileStore::new(dir)))
    }

    pub fn load(&self) -> HistoryLog {
        let data = match self.store.read(HISTORY_KEY) {
            Ok(Some(data)) => data,
            Ok(None) => return HistoryLog::new(),
            Err(e) => {
                tracing::warn!("history read failed: {e:#}");
                return HistoryLog::new();
            }
        };
        match serde_json::from_slice::<HistoryLog>(&data) {
            Ok(log) => log.truncated(),
            Err(e) => {
                tracing::warn!("discarding unreadable history: {e}");
                HistoryLog::new()
            }
        }
    }

    /// Overwrite the persisted snapshot. Failures are logged and dropped.
    pub fn save(&self, log: &HistoryLog) {
        let res = serde_json::to_vec(log)
            .context("serialize history")
            .and_then(|data| self.store.write(HISTORY_KEY, &data));
        if let Err(e) = res {
            tracing::warn!("history save failed: {e:#}");
        }
    }
}

/// Prepend a snapshot of `result` stamped with the current local time.
pub fn record(log: &HistoryLog, result: &AnalysisResult) -> HistoryLog {
    record_at(log, result, now_display())
}

pub fn record_at(log: &HistoryLog, result: &AnalysisResult, timestamp: String) -> HistoryLog {
    log.with_newest(HistoryEntry {
        timestamp,
        result: result.clone(),
    })
}

/// Local time formatted for display, falling back to UTC when the local
/// offset cannot be determined.
pub fn now_display() -> String {
    let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&fmt).unwrap_or_else(|_| "now".into())
}
