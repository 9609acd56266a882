//! Report export.

use crate::model::AnalysisResult;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub const REPORT_FILE_NAME: &str = "report.txt";

/// Where exported reports end up.
pub trait ReportSink {
    /// Store `contents` under `file_name` and return the final location.
    fn deliver(&self, file_name: &str, contents: &str) -> Result<PathBuf>;
}

/// Writes reports into a directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn current_dir() -> Result<Self> {
        let dir = std::env::current_dir().context("get current directory")?;
        Ok(Self::new(dir))
    }
}

impl ReportSink for DirectorySink {
    fn deliver(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Export `result` as pretty-printed JSON named `report.txt`.
/// Does nothing and returns `None` when there is no result.
pub fn export_current(
    result: Option<&AnalysisResult>,
    sink: &dyn ReportSink,
) -> Result<Option<PathBuf>> {
    let Some(result) = result else {
        return Ok(None);
    };
    let contents = serde_json::to_string_pretty(result).context("serialize report")?;
    let path = sink.deliver(REPORT_FILE_NAME, &contents)?;
    tracing::info!(path = %path.display(), "report exported");
    Ok(Some(path))
}
