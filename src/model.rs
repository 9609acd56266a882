use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A preview row: column name to scalar cell value.
pub type Row = Map<String, Value>;

/// Per-column statistics. The shape of each value is owned by the analyzer;
/// the client only looks at the key set and its order.
pub type Stats = Map<String, Value>;

/// Analysis payload returned by `POST /analyze`.
///
/// Every field tolerates being missing or `null` on the wire and falls back to
/// an empty value, so a loosely shaped response never reaches the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preview: Vec<Row>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stats: Stats,
    #[serde(default, deserialize_with = "null_as_default")]
    pub insights: Vec<String>,
    #[serde(default)]
    pub llm_summary: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub backend: String,
    pub llm: String,
}

impl SystemStatus {
    /// Sentinel shown when the status endpoint cannot be reached or decoded.
    pub fn unreachable() -> Self {
        Self {
            backend: "unreachable".into(),
            llm: "unknown".into(),
        }
    }
}

/// Body of `POST /ask`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub context: Stats,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AskResponse {
    pub answer: String,
}

/// Application error body the analyzer sends instead of a report.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteError {
    pub error: String,
}

/// One persisted report. Stored on the wire as `{date, report}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Display string captured when the entry was recorded.
    #[serde(rename = "date")]
    pub timestamp: String,
    #[serde(rename = "report")]
    pub result: AnalysisResult,
}

/// Most-recent-first log of past reports, never longer than [`HistoryLog::CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog(Vec<HistoryEntry>);

impl HistoryLog {
    pub const CAPACITY: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&HistoryEntry> {
        self.0.get(idx)
    }

    /// Prepend `entry` and drop everything past capacity.
    pub fn with_newest(&self, entry: HistoryEntry) -> Self {
        let mut entries = Vec::with_capacity(Self::CAPACITY);
        entries.push(entry);
        entries.extend(self.0.iter().take(Self::CAPACITY - 1).cloned());
        Self(entries)
    }

    pub(crate) fn truncated(mut self) -> Self {
        self.0.truncate(Self::CAPACITY);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_missing_fields_become_empty() {
        let r: AnalysisResult = serde_json::from_value(json!({
            "columns": ["a"],
            "stats": null,
            "insights": null,
        }))
        .unwrap();
        assert_eq!(r.columns, vec!["a".to_string()]);
        assert!(r.preview.is_empty());
        assert!(r.stats.is_empty());
        assert!(r.insights.is_empty());
        assert_eq!(r.llm_summary, None);
    }

    #[test]
    fn stats_keep_wire_order() {
        let r: AnalysisResult = serde_json::from_str(
            r#"{"columns":[],"preview":[],"stats":{"zeta":{},"alpha":{}},"insights":[]}"#,
        )
        .unwrap();
        let keys: Vec<&String> = r.stats.keys().collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn history_entry_uses_date_report_wire_names() {
        let entry = HistoryEntry {
            timestamp: "2026-01-01 10:00:00".into(),
            result: AnalysisResult::default(),
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["date"], "2026-01-01 10:00:00");
        assert!(v["report"].is_object());
    }
}
