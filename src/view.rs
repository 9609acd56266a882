//! Render-ready projections of the session. Nothing here mutates state.

use crate::model::{AnalysisResult, HistoryLog};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Line chart over the preview rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub x_field: String,
    pub y_field: String,
    /// X-axis label per preview row, in row order.
    pub x_labels: Vec<String>,
    /// `(row index, value)` for rows whose `y_field` is numeric.
    pub points: Vec<(f64, f64)>,
}

pub fn project_table(result: &AnalysisResult) -> TableView {
    let rows = result
        .preview
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|col| render_cell(row.get(col)))
                .collect()
        })
        .collect();
    TableView {
        headers: result.columns.clone(),
        rows,
    }
}

/// Chart of the first statistics key against the first column, or `None`
/// when there are no statistics (the chart is omitted, not drawn empty).
pub fn project_chart(result: &AnalysisResult) -> Option<ChartView> {
    let y_field = result.stats.keys().next()?.clone();
    let x_field = result.columns.first()?.clone();

    let mut x_labels = Vec::with_capacity(result.preview.len());
    let mut points = Vec::new();
    for (i, row) in result.preview.iter().enumerate() {
        x_labels.push(render_cell(row.get(&x_field)));
        if let Some(y) = row.get(&y_field).and_then(numeric) {
            points.push((i as f64, y));
        }
    }

    Some(ChartView {
        x_field,
        y_field,
        x_labels,
        points,
    })
}

/// Timestamps, most recent first.
pub fn project_history(log: &HistoryLog) -> Vec<String> {
    log.entries().iter().map(|e| e.timestamp.clone()).collect()
}

/// Display text for a cell; a missing or null cell renders empty.
pub fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Finite numbers only; `"inf"` and `"NaN"` parse as floats but cannot be plotted.
fn numeric(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::report;
    use crate::storage::record_at;
    use serde_json::json;

    fn temps() -> AnalysisResult {
        serde_json::from_value(json!({
            "columns": ["date", "temp"],
            "preview": [
                {"date": "2024-01-01", "temp": 3.5},
                {"date": "2024-01-02"},
                {"date": "2024-01-03", "temp": null},
                {"date": "2024-01-04", "temp": 5}
            ],
            "stats": {"temp": {"mean": 4.25}},
            "insights": []
        }))
        .unwrap()
    }

    #[test]
    fn table_follows_columns_and_blanks_missing_cells() {
        let table = project_table(&temps());
        assert_eq!(table.headers, ["date", "temp"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0], ["2024-01-01", "3.5"]);
        assert_eq!(table.rows[1], ["2024-01-02", ""]);
        assert_eq!(table.rows[2], ["2024-01-03", ""]);
        assert_eq!(table.rows[3], ["2024-01-04", "5"]);
    }

    #[test]
    fn table_ignores_keys_outside_columns() {
        let r: AnalysisResult = serde_json::from_value(json!({
            "columns": ["a"],
            "preview": [{"a": true, "extra": 1}]
        }))
        .unwrap();
        assert_eq!(project_table(&r).rows, vec![vec!["true".to_string()]]);
    }

    #[test]
    fn chart_uses_first_column_and_first_stats_key() {
        let chart = project_chart(&temps()).unwrap();
        assert_eq!(chart.x_field, "date");
        assert_eq!(chart.y_field, "temp");
        assert_eq!(chart.x_labels.len(), 4);
        assert_eq!(chart.points, [(0.0, 3.5), (3.0, 5.0)]);
    }

    #[test]
    fn chart_is_absent_without_stats() {
        let mut r = temps();
        r.stats.clear();
        assert_eq!(project_chart(&r), None);
    }

    #[test]
    fn chart_follows_successive_uploads() {
        let a = report(&["date", "temp"], &["temp"]);
        let chart = project_chart(&a).unwrap();
        assert_eq!((chart.x_field.as_str(), chart.y_field.as_str()), ("date", "temp"));

        let b = report(&["date", "temp"], &[]);
        assert!(project_chart(&b).is_none());
    }

    #[test]
    fn chart_series_is_first_key_in_payload_order() {
        let r: AnalysisResult = serde_json::from_str(
            r#"{"columns":["x","zeta","alpha"],"preview":[{"x":1,"zeta":"2.5","alpha":9}],"stats":{"zeta":{},"alpha":{}}}"#,
        )
        .unwrap();
        let chart = project_chart(&r).unwrap();
        assert_eq!(chart.y_field, "zeta");
        assert_eq!(chart.points, [(0.0, 2.5)]);
    }

    #[test]
    fn chart_skips_non_finite_strings() {
        let r: AnalysisResult = serde_json::from_value(json!({
            "columns": ["x", "v"],
            "preview": [{"x": 1, "v": "inf"}, {"x": 2, "v": "NaN"}, {"x": 3, "v": 2}, {"x": 4, "v": "-infinity"}],
            "stats": {"v": {}}
        }))
        .unwrap();
        let chart = project_chart(&r).unwrap();
        assert_eq!(chart.x_labels.len(), 4);
        assert_eq!(chart.points, [(2.0, 2.0)]);
    }

    #[test]
    fn history_lists_timestamps_newest_first() {
        let log = ["t1", "t2", "t3"].iter().fold(HistoryLog::new(), |log, t| {
            record_at(&log, &AnalysisResult::default(), t.to_string())
        });
        assert_eq!(project_history(&log), ["t3", "t2", "t1"]);
    }
}
