//! Text summary builder for CLI output.

use crate::model::HistoryLog;
use crate::session::SessionState;
use crate::view::{self, TableView};

/// Widest a preview cell may get before it is cut.
const MAX_CELL_WIDTH: usize = 24;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(state: &SessionState, history: &HistoryLog) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(status) = state.system_status.as_ref() {
        lines.push(format!("Backend: {}", status.backend));
        lines.push(format!("LLM: {}", status.llm));
    }

    if let Some(result) = state.current_result.as_ref() {
        lines.push("Insights:".into());
        for insight in &result.insights {
            lines.push(format!("  - {insight}"));
        }
        if let Some(summary) = result.llm_summary.as_deref() {
            lines.push(format!("AI summary: {}", summary.trim()));
        }

        let table = view::project_table(result);
        lines.push(format!("Preview ({} rows):", table.rows.len()));
        lines.extend(format_table(&table).into_iter().map(|l| format!("  {l}")));

        match view::project_chart(result) {
            Some(chart) => lines.push(format!(
                "Chart: {} by {} ({} points)",
                chart.y_field,
                chart.x_field,
                chart.points.len()
            )),
            None => lines.push("Chart: none (no statistics)".into()),
        }
    }

    if let Some(answer) = state.current_answer.as_deref() {
        lines.push(format!("Answer: {}", answer.trim()));
    }

    let stamps = view::project_history(history);
    if !stamps.is_empty() {
        lines.push(format!("Last {} reports:", stamps.len()));
        for s in stamps {
            lines.push(format!("  {s}"));
        }
    }

    TextSummary { lines }
}

fn clip(cell: &str) -> String {
    if cell.chars().count() > MAX_CELL_WIDTH {
        let mut s: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
        s.push('…');
        s
    } else {
        cell.to_string()
    }
}

/// Left-aligned columns separated by two spaces.
pub(crate) fn format_table(table: &TableView) -> Vec<String> {
    let headers: Vec<String> = table.headers.iter().map(|h| clip(h)).collect();
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.iter().map(|c| clip(c)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(render(headers.as_slice()));
    for row in &rows {
        out.push(render(row.as_slice()));
    }
    out
}
