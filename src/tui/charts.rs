use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Row, Table},
    Frame,
};

use crate::view::{ChartView, TableView};

/// Render the preview table, starting at row `scroll`.
pub fn draw_preview_table(f: &mut Frame, area: Rect, table: &TableView, scroll: usize) {
    let title = format!("Preview ({} rows)", table.rows.len());
    if table.headers.is_empty() {
        let p = Paragraph::new("No columns in this report.")
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(p, area);
        return;
    }

    let header = Row::new(table.headers.iter().cloned())
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = table
        .rows
        .iter()
        .skip(scroll)
        .map(|r| Row::new(r.iter().cloned()))
        .collect();
    let widths = vec![Constraint::Fill(1); table.headers.len()];

    let widget = Table::new(rows, widths)
        .header(header)
        .column_spacing(2)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn bounds(points: &[(f64, f64)]) -> (f64, f64) {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in points {
        lo = lo.min(y);
        hi = hi.max(y);
    }
    if lo == hi {
        // flat series still needs a visible range
        (lo - 1.0, hi + 1.0)
    } else {
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    }
}

/// Line chart of `chart.y_field` over the preview rows.
pub fn draw_series_chart(f: &mut Frame, area: Rect, chart: &ChartView) {
    let title = format!("Chart: {} by {}", chart.y_field, chart.x_field);
    if chart.points.is_empty() {
        let p = Paragraph::new(format!("No numeric values for {}.", chart.y_field))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(p, area);
        return;
    }

    let x_max = (chart.x_labels.len().saturating_sub(1) as f64).max(1.0);
    let (y_min, y_max) = bounds(&chart.points);

    let label_at = |i: usize| {
        Span::styled(
            chart.x_labels.get(i).cloned().unwrap_or_default(),
            Style::default().fg(Color::Gray),
        )
    };
    let last = chart.x_labels.len().saturating_sub(1);
    let x_labels = if last >= 2 {
        vec![label_at(0), label_at(last / 2), label_at(last)]
    } else {
        vec![label_at(0), label_at(last)]
    };
    let y_labels = vec![
        Span::raw(format!("{:.2}", y_min)),
        Span::raw(format!("{:.2}", (y_min + y_max) / 2.0)),
        Span::raw(format!("{:.2}", y_max)),
    ];

    let ds = Dataset::default()
        .name(chart.y_field.clone())
        .graph_type(GraphType::Line)
        .marker(symbols::Marker::Braille)
        .style(Style::default().fg(Color::Cyan))
        .data(&chart.points);

    let widget = Chart::new(vec![ds])
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .title(chart.x_field.clone())
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(Axis::default().bounds([y_min, y_max]).labels(y_labels));
    f.render_widget(widget, area);
}
