mod charts;
mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::orchestrator::{self, UiCommand};
use crate::session::{Session, SessionEvent};
use crate::view;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{InputMode, UiState, TAB_COUNT, TAB_DASHBOARD, TAB_HELP, TAB_HISTORY, TAB_PREVIEW};
use std::path::PathBuf;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels so the UI thread never waits on the runtime.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let gateway = crate::cli::build_gateway(&args)?;
    let session = crate::cli::open_session(&args);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(args, session, event_rx, cmd_tx));

    let res = orchestrator::run_controller(gateway, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    session: Session,
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(session, args.base_url.clone());

    if args.check_status_on_launch {
        let _ = cmd_tx.send(UiCommand::CheckStatus);
    }
    if let Some(path) = args.file.clone() {
        state.file_input = path.display().to_string();
        start_upload(&mut state, path, &cmd_tx);
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain completions without blocking; each one is a single state transition.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &cmd_tx) == KeyOutcome::Quit {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn start_upload(state: &mut UiState, path: PathBuf, cmd_tx: &UnboundedSender<UiCommand>) {
    state.session.begin_upload();
    state.set_info("Processing file...");
    let _ = cmd_tx.send(UiCommand::Analyze(path));
}

fn submit_question(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    // Guard failures (empty question, no report) are silent no-ops.
    if let Some(request) = state.session.begin_ask() {
        state.set_info("Generating answer...");
        let _ = cmd_tx.send(UiCommand::Ask(request));
    }
}

fn handle_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) -> KeyOutcome {
    if k.modifiers == KeyModifiers::CONTROL && k.code == KeyCode::Char('c') {
        return KeyOutcome::Quit;
    }

    match state.input_mode {
        InputMode::FilePath => {
            match k.code {
                KeyCode::Esc => state.input_mode = InputMode::Normal,
                KeyCode::Enter => {
                    state.input_mode = InputMode::Normal;
                    let path = state.file_input.trim().to_string();
                    if path.is_empty() {
                        state.set_info("No file selected");
                    } else {
                        start_upload(state, PathBuf::from(path), cmd_tx);
                    }
                }
                KeyCode::Backspace => {
                    state.file_input.pop();
                }
                KeyCode::Char(c) => state.file_input.push(c),
                _ => {}
            }
            return KeyOutcome::Continue;
        }
        InputMode::Question => {
            match k.code {
                KeyCode::Esc => state.input_mode = InputMode::Normal,
                KeyCode::Enter => {
                    state.input_mode = InputMode::Normal;
                    submit_question(state, cmd_tx);
                }
                KeyCode::Backspace => {
                    state.session.pending_question_mut().pop();
                }
                KeyCode::Char(c) => state.session.pending_question_mut().push(c),
                _ => {}
            }
            return KeyOutcome::Continue;
        }
        InputMode::Normal => {}
    }

    match k.code {
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Char('u') => {
            state.tab = TAB_DASHBOARD;
            state.input_mode = InputMode::FilePath;
        }
        KeyCode::Char('/') => {
            state.tab = TAB_DASHBOARD;
            state.input_mode = InputMode::Question;
        }
        KeyCode::Char('s') => {
            state.set_info("Checking status...");
            let _ = cmd_tx.send(UiCommand::CheckStatus);
        }
        KeyCode::Char('e') => export::export_and_show_path(state),
        KeyCode::Char('y') => export::copy_last_export_path(state),
        KeyCode::Tab => {
            state.tab = (state.tab + 1) % TAB_COUNT;
            state.history_detail_view = false;
        }
        KeyCode::BackTab => {
            state.tab = (state.tab + TAB_COUNT - 1) % TAB_COUNT;
            state.history_detail_view = false;
        }
        KeyCode::Char('?') => state.tab = TAB_HELP,
        KeyCode::Enter if state.tab == TAB_HISTORY => {
            if state.history_selected < state.session.history().len() {
                state.history_detail_view = !state.history_detail_view;
                state.history_detail_scroll = 0;
            }
        }
        KeyCode::Esc if state.history_detail_view => state.history_detail_view = false,
        KeyCode::Up | KeyCode::Char('k') => match state.tab {
            TAB_PREVIEW => state.table_scroll = state.table_scroll.saturating_sub(1),
            TAB_HISTORY if state.history_detail_view => {
                state.history_detail_scroll = state.history_detail_scroll.saturating_sub(1)
            }
            TAB_HISTORY => state.history_selected = state.history_selected.saturating_sub(1),
            _ => {}
        },
        KeyCode::Down | KeyCode::Char('j') => match state.tab {
            TAB_PREVIEW => {
                let rows = state
                    .session
                    .state()
                    .current_result
                    .as_ref()
                    .map(|r| r.preview.len())
                    .unwrap_or(0);
                if state.table_scroll + 1 < rows {
                    state.table_scroll += 1;
                }
            }
            TAB_HISTORY if state.history_detail_view => state.history_detail_scroll += 1,
            TAB_HISTORY => {
                if state.history_selected + 1 < state.session.history().len() {
                    state.history_selected += 1;
                }
            }
            _ => {}
        },
        _ => {}
    }
    KeyOutcome::Continue
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Dashboard"),
        Line::from("Preview"),
        Line::from("History"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("csv-insights ({})", state.base_url)),
    )
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_DASHBOARD => draw_dashboard(chunks[1], f, state),
        TAB_PREVIEW => draw_preview(chunks[1], f, state),
        TAB_HISTORY => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }

    draw_info(chunks[2], f, state);
}

fn draw_info(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let style = if state.info_is_alert {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let p = Paragraph::new(Span::styled(state.info.clone(), style))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

fn input_block(title: &str, active: bool) -> Block<'static> {
    let style = if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title.to_string())
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let s = state.session.state();
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(4), // System status + upload side-by-side
                Constraint::Min(5),    // Insights + AI summary
                Constraint::Length(3), // Question input
                Constraint::Length(7), // Answer
            ]
            .as_ref(),
        )
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(main[0]);

    let mut status_lines = Vec::new();
    match s.system_status.as_ref() {
        Some(st) => {
            state::push_wrapped_status_kv(&mut status_lines, "Backend", &st.backend, top[0].width);
            state::push_wrapped_status_kv(&mut status_lines, "LLM", &st.llm, top[0].width);
        }
        None => status_lines.push(Line::from("Press 's' to check")),
    }
    f.render_widget(
        Paragraph::new(status_lines)
            .block(Block::default().borders(Borders::ALL).title("System Status")),
        top[0],
    );

    let editing_path = state.input_mode == InputMode::FilePath;
    let mut upload_lines = vec![Line::from(if editing_path || !state.file_input.is_empty() {
        format!("{}{}", state.file_input, if editing_path { "_" } else { "" })
    } else {
        "Press 'u' to choose a CSV file".to_string()
    })];
    if s.upload_in_flight {
        upload_lines.push(Line::from(Span::styled(
            "Processing file...",
            Style::default().fg(Color::Cyan),
        )));
    }
    f.render_widget(
        Paragraph::new(upload_lines).block(input_block("Upload", editing_path)),
        top[1],
    );

    let mut report_lines = Vec::new();
    match s.current_result.as_ref() {
        Some(result) => {
            report_lines.push(Line::from(Span::styled(
                "Insights",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for insight in &result.insights {
                report_lines.push(Line::from(format!("  • {insight}")));
            }
            if let Some(summary) = result.llm_summary.as_deref() {
                report_lines.push(Line::from(""));
                report_lines.push(Line::from(Span::styled(
                    "AI Summary",
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                report_lines.push(Line::from(summary.trim().to_string()));
            }
        }
        None => report_lines.push(Line::from("No analysis yet.")),
    }
    f.render_widget(
        Paragraph::new(report_lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Report")),
        main[1],
    );

    let editing_question = state.input_mode == InputMode::Question;
    let question_text = if editing_question {
        format!("{}_", s.pending_question)
    } else if s.pending_question.is_empty() {
        "Press '/' to ask about trends or anomalies".to_string()
    } else {
        s.pending_question.clone()
    };
    f.render_widget(
        Paragraph::new(question_text).block(input_block("Ask a Follow-up Question", editing_question)),
        main[2],
    );

    let answer = if s.ask_in_flight {
        Paragraph::new(Span::styled(
            "Generating answer...",
            Style::default().fg(Color::Cyan),
        ))
    } else {
        Paragraph::new(s.current_answer.clone().unwrap_or_default())
    };
    f.render_widget(
        answer
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Answer")),
        main[3],
    );
}

fn draw_preview(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let Some(result) = state.session.state().current_result.as_ref() else {
        let p = Paragraph::new("No analysis yet. Press 'u' to upload a CSV file.")
            .block(Block::default().borders(Borders::ALL).title("Preview"));
        f.render_widget(p, area);
        return;
    };

    let table = view::project_table(result);
    match view::project_chart(result) {
        Some(chart) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
                .split(area);
            charts::draw_preview_table(f, parts[0], &table, state.table_scroll);
            charts::draw_series_chart(f, parts[1], &chart);
        }
        None => charts::draw_preview_table(f, area, &table, state.table_scroll),
    }
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let history = state.session.history();

    if state.history_detail_view {
        if let Some(entry) = history.get(state.history_selected) {
            let body = serde_json::to_string_pretty(&entry.result)
                .unwrap_or_else(|e| format!("Unable to render report: {e}"));
            let p = Paragraph::new(body)
                .scroll((state.history_detail_scroll.min(u16::MAX as usize) as u16, 0))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!("Report from {} (Esc to close)", entry.timestamp)),
                );
            f.render_widget(p, area);
            return;
        }
    }

    let stamps = view::project_history(history);
    let lines: Vec<Line> = if stamps.is_empty() {
        vec![Line::from("No reports yet.")]
    } else {
        stamps
            .into_iter()
            .enumerate()
            .map(|(i, stamp)| {
                if i == state.history_selected {
                    Line::from(Span::styled(
                        format!("> {stamp}"),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(format!("  {stamp}"))
                }
            })
            .collect()
    };
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Last {} Reports", crate::model::HistoryLog::CAPACITY)),
    );
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{report, session};

    fn ui() -> UiState {
        UiState::new(session(), "http://localhost:8000".into())
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(state: &mut UiState, text: &str, tx: &UnboundedSender<UiCommand>) {
        for c in text.chars() {
            handle_key(state, key(KeyCode::Char(c)), tx);
        }
    }

    #[test]
    fn question_without_report_is_not_sent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ui();
        handle_key(&mut state, key(KeyCode::Char('/')), &tx);
        type_text(&mut state, "What's the trend?", &tx);
        handle_key(&mut state, key(KeyCode::Enter), &tx);

        assert!(rx.try_recv().is_err());
        assert!(!state.session.state().ask_in_flight);
        assert_eq!(state.session.state().pending_question, "What's the trend?");
    }

    #[test]
    fn question_with_report_is_sent_and_kept() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ui();
        state.apply_event(SessionEvent::UploadCompleted(Ok(report(&["t"], &["t"]))));

        handle_key(&mut state, key(KeyCode::Char('/')), &tx);
        type_text(&mut state, "why", &tx);
        handle_key(&mut state, key(KeyCode::Enter), &tx);

        match rx.try_recv() {
            Ok(UiCommand::Ask(req)) => assert_eq!(req.question, "why"),
            other => panic!("expected ask command, got {other:?}"),
        }
        assert!(state.session.state().ask_in_flight);
        assert_eq!(state.session.state().pending_question, "why");
        assert_eq!(state.input_mode, InputMode::Normal);
    }

    #[test]
    fn upload_path_entry_raises_flag_and_sends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ui();
        handle_key(&mut state, key(KeyCode::Char('u')), &tx);
        // 'q' is text while editing, not quit
        type_text(&mut state, "q.csv", &tx);
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Enter), &tx),
            KeyOutcome::Continue
        );

        match rx.try_recv() {
            Ok(UiCommand::Analyze(p)) => assert_eq!(p, PathBuf::from("q.csv")),
            other => panic!("expected analyze command, got {other:?}"),
        }
        assert!(state.session.state().upload_in_flight);
    }

    #[test]
    fn empty_path_is_not_uploaded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ui();
        handle_key(&mut state, key(KeyCode::Char('u')), &tx);
        handle_key(&mut state, key(KeyCode::Enter), &tx);
        assert!(rx.try_recv().is_err());
        assert!(!state.session.state().upload_in_flight);
    }

    #[test]
    fn export_without_report_does_nothing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = ui();
        handle_key(&mut state, key(KeyCode::Char('e')), &tx);
        assert_eq!(state.last_exported_path, None);
        assert!(state.info.is_empty());
    }

    #[test]
    fn remote_error_is_shown_as_alert() {
        let mut state = ui();
        state.apply_event(SessionEvent::UploadCompleted(Err(
            crate::gateway::GatewayError::Remote("Uploaded CSV is empty.".into()),
        )));
        assert_eq!(state.info, "Uploaded CSV is empty.");
        assert!(state.info_is_alert);
    }

    #[test]
    fn quit_keys() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = ui();
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Char('q')), &tx),
            KeyOutcome::Quit
        );
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        state.input_mode = InputMode::Question;
        assert_eq!(handle_key(&mut state, ctrl_c, &tx), KeyOutcome::Quit);
    }
}
