use crate::session::{Session, SessionEvent};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

pub const TAB_DASHBOARD: usize = 0;
pub const TAB_PREVIEW: usize = 1;
pub const TAB_HISTORY: usize = 2;
pub const TAB_HELP: usize = 3;
pub const TAB_COUNT: usize = 4;

/// Which text field, if any, receives key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    FilePath,
    Question,
}

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub info_is_alert: bool,
    pub base_url: String,

    pub session: Session,
    pub input_mode: InputMode,
    pub file_input: String,

    pub table_scroll: usize,
    pub history_selected: usize, // Index of selected history item (0 = most recent)
    // History detail view state
    pub history_detail_view: bool,
    pub history_detail_scroll: usize,
    pub last_exported_path: Option<String>,
}

impl UiState {
    pub fn new(session: Session, base_url: String) -> Self {
        Self {
            tab: TAB_DASHBOARD,
            info: String::new(),
            info_is_alert: false,
            base_url,
            session,
            input_mode: InputMode::Normal,
            file_input: String::new(),
            table_scroll: 0,
            history_selected: 0,
            history_detail_view: false,
            history_detail_scroll: 0,
            last_exported_path: None,
        }
    }

    pub fn set_info(&mut self, msg: impl Into<String>) {
        self.info = msg.into();
        self.info_is_alert = false;
    }

    pub fn set_alert(&mut self, msg: impl Into<String>) {
        self.info = msg.into();
        self.info_is_alert = true;
    }

    /// Apply a completed request to the session and update UI-only state.
    pub fn apply_event(&mut self, ev: SessionEvent) {
        let note = match &ev {
            SessionEvent::UploadCompleted(Ok(_)) => Some("Analysis complete"),
            SessionEvent::AskCompleted(Ok(_)) => Some("Answer received"),
            SessionEvent::StatusChecked(_) => Some("Status updated"),
            _ => None,
        };
        let new_report = matches!(ev, SessionEvent::UploadCompleted(Ok(_)));

        match self.session.apply(ev) {
            Some(alert) => self.set_alert(alert.to_string()),
            None => {
                if let Some(note) = note {
                    self.set_info(note);
                }
            }
        }

        if new_report {
            self.table_scroll = 0;
            self.history_selected = 0;
            self.history_detail_view = false;
            self.history_detail_scroll = 0;
        }
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = remaining.len().min(line_width as usize);
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}
