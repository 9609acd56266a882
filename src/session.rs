//! The single mutable model of the active analysis session.
//!
//! State changes only through [`Session::apply`], one [`SessionEvent`] at a
//! time. Uploads and asks each have their own in-flight flag; a completion
//! always clears its flag, so when two calls of the same kind overlap the one
//! that finishes last wins.

use crate::gateway::GatewayError;
use crate::model::{AnalysisResult, AskRequest, HistoryLog, SystemStatus};
use crate::storage::{self, HistoryStore};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub current_result: Option<AnalysisResult>,
    pub system_status: Option<SystemStatus>,
    pub pending_question: String,
    pub current_answer: Option<String>,
    pub upload_in_flight: bool,
    pub ask_in_flight: bool,
}

/// Outcomes of gateway calls, plus the "started" markers that raise flags.
#[derive(Debug)]
pub enum SessionEvent {
    UploadStarted,
    UploadCompleted(Result<AnalysisResult, GatewayError>),
    StatusChecked(Result<SystemStatus, GatewayError>),
    AskStarted,
    AskCompleted(Result<String, GatewayError>),
}

/// Messages shown to the user after a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// Error text reported by the service, shown as-is.
    Remote(String),
    UploadFailed,
    FollowUpUnavailable,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::Remote(msg) => f.write_str(msg),
            Alert::UploadFailed => f.write_str("Error uploading file."),
            Alert::FollowUpUnavailable => f.write_str("LLM follow-up unavailable."),
        }
    }
}

pub struct Session {
    state: SessionState,
    history: HistoryLog,
    store: HistoryStore,
}

impl Session {
    /// Start a session with the persisted history.
    pub fn new(store: HistoryStore) -> Self {
        let history = store.load();
        tracing::info!(entries = history.len(), "history loaded");
        Self {
            state: SessionState::default(),
            history,
            store,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn set_pending_question(&mut self, question: impl Into<String>) {
        self.state.pending_question = question.into();
    }

    pub fn pending_question_mut(&mut self) -> &mut String {
        &mut self.state.pending_question
    }

    pub fn begin_upload(&mut self) {
        self.apply(SessionEvent::UploadStarted);
    }

    /// Build the follow-up request and raise the ask flag, or `None` when
    /// there is no question or no current result.
    pub fn begin_ask(&mut self) -> Option<AskRequest> {
        if self.state.pending_question.is_empty() {
            return None;
        }
        let context = self.state.current_result.as_ref()?.stats.clone();
        let request = AskRequest {
            question: self.state.pending_question.clone(),
            context,
        };
        self.apply(SessionEvent::AskStarted);
        Some(request)
    }

    pub fn apply(&mut self, event: SessionEvent) -> Option<Alert> {
        match event {
            SessionEvent::UploadStarted => {
                self.state.upload_in_flight = true;
                None
            }
            SessionEvent::UploadCompleted(outcome) => {
                self.state.upload_in_flight = false;
                match outcome {
                    Ok(result) => {
                        tracing::info!(
                            columns = result.columns.len(),
                            rows = result.preview.len(),
                            "analysis received"
                        );
                        // record and save belong to the same step
                        self.history = storage::record(&self.history, &result);
                        self.store.save(&self.history);
                        self.state.current_result = Some(result);
                        self.state.current_answer = None;
                        None
                    }
                    Err(GatewayError::Remote(msg)) => {
                        tracing::info!("analysis rejected: {msg}");
                        Some(Alert::Remote(msg))
                    }
                    Err(e) => {
                        tracing::warn!("upload failed: {e}");
                        Some(Alert::UploadFailed)
                    }
                }
            }
            SessionEvent::StatusChecked(outcome) => {
                let status = outcome.unwrap_or_else(|e| {
                    tracing::warn!("status check failed: {e}");
                    SystemStatus::unreachable()
                });
                self.state.system_status = Some(status);
                None
            }
            SessionEvent::AskStarted => {
                self.state.ask_in_flight = true;
                None
            }
            SessionEvent::AskCompleted(outcome) => {
                self.state.ask_in_flight = false;
                match outcome {
                    Ok(answer) => {
                        self.state.current_answer = Some(answer);
                        None
                    }
                    Err(e) => {
                        tracing::warn!("follow-up failed: {e}");
                        Some(Alert::FollowUpUnavailable)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    pub(crate) fn report(columns: &[&str], stats_keys: &[&str]) -> AnalysisResult {
        let mut stats = crate::model::Stats::new();
        for k in stats_keys {
            stats.insert(k.to_string(), json!({"mean": 1.0}));
        }
        AnalysisResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            stats,
            insights: vec!["something".into()],
            ..Default::default()
        }
    }

    pub(crate) fn session() -> Session {
        Session::new(HistoryStore::new(Arc::new(MemoryStore::default())))
    }

    fn transport_error() -> GatewayError {
        GatewayError::Status(StatusCode::BAD_GATEWAY)
    }

    #[test]
    fn starts_empty() {
        let s = session();
        assert_eq!(s.state(), &SessionState::default());
        assert!(s.history().is_empty());
    }

    #[test]
    fn successful_upload_replaces_result_and_clears_answer() {
        let mut s = session();
        s.begin_upload();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["a"], &["a"]))));
        s.set_pending_question("why?");
        s.begin_ask().unwrap();
        s.apply(SessionEvent::AskCompleted(Ok("because".into())));
        assert_eq!(s.state().current_answer.as_deref(), Some("because"));

        s.begin_upload();
        assert!(s.state().upload_in_flight);
        let alert = s.apply(SessionEvent::UploadCompleted(Ok(report(&["b"], &[]))));
        assert_eq!(alert, None);
        assert!(!s.state().upload_in_flight);
        assert_eq!(s.state().current_answer, None);
        assert_eq!(s.state().current_result, Some(report(&["b"], &[])));
        assert_eq!(s.history().len(), 2);
        // question is left as typed
        assert_eq!(s.state().pending_question, "why?");
    }

    #[test]
    fn remote_error_keeps_previous_result_and_history() {
        let mut s = session();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["a"], &[]))));
        s.begin_upload();
        let alert = s.apply(SessionEvent::UploadCompleted(Err(GatewayError::Remote(
            "Invalid or corrupted CSV file.".into(),
        ))));
        assert_eq!(
            alert.map(|a| a.to_string()).as_deref(),
            Some("Invalid or corrupted CSV file.")
        );
        assert!(!s.state().upload_in_flight);
        assert_eq!(s.state().current_result, Some(report(&["a"], &[])));
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn transport_failure_alerts_and_changes_nothing_else() {
        let mut s = session();
        s.begin_upload();
        let alert = s.apply(SessionEvent::UploadCompleted(Err(transport_error())));
        assert_eq!(alert, Some(Alert::UploadFailed));
        assert_eq!(alert.unwrap().to_string(), "Error uploading file.");
        assert!(!s.state().upload_in_flight);
        assert_eq!(s.state().current_result, None);
        assert!(s.history().is_empty());
    }

    #[test]
    fn failed_upload_does_not_clear_answer() {
        let mut s = session();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["a"], &[]))));
        s.apply(SessionEvent::AskCompleted(Ok("kept".into())));
        s.apply(SessionEvent::UploadCompleted(Err(transport_error())));
        assert_eq!(s.state().current_answer.as_deref(), Some("kept"));
    }

    #[test]
    fn status_failure_yields_sentinel() {
        let mut s = session();
        s.apply(SessionEvent::StatusChecked(Err(transport_error())));
        assert_eq!(
            s.state().system_status,
            Some(SystemStatus {
                backend: "unreachable".into(),
                llm: "unknown".into()
            })
        );
        let ok = SystemStatus {
            backend: "ok".into(),
            llm: "connected".into(),
        };
        s.apply(SessionEvent::StatusChecked(Ok(ok.clone())));
        assert_eq!(s.state().system_status, Some(ok));
    }

    #[test]
    fn ask_guard_requires_question_and_result() {
        let mut s = session();
        s.set_pending_question("anything?");
        assert_eq!(s.begin_ask(), None);
        assert!(!s.state().ask_in_flight);

        s.apply(SessionEvent::UploadCompleted(Ok(report(&["t"], &["t"]))));
        s.set_pending_question("");
        assert_eq!(s.begin_ask(), None);
        assert!(!s.state().ask_in_flight);

        s.set_pending_question("trend?");
        let req = s.begin_ask().unwrap();
        assert_eq!(req.question, "trend?");
        assert!(req.context.contains_key("t"));
        assert!(s.state().ask_in_flight);
    }

    #[test]
    fn ask_failure_keeps_previous_answer() {
        let mut s = session();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["t"], &["t"]))));
        s.set_pending_question("q");
        s.begin_ask().unwrap();
        s.apply(SessionEvent::AskCompleted(Ok("first".into())));
        s.begin_ask().unwrap();
        let alert = s.apply(SessionEvent::AskCompleted(Err(transport_error())));
        assert_eq!(alert, Some(Alert::FollowUpUnavailable));
        assert!(!s.state().ask_in_flight);
        assert_eq!(s.state().current_answer.as_deref(), Some("first"));
    }

    #[test]
    fn overlapping_asks_last_completion_wins() {
        let mut s = session();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["t"], &["t"]))));
        s.set_pending_question("What's the trend?");
        s.begin_ask().unwrap();
        s.begin_ask().unwrap();
        assert!(s.state().ask_in_flight);

        // the second request resolves first, the earlier one later
        s.apply(SessionEvent::AskCompleted(Ok("second".into())));
        assert!(!s.state().ask_in_flight);
        s.apply(SessionEvent::AskCompleted(Ok("first".into())));
        assert_eq!(s.state().current_answer.as_deref(), Some("first"));
        assert!(!s.state().ask_in_flight);
    }

    #[test]
    fn stale_answer_still_applies_after_new_upload() {
        let mut s = session();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["a"], &["a"]))));
        s.set_pending_question("q");
        s.begin_ask().unwrap();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["b"], &["b"]))));
        s.apply(SessionEvent::AskCompleted(Ok("about a".into())));
        assert_eq!(s.state().current_answer.as_deref(), Some("about a"));
        assert_eq!(s.state().current_result, Some(report(&["b"], &["b"])));
    }

    #[test]
    fn history_is_persisted_on_success_and_reloaded() {
        let store = HistoryStore::new(Arc::new(MemoryStore::default()));
        let mut s = Session::new(store.clone());
        for i in 0..7 {
            let tag = i.to_string();
            s.apply(SessionEvent::UploadCompleted(Ok(report(&[tag.as_str()], &[]))));
        }
        s.apply(SessionEvent::UploadCompleted(Err(transport_error())));
        assert_eq!(s.history().len(), 5);

        let reopened = Session::new(store);
        assert_eq!(reopened.history(), s.history());
        assert_eq!(
            reopened.history().get(0).unwrap().result,
            report(&["6"], &[])
        );
    }
}
