//! Request controller for the TUI.
//!
//! Receives commands from the UI thread, runs each gateway call on its own
//! task and emits the outcome as a [`SessionEvent`]. The UI thread owns the
//! session and raises in-flight flags before sending a command.

use crate::gateway::{Gateway, UploadFile};
use crate::model::AskRequest;
use crate::session::SessionEvent;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by the UI.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    CheckStatus,
    Analyze(PathBuf),
    Ask(AskRequest),
    Quit,
}

/// Dispatch UI commands until the UI quits or hangs up.
///
/// Calls are never cancelled; one still running at quit is dropped with the
/// runtime.
pub(crate) async fn run_controller(
    gateway: Arc<dyn Gateway>,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    while let Some(cmd) = cmd_rx.recv().await {
        let gateway = gateway.clone();
        let event_tx = event_tx.clone();
        match cmd {
            UiCommand::CheckStatus => {
                tokio::spawn(async move {
                    let outcome = gateway.check_status().await;
                    let _ = event_tx.send(SessionEvent::StatusChecked(outcome));
                });
            }
            UiCommand::Analyze(path) => {
                tokio::spawn(async move {
                    let outcome = match UploadFile::read(&path).await {
                        Ok(file) => gateway.analyze(file).await,
                        Err(e) => Err(e),
                    };
                    let _ = event_tx.send(SessionEvent::UploadCompleted(outcome));
                });
            }
            UiCommand::Ask(request) => {
                tokio::spawn(async move {
                    let outcome = gateway.ask(&request).await;
                    let _ = event_tx.send(SessionEvent::AskCompleted(outcome));
                });
            }
            UiCommand::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::model::{AnalysisResult, SystemStatus};
    use crate::session::tests::{report, session};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::{mpsc, oneshot, Mutex};

    /// Holds each ask until the test releases the gate for its question.
    #[derive(Default)]
    struct GatedGateway {
        gates: Mutex<HashMap<String, oneshot::Receiver<String>>>,
    }

    #[async_trait]
    impl Gateway for GatedGateway {
        async fn check_status(&self) -> Result<SystemStatus, GatewayError> {
            Ok(SystemStatus {
                backend: "ok".into(),
                llm: "connected".into(),
            })
        }

        async fn analyze(&self, _file: UploadFile) -> Result<AnalysisResult, GatewayError> {
            Err(GatewayError::Remote("not used".into()))
        }

        async fn ask(&self, request: &AskRequest) -> Result<String, GatewayError> {
            let gate = self.gates.lock().await.remove(&request.question);
            match gate {
                Some(rx) => rx
                    .await
                    .map_err(|_| GatewayError::Remote("gate dropped".into())),
                None => Err(GatewayError::Remote("no gate".into())),
            }
        }
    }

    #[tokio::test]
    async fn overlapping_asks_apply_in_completion_order() {
        let gateway = Arc::new(GatedGateway::default());
        let (earlier_tx, earlier_rx) = oneshot::channel();
        let (later_tx, later_rx) = oneshot::channel();
        {
            let mut gates = gateway.gates.lock().await;
            gates.insert("Any outliers?".to_string(), earlier_rx);
            gates.insert("What's the trend?".to_string(), later_rx);
        }
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = tokio::spawn(run_controller(gateway, event_tx, cmd_rx));

        let mut s = session();
        s.apply(SessionEvent::UploadCompleted(Ok(report(&["t"], &["t"]))));

        s.set_pending_question("Any outliers?");
        cmd_tx.send(UiCommand::Ask(s.begin_ask().unwrap())).unwrap();
        s.set_pending_question("What's the trend?");
        cmd_tx.send(UiCommand::Ask(s.begin_ask().unwrap())).unwrap();
        assert!(s.state().ask_in_flight);

        // the later request resolves first
        later_tx.send("rising".into()).unwrap();
        s.apply(event_rx.recv().await.unwrap());
        assert_eq!(s.state().current_answer.as_deref(), Some("rising"));
        assert!(!s.state().ask_in_flight);

        earlier_tx.send("two outliers".into()).unwrap();
        s.apply(event_rx.recv().await.unwrap());
        assert_eq!(s.state().current_answer.as_deref(), Some("two outliers"));
        assert!(!s.state().ask_in_flight);

        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn status_command_reports_back() {
        let gateway = Arc::new(GatedGateway::default());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = tokio::spawn(run_controller(gateway, event_tx, cmd_rx));

        cmd_tx.send(UiCommand::CheckStatus).unwrap();
        let mut s = session();
        s.apply(event_rx.recv().await.unwrap());
        assert_eq!(s.state().system_status.as_ref().unwrap().backend, "ok");

        drop(cmd_tx);
        controller.await.unwrap().unwrap();
    }
}
