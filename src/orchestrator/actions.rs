//! Sequential drivers: guard, raise the flag, await the gateway, apply.

use crate::gateway::{Gateway, UploadFile};
use crate::session::{Alert, Session, SessionEvent};
use std::path::Path;

pub(crate) async fn check_status(session: &mut Session, gateway: &dyn Gateway) {
    let outcome = gateway.check_status().await;
    session.apply(SessionEvent::StatusChecked(outcome));
}

pub(crate) async fn analyze_file(
    session: &mut Session,
    gateway: &dyn Gateway,
    path: &Path,
) -> Option<Alert> {
    session.begin_upload();
    let outcome = match UploadFile::read(path).await {
        Ok(file) => gateway.analyze(file).await,
        Err(e) => Err(e),
    };
    session.apply(SessionEvent::UploadCompleted(outcome))
}

/// Ask the pending question about the current result. Returns `None` both on
/// success and when the guard skipped the call.
pub(crate) async fn ask_followup(session: &mut Session, gateway: &dyn Gateway) -> Option<Alert> {
    let request = session.begin_ask()?;
    let outcome = gateway.ask(&request).await;
    session.apply(SessionEvent::AskCompleted(outcome))
}
