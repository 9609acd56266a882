use crate::export::{export_current, DirectorySink};
use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Export the current report into the working directory and report the
/// outcome in the status line. Without a current report nothing happens.
pub fn export_and_show_path(state: &mut UiState) {
    let Some(result) = state.session.state().current_result.as_ref() else {
        return;
    };
    let res = DirectorySink::current_dir().and_then(|sink| export_current(Some(result), &sink));
    match res {
        Ok(Some(path)) => {
            state.last_exported_path = Some(path.to_string_lossy().to_string());
            state.set_info(format!(
                "Exported: {} (press 'y' to copy path)",
                path.display()
            ));
        }
        Ok(None) => {}
        Err(e) => state.set_alert(format!("Export failed: {e:#}")),
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// This creates a background thread that processes clipboard operations sequentially,
/// keeping each clipboard instance alive for a sufficient duration.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        // Clipboard managers on Linux read lazily from the owner.
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Copy text to clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

/// Copy the last exported path and report the outcome.
pub fn copy_last_export_path(state: &mut UiState) {
    let Some(path) = state.last_exported_path.clone() else {
        state.set_info("No exported file path to copy. Export first (e)");
        return;
    };
    match copy_to_clipboard(&path) {
        Ok(()) => {
            let display_path = if path.chars().count() > 60 {
                let head: String = path.chars().take(57).collect();
                format!("{head}...")
            } else {
                path
            };
            state.set_info(format!("Copied to clipboard: {display_path}"));
        }
        Err(e) => state.set_alert(format!("Clipboard copy failed: {e:#}")),
    }
}
