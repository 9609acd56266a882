//! Application-level orchestration.
//!
//! Connects the session model to the gateway: `actions` drives one call at a
//! time for the scripted output modes, `controller` runs calls concurrently
//! for the TUI and reports completions back as session events.

mod actions;
#[cfg(feature = "tui")]
mod controller;

pub(crate) use actions::{analyze_file, ask_followup, check_status};
#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand};
