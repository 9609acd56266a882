use crate::export::{self, DirectorySink};
use crate::gateway::{Gateway, HttpGateway};
use crate::model::{AnalysisResult, SystemStatus};
use crate::orchestrator;
use crate::session::Session;
use crate::storage::{self, HistoryStore};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "csv-insights",
    version,
    about = "CSV Insights client with optional TUI"
)]
pub struct Cli {
    /// Base URL of the analysis service
    #[arg(long, env = "CSV_INSIGHTS_BACKEND_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// CSV file to analyze (uploaded at launch in the TUI)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Follow-up question to ask about the analysis (text/JSON mode)
    #[arg(long, requires = "file")]
    pub ask: Option<String>,

    /// Print JSON result and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Check service status before analyzing
    #[arg(long)]
    pub status: bool,

    /// Write report.txt into this directory after a successful analysis
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Directory holding the report history
    #[arg(long)]
    pub history_dir: Option<PathBuf>,

    /// Check service status when the TUI starts
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub check_status_on_launch: bool,
}

impl Cli {
    pub fn is_scripted(&self) -> bool {
        self.json || self.text
    }

    pub fn data_dir(&self) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(storage::default_data_dir)
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.is_scripted() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_scripted(args).await;
        }
    }

    run_scripted(args).await
}

pub fn build_gateway(args: &Cli) -> Result<Arc<dyn Gateway>> {
    let user_agent = format!("csv-insights/{}", env!("CARGO_PKG_VERSION"));
    let gateway = HttpGateway::new(&args.base_url, &user_agent)
        .with_context(|| format!("create HTTP client for {}", args.base_url))?;
    Ok(Arc::new(gateway))
}

pub fn open_session(args: &Cli) -> Session {
    Session::new(HistoryStore::in_dir(&args.data_dir()))
}

#[derive(Serialize)]
struct ScriptedOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a SystemStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<&'a str>,
}

/// One-shot run: status, analyze, ask, export, print.
async fn run_scripted(args: Cli) -> Result<()> {
    if args.file.is_none() && !args.status {
        anyhow::bail!("nothing to do: pass --file <PATH> and/or --status");
    }

    let gateway = build_gateway(&args)?;
    let mut session = open_session(&args);
    let (out_tx, out_handle) = spawn_output_writer();

    if args.status {
        orchestrator::check_status(&mut session, gateway.as_ref()).await;
    }

    if let Some(path) = args.file.as_deref() {
        let _ = out_tx.send(OutputLine::Stderr(format!("Processing {}...", path.display())));
        if let Some(alert) = orchestrator::analyze_file(&mut session, gateway.as_ref(), path).await
        {
            drop(out_tx);
            let _ = out_handle.await;
            anyhow::bail!("{alert}");
        }

        if let Some(question) = args.ask.as_deref() {
            session.set_pending_question(question);
            if let Some(alert) = orchestrator::ask_followup(&mut session, gateway.as_ref()).await {
                let _ = out_tx.send(OutputLine::Stderr(alert.to_string()));
            }
        }

        if let Some(dir) = args.export.as_deref() {
            let sink = DirectorySink::new(dir);
            if let Some(p) = export::export_current(session.state().current_result.as_ref(), &sink)?
            {
                let _ = out_tx.send(OutputLine::Stderr(format!("Exported: {}", p.display())));
            }
        }
    }

    let state = session.state();
    if args.json {
        let out = serde_json::to_string_pretty(&ScriptedOutput {
            status: state.system_status.as_ref(),
            report: state.current_result.as_ref(),
            answer: state.current_answer.as_deref(),
        })?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = crate::text_summary::build_text_summary(state, session.history());
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
