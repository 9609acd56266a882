mod cli;
mod export;
mod gateway;
mod model;
mod orchestrator;
mod session;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
mod view;

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Route logs to stderr in scripted modes and to a file while the TUI owns the terminal.
fn init_tracing(args: &cli::Cli) -> Option<WorkerGuard> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    if args.is_scripted() || cfg!(not(feature = "tui")) {
        tracing_subscriber::registry()
            .with(filter("csv_insights=warn"))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return None;
    }

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("csv-insights.log")
        .build(args.data_dir().join("logs"))
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter("csv_insights=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = cli::Cli::parse();
    let is_scripted = args.is_scripted();
    let _log_guard = init_tracing(&args);

    let res = cli::run(args).await;
    if res.is_ok() && is_scripted {
        // Explicitly exit on success so no lingering request task keeps the runtime alive.
        std::process::exit(0);
    }
    res
}
