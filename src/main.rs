//! Lab points command runner

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labpoints::command::{Response, Session};
use labpoints::{EngineConfig, MemoryRegistry, PointsEngine, PointsEvent};

#[derive(Parser)]
#[command(name = "labpoints")]
#[command(about = "Tutor-approved point requests for a student cohort")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: EngineConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute JSON-lines commands and print one JSON response per line
    Run {
        /// Command file (default: stdin)
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Also print emitted events
        #[arg(long)]
        events: bool,

        /// Stop at the first failed command with a non-zero exit status
        #[arg(long)]
        fail_fast: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labpoints=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            events,
            fail_fast,
        } => {
            let input: Box<dyn AsyncBufRead + Unpin + Send> = match &script {
                Some(path) => {
                    let file = tokio::fs::File::open(path)
                        .await
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    Box::new(BufReader::new(file))
                }
                None => Box::new(BufReader::new(tokio::io::stdin())),
            };
            run(input, &cli.config, events, fail_fast).await
        }
    }
}

async fn run(
    input: Box<dyn AsyncBufRead + Unpin + Send>,
    config: &EngineConfig,
    show_events: bool,
    fail_fast: bool,
) -> Result<()> {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = Arc::new(PointsEngine::with_config(registry.clone(), config));
    let mut events = engine.subscribe();
    let session = Session::new(engine, registry);

    tracing::info!(engine = %session.engine().engine_identity(), "session started");

    let mut lines = input.lines();
    let mut line_no = 0usize;
    let mut failures = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let response = session.handle_line(trimmed).await;

        drain_events(&mut events, show_events)?;
        println!("{}", serde_json::to_string(&response)?);

        if let Response::Error { message, .. } = &response {
            failures += 1;
            tracing::warn!(line = line_no, %message, "command failed");
            if fail_fast {
                anyhow::bail!("line {}: {}", line_no, message);
            }
        }
    }

    tracing::info!(commands = line_no, failures, "session finished");
    Ok(())
}

/// Print (or just discard) every queued event. A lagging receiver loses the
/// oldest events; that is reported and draining continues.
fn drain_events(events: &mut broadcast::Receiver<PointsEvent>, show: bool) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if show {
                    print_event(&event)?;
                }
            }
            Err(TryRecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event output fell behind, events dropped");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

fn print_event(event: &PointsEvent) -> Result<()> {
    let value = serde_json::json!({ "event": event });
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}
