use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use strata::RunRequest;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Layered investment strategy reports from a panel of LLM experts")]
struct Cli {
    /// Path to configuration file (defaults to config/strata.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Question to answer. Without it a {"question": ...} JSON is read from --input or stdin
    #[arg(short, long)]
    question: Option<String>,

    /// Read the request JSON from a file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Override the artifact store path from the config
    #[arg(long)]
    output_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn read_question(cli: &Cli) -> Result<String> {
    if let Some(question) = &cli.question {
        return Ok(question.clone());
    }

    let request_json = if let Some(input_path) = &cli.input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {}", input_path.display()))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };

    let request: RunRequest =
        serde_json::from_str(&request_json).context("Failed to parse request JSON")?;
    Ok(request.question)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the result (respects RUST_LOG)
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = strata::load_config(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        config.store.path = dir.clone();
    }

    let question = read_question(&cli)?;

    let orchestrator = strata::build_orchestrator(&config)
        .await
        .context("Failed to build orchestrator")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let report = orchestrator
        .run_with_cancel(&question, cancel)
        .await
        .map_err(|e| anyhow::anyhow!("Run failed: {e}"))?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");

    Ok(())
}
