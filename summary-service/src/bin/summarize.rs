//! Summarize a text file, then answer follow-up questions from stdin.
//!
//! Usage: summarize report.txt [--image scan.png]
//! Type `quit` or `exit` to end the session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use summary_flow::{FlowEnv, Orchestrator, SingleFlight};
use summary_service::{OpenRouterBackend, ServiceConfig, load_templates, render_reply};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "summarize", about = "Plain-language summary of a medical document")]
struct Args {
    /// Text file holding the medical document
    file: PathBuf,

    /// Optional image sent alongside the text when MODEL_MODE=VLM
    #[arg(long)]
    image: Option<PathBuf>,

    /// Print the summary and exit without asking for follow-up questions
    #[arg(long)]
    no_follow_up: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let config = ServiceConfig::from_env();
    if config.api_key.is_none() {
        warn!("OPENROUTER_API_KEY not set, sending unauthenticated requests to {}", config.base_url);
    }

    let backend = OpenRouterBackend::new(&config)?;
    let env = FlowEnv::new(
        Arc::new(SingleFlight::new(backend)),
        load_templates(&config.prompt_dir),
        config.profile,
    );
    let mut orchestrator = Orchestrator::new(Arc::new(env));

    println!("Analyzing {} ...", args.file.display());
    let reply = orchestrator.submit_document(text, args.image).await?;
    println!("\n{}", render_reply(&reply));

    if args.no_follow_up {
        return Ok(());
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"\nQuestion (quit to exit): ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("quit") || question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match orchestrator.ask(question).await {
            Ok(reply) => println!("\n{}", render_reply(&reply)),
            Err(e) if e.is_backend() => eprintln!("Generation failed: {e}"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
