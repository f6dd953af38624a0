//! Runtally CLI: host a result recorder and progress concentrator for a run.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr

mod inspect;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use miette::{IntoDiagnostic, Result};
use runtally::{load_run_config, ProgressConcentratorServer, ResultRecorder};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "runtally",
    version,
    about = "Test result recorder and progress concentrator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a run, accept progress postbacks, and finalize on Ctrl-C
    Serve {
        #[arg(long, help = "Run configuration file (.yaml, .yml or .json)")]
        config: PathBuf,
        #[arg(long, help = "Listen address, overrides the configuration")]
        bind: Option<SocketAddr>,
    },
    /// Summarize a record stream by result type and result code
    Inspect {
        #[arg(help = "Path to a testrun_results.jsos record stream")]
        results: PathBuf,
        #[arg(long, help = "Output as JSON (default: human-readable)")]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Serve { config, bind } => cmd_serve(config, bind),
        Commands::Inspect { results, json } => inspect::cmd_inspect(&results, json),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Logs go to stderr so stdout stays clean for reports.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Handle the serve command.
fn cmd_serve(config_path: PathBuf, bind: Option<SocketAddr>) -> Result<()> {
    let mut config = load_run_config(&config_path)?;
    if let Some(bind) = bind {
        config.concentrator.bind = bind;
    }
    tracing::info!(config = %config_path.display(), title = %config.title, "loaded run configuration");
    let recorder = Arc::new(ResultRecorder::open(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(async {
        let running = ProgressConcentratorServer::new(
            Arc::clone(&recorder),
            config.concentrator.clone(),
            config.forwarding.clone(),
        )
        .start()
        .await?;
        eprintln!("accepting progress postbacks at {}", running.url());

        let stop = running.cancellation_token();
        let on_interrupt = stop.clone();
        ctrlc::set_handler(move || on_interrupt.cancel()).into_diagnostic()?;
        stop.cancelled().await;
        running.shutdown().await?;
        Ok::<(), miette::Report>(())
    })?;

    recorder.finalize()?;
    for line in recorder.format_lines() {
        println!("{line}");
    }
    Ok(())
}

/// Handle the completions command.
#[allow(clippy::unnecessary_wraps)] // Consistent with other command handlers
fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
