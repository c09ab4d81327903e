//! # Paper Harvest CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Wait for PostgreSQL and create the `pdf_data` table |
//! | `harvest run` | Locate, fetch, extract, enrich and persist channel PDFs |
//! | `harvest get <file_id>` | Print one stored record |
//!
//! Logs go to stderr; summaries and records go to stdout. Any fatal error
//! exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use paper_harvest::{config, get, logging, pipeline};

/// Paper Harvest: collect research PDFs shared in Slack into PostgreSQL.
///
/// Settings come from a TOML file, then environment variables (a `.env`
/// file in the working directory is honoured). See
/// `config/harvest.example.toml`.
#[derive(Parser)]
#[command(name = "harvest", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// A missing file is fine when the environment supplies the settings.
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the database and create the schema. Idempotent.
    Init,

    /// Run the full pipeline once over the configured channel.
    Run {
        /// Persist into an in-memory store instead of PostgreSQL.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of attachments to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the stored record for a Slack file id.
    Get {
        /// Slack file id (e.g. `F0123ABCD`).
        file_id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let cfg = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            let dispatch = logging::fallback_dispatch();
            tracing::dispatcher::with_default(&dispatch, || {
                tracing::error!(error = %format!("{:#}", e), "Configuration error");
            });
            return ExitCode::FAILURE;
        }
    };

    let dispatch = match logging::build_dispatch(&cfg.logging) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run_command(cli.command, &cfg)
        .with_subscriber(dispatch.clone())
        .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&dispatch, &e);
            ExitCode::FAILURE
        }
    }
}

async fn run_command(command: Commands, cfg: &config::Config) -> anyhow::Result<()> {
    match command {
        Commands::Init => pipeline::run_init(cfg).await,
        Commands::Run { dry_run, limit } => pipeline::run_harvest(cfg, dry_run, limit).await,
        Commands::Get { file_id } => get::run_get(cfg, &file_id).await,
    }
}

fn report(dispatch: &Dispatch, error: &anyhow::Error) {
    tracing::dispatcher::with_default(dispatch, || {
        tracing::error!(error = %format!("{:#}", error), "Harvest failed");
    });
}
