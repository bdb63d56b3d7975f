//! # Docent CLI (`docent`)
//!
//! Question answering over a directory of documents, backed by a local
//! Ollama model and a SQLite vector index.
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./config/docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent serve` | Wait for the model, ingest, and serve the HTTP API |
//! | `docent ingest` | Run one ingestion pass (optionally a single file) |
//! | `docent ask "<question>" --context <file>` | Answer one question |
//! | `docent check-model` | Poll the model service until the model is ready |
//! | `docent init` | Create the SQLite schema |
//!
//! When the config file does not exist, defaults plus the `OLLAMA_BASE_URL`,
//! `OLLAMA_MODEL`, `PORT` and `DOCUMENTS_DIR` environment variables are used.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

use docent::config::{self, Config};
use docent::coordinator::AppContext;
use docent::progress::ProgressMode;
use docent::telemetry::{self, LogFormat};
use docent::{db, ingest, migrate, server};

/// Docent: ask questions about your documents.
#[derive(Parser)]
#[command(name = "docent", version, about = "Question answering over a directory of documents")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docent.toml")]
    config: PathBuf,

    /// Log at debug level, including every agent step. Also enabled by `VERBOSE=true`.
    #[arg(long, global = true)]
    verbose: bool,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// The server starts listening immediately; model readiness and the
    /// initial ingestion pass run in the background. If the model never
    /// becomes available the process exits with an error.
    Serve,

    /// Run one ingestion pass over the documents directory.
    Ingest {
        /// Only process this file of the documents directory.
        #[arg(long)]
        file: Option<String>,

        /// Progress output on stderr.
        #[arg(long, value_enum, default_value_t = ProgressMode::Human)]
        progress: ProgressMode,
    },

    /// Answer a single question about a document.
    Ask {
        /// The question.
        question: String,

        /// Filename the question refers to.
        #[arg(long)]
        context: String,
    },

    /// Wait for the model service and report whether the model is ready.
    CheckModel,

    /// Initialize the database schema. Safe to run repeatedly.
    Init,
}

/// Load the config file, or fall back to defaults when it does not exist.
fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return config::load_config(path);
    }
    warn!(path = %path.display(), "config file not found, using defaults");
    let mut cfg = Config::minimal();
    cfg.apply_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose || telemetry::verbose_from_env(), cli.log_format);

    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::CheckModel => {
            let ctx = AppContext::connect(cfg).await?;
            let attempts = ctx.wait_for_model().await?;
            println!(
                "Model {} is ready (attempts: {}).",
                ctx.config().model.name,
                attempts
            );
        }
        Commands::Ingest { file, progress } => {
            let ctx = AppContext::connect(cfg).await?;
            ctx.wait_for_model().await?;
            let reporter = progress.reporter();
            let report = ingest::run(
                ctx.store(),
                ctx.documents_dir(),
                file.as_deref(),
                reporter.as_ref(),
                &ctx.config().ingest,
            )
            .await?;
            println!("{}", report);
        }
        Commands::Ask { question, context } => {
            let ctx = AppContext::connect(cfg).await?;
            ctx.wait_for_model().await?;
            ctx.mark_ready();
            let answer = ctx.answer(&question, &context).await?;
            println!("{}", answer);
        }
        Commands::Serve => {
            let ctx = Arc::new(AppContext::connect(cfg).await?);

            let background = Arc::clone(&ctx);
            tokio::spawn(async move {
                if let Err(e) = background.startup().await {
                    error!(error = %e, "startup failed");
                    std::process::exit(1);
                }
            });

            server::run_server(ctx).await?;
        }
    }

    Ok(())
}
