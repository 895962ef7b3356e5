//! # Antiplag CLI (`antiplag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `antiplag init` | Create the SQLite database and run schema migrations |
//! | `antiplag submit <files...>` | Create a submission from files (or `--text`) |
//! | `antiplag run <id>` | Process a pending submission now |
//! | `antiplag requeue <id>` | Put a submission back to `PENDING` |
//! | `antiplag status <id>` | Show a submission and its documents |
//! | `antiplag results <id>` | Show the match results of a document |
//! | `antiplag corpus add <paths...>` | Load reference files into the local corpus |
//! | `antiplag serve` | Start the HTTP API and background workers |
//! | `antiplag completions <shell>` | Print shell completions |

use std::path::PathBuf;

use antiplag::{commands, config, migrate, server};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Antiplag: checks documents for overlap with a reference corpus and with
/// each other.
#[derive(Parser)]
#[command(name = "antiplag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/antiplag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Create a submission from files or pasted text.
    Submit {
        /// Files to check.
        files: Vec<PathBuf>,

        /// Check this text instead of files.
        #[arg(long)]
        text: Option<String>,

        /// Address notified when the check finishes.
        #[arg(long)]
        email: Option<String>,

        /// Process the submission immediately instead of leaving it pending.
        #[arg(long)]
        run: bool,
    },

    /// Process a pending submission in the foreground.
    Run { submission_id: String },

    /// Reset a processed or stuck submission to PENDING.
    Requeue { submission_id: String },

    /// Show a submission and its documents.
    Status { submission_id: String },

    /// Show the match results of a document.
    Results { document_id: String },

    /// Manage the local reference corpus.
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Start the HTTP server and background workers.
    Serve,

    /// Print shell completions to stdout.
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum CorpusAction {
    /// Extract, normalize and store files (directories are walked).
    Add { paths: Vec<PathBuf> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "antiplag=info,antiplag_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "antiplag",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Submit {
            files,
            text,
            email,
            run,
        } => {
            commands::run_submit(&cfg, &files, text, email, run).await?;
        }
        Commands::Run { submission_id } => {
            commands::run_process(&cfg, &submission_id).await?;
        }
        Commands::Requeue { submission_id } => {
            commands::run_requeue(&cfg, &submission_id).await?;
        }
        Commands::Status { submission_id } => {
            commands::run_status(&cfg, &submission_id).await?;
        }
        Commands::Results { document_id } => {
            commands::run_results(&cfg, &document_id).await?;
        }
        Commands::Corpus { action } => match action {
            CorpusAction::Add { paths } => {
                commands::run_corpus_add(&cfg, &paths).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
