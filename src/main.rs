//! # docsift CLI
//!
//! The `docsift` binary scans folders of documents, analyzes them with a
//! local language model, and lets you browse the results.
//!
//! ## Usage
//!
//! ```bash
//! docsift --config ./config/docsift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsift init` | Create the SQLite database and run schema migrations |
//! | `docsift probe` | Check that the model endpoint is up and the model is loaded |
//! | `docsift scan <folder>` | Extract, chunk, and analyze every supported file |
//! | `docsift reanalyze <id>` | Re-run analysis over a document's stored chunks |
//! | `docsift get <id>` | Show a document, its latest analysis, and its chunks |
//! | `docsift status <id>` | Show where a document is in its analysis lifecycle |
//! | `docsift list` | List documents, newest first |
//! | `docsift search "<query>"` | Search names, summaries, keywords, and text |
//! | `docsift stats` | Show database statistics |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docsift::control::ScanControl;
use docsift::llm::AnalysisClient;
use docsift::models::DocumentStatus;
use docsift::orchestrator::{AnalysisMode, DocumentOutcome};
use docsift::pipeline::{self, ScanRequest};
use docsift::progress::ProgressMode;
use docsift::{config, get, logging, migrate, search, stats};

/// docsift: a local-first document analyzer.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docsift.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docsift",
    about = "docsift: extract, chunk, and analyze documents with a local language model",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and its tables (documents,
    /// analysis_results, document_chunks). Safe to run repeatedly.
    Init,

    /// Check the model endpoint.
    ///
    /// Verifies that the endpoint answers, that the configured model is
    /// loaded, and (unless disabled) that it responds to a test prompt.
    Probe,

    /// Scan a folder and analyze every supported file.
    Scan {
        /// Folder to scan.
        folder: PathBuf,

        /// Analyze every chunk separately and merge the results.
        #[arg(long)]
        detailed: bool,

        /// Only scan the top level of the folder.
        #[arg(long)]
        no_recursive: bool,

        /// Comma-separated type groups: pdf, docx, txt, images.
        #[arg(long, value_delimiter = ',')]
        types: Option<Vec<String>>,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Progress output: off, human, or json (stderr). Defaults to human
        /// on a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Re-run analysis over a document's stored chunks.
    Reanalyze {
        /// Document id.
        id: i64,

        /// Analyze every chunk separately and merge the results.
        #[arg(long)]
        detailed: bool,
    },

    /// Show a document with its latest analysis and chunks.
    Get {
        /// Document id.
        id: i64,
    },

    /// Show a document's analysis status.
    Status {
        /// Document id.
        id: i64,
    },

    /// List documents, newest first.
    List {
        /// Filter by status: pending, processing, completed, failed.
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of documents to show.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Search file names, summaries, keywords, and chunk text.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show database statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Probe => {
            let client = AnalysisClient::from_config(&cfg.llm, &cfg.analysis)?;
            client.test_connection().await?;
            println!(
                "Model endpoint OK: {} is loaded at {}",
                client.model_name(),
                cfg.llm.base_url
            );
        }
        Commands::Scan {
            folder,
            detailed,
            no_recursive,
            types,
            limit,
            progress,
        } => {
            let progress = match progress {
                Some(mode) => mode.parse::<ProgressMode>()?,
                None => ProgressMode::default_for_tty(),
            };
            let request = ScanRequest {
                folder,
                mode: AnalysisMode::from_detailed(detailed),
                recursive: !no_recursive,
                types,
                limit,
                progress,
            };

            let control = Arc::new(ScanControl::new());
            {
                let control = Arc::clone(&control);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        eprintln!("Stopping after the current document...");
                        control.cancel();
                    }
                });
            }

            let summary = pipeline::run_scan_command(&cfg, &request, &control).await?;
            println!(
                "Scan {}: {} discovered, {} processed, {} completed, {} failed.",
                if summary.cancelled { "cancelled" } else { "finished" },
                summary.discovered,
                summary.processed,
                summary.completed,
                summary.failed
            );
        }
        Commands::Reanalyze { id, detailed } => {
            let outcome =
                pipeline::run_reanalyze_command(&cfg, id, AnalysisMode::from_detailed(detailed))
                    .await?;
            match outcome {
                DocumentOutcome::Completed(result) => println!(
                    "Document {} re-analyzed (confidence {:.0}%).",
                    id,
                    result.confidence_score * 100.0
                ),
                DocumentOutcome::Failed { error } => {
                    anyhow::bail!("Re-analysis of document {} failed: {}", id, error)
                }
            }
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Status { id } => {
            get::run_status(&cfg, id).await?;
        }
        Commands::List { status, limit } => {
            let status = status
                .as_deref()
                .map(str::parse::<DocumentStatus>)
                .transpose()?;
            search::run_list(&cfg, status, limit).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
