//! # ragsync CLI
//!
//! ## Usage
//!
//! ```bash
//! ragsync --config ./config/ragsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragsync update` | Load sources and add new chunks to the vector index |
//! | `ragsync delete` | Remove the vector index directory |
//! | `ragsync status` | Show index location, policy, model and entry count |
//! | `ragsync query "<text>"` | Retrieve the most similar chunks |
//! | `ragsync sessions list` | List saved sessions, newest first |
//! | `ragsync sessions show <id\|latest>` | Print a session's turns |
//! | `ragsync sessions new` | Start a session |
//!
//! ## Examples
//!
//! ```bash
//! # Index ./data (first run embeds everything, later runs only new chunks)
//! ragsync update
//!
//! # Rebuild from scratch, e.g. after changing the embedding model
//! ragsync update --reset
//!
//! # Ask and record into a named session
//! ragsync sessions new --alias thesis
//! ragsync query "what is the warranty period?" --session thesis
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use ragsync::config;
use ragsync::ingest;
use ragsync::logging;
use ragsync::search;
use ragsync::sessions::SessionStore;

/// ragsync: incremental document ingestion into a persistent vector index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragsync",
    about = "Incremental document ingestion into a persistent vector index",
    version,
    long_about = "ragsync loads documents, splits them into chunks with content-derived ids, \
    and embeds only chunks the vector index does not already hold. Unchanged sources \
    cost nothing on re-run and duplicated text is stored once."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load sources and insert chunks missing from the vector index.
    ///
    /// Prints "already up to date" when every chunk id is present.
    Update {
        /// Delete the existing index first and rebuild it.
        #[arg(long)]
        reset: bool,

        /// Report how many chunks would be added without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete the vector index directory. Safe to run when none exists.
    Delete,

    /// Show index location, identity policy, model and entry count.
    Status,

    /// Retrieve the chunks most similar to a query.
    Query {
        /// Query text.
        text: String,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Record the question and retrieved sources into this session
        /// (alias, id, or `latest`).
        #[arg(long)]
        session: Option<String>,
    },

    /// Manage session snapshots.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List sessions, newest first.
    List,

    /// Print every turn of a session.
    Show {
        /// Session alias, id, or `latest`.
        id: String,
    },

    /// Start a new, empty session.
    New {
        /// Human-friendly name for the session.
        #[arg(long)]
        alias: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Update { reset, dry_run } => {
            ingest::run_update(&cfg, reset, dry_run).await?;
        }
        Commands::Delete => {
            ingest::run_delete(&cfg)?;
        }
        Commands::Status => {
            ingest::run_status(&cfg).await?;
        }
        Commands::Query { text, k, session } => {
            search::run_query(&cfg, &text, k, session.as_deref()).await?;
        }
        Commands::Sessions { action } => {
            let store = SessionStore::open(&cfg.sessions.dir)?;
            match action {
                SessionsAction::List => {
                    let sessions = store.list()?;
                    if sessions.is_empty() {
                        println!("No sessions.");
                    }
                    for s in sessions {
                        println!(
                            "{}  {}  {}  {}",
                            s.modified.format("%Y-%m-%d %H:%M"),
                            s.id,
                            s.alias.as_deref().unwrap_or("-"),
                            search::excerpt(&s.first_question, 60)
                        );
                    }
                }
                SessionsAction::Show { id } => {
                    let session = store
                        .resolve(&id)?
                        .ok_or_else(|| anyhow!("No session named '{}'", id))?;
                    println!("Session {}", session.id);
                    if let Some(alias) = &session.alias {
                        println!("  alias: {}", alias);
                    }
                    for (i, record) in session.records.iter().enumerate() {
                        println!();
                        println!("{}. Q: {}", i + 1, record.question);
                        println!("   A: {}", search::excerpt(&record.answer, 200));
                        for source in &record.sources {
                            println!(
                                "   - {} (page {}, chunk {})",
                                source.file, source.page, source.chunk
                            );
                        }
                    }
                }
                SessionsAction::New { alias } => {
                    let session = store.start(alias.as_deref())?;
                    println!("Started session {}", session.id);
                }
            }
        }
    }

    Ok(())
}
