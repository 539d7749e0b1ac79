//! # Repository Analyzer CLI (`repo-analyzer`)
//!
//! ## Usage
//!
//! ```bash
//! repo-analyzer --config ./config/analyzer.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repo-analyzer init` | Create the database and write a default config if none exists |
//! | `repo-analyzer serve` | Start the HTTP API |
//! | `repo-analyzer analyze <url>` | Clone, index and summarize a repository |
//! | `repo-analyzer ask <url> "<question>"` | Answer a question about a repository |
//! | `repo-analyzer explain <url> <path>` | Explain one file of a repository |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use repo_analyzer::analyze;
use repo_analyzer::config;
use repo_analyzer::context::AppContext;
use repo_analyzer::server;

const EXAMPLE_CONFIG: &str = include_str!("../config/analyzer.example.toml");

/// Repository analyzer: clone a GitHub repository, index its code, and
/// summarize it or answer questions about it with an LLM.
#[derive(Parser)]
#[command(name = "repo-analyzer", version)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means built-in defaults.
    #[arg(long, global = true, default_value = "./config/analyzer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Also writes the default configuration to `--config` when that file
    /// does not exist yet. Safe to run repeatedly.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Clone, index and summarize a repository.
    Analyze {
        /// GitHub repository URL (`https://github.com/<owner>/<repo>`).
        url: String,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a question about a repository.
    Ask {
        url: String,
        question: String,
    },

    /// Explain one file of a repository.
    Explain {
        url: String,
        /// Path relative to the repository root.
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Init) && !cli.config.exists() {
        if let Some(parent) = cli.config.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&cli.config, EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write config: {}", cli.config.display()))?;
        println!("Wrote default config to {}", cli.config.display());
    }

    let cfg = config::load_config(&cli.config)?;
    let ctx = AppContext::open(cfg).await?;

    match cli.command {
        Commands::Init => {
            println!(
                "Database initialized at {}",
                ctx.config.cache.db_path.display()
            );
        }
        Commands::Serve => {
            server::run_server(ctx).await?;
        }
        Commands::Analyze { url, json } => {
            let result = analyze::analyze(&ctx, &url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.summary);
                println!();
                println!("repo id: {}", result.repo_id);
                println!("files indexed: {}", result.stats.total_files);
                println!("functions: {}", result.stats.total_functions);
                println!("classes: {}", result.stats.total_classes);
            }
        }
        Commands::Ask { url, question } => {
            let result = analyze::ask(&ctx, &url, &question).await?;
            println!("{}", result.answer);
            if !result.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &result.sources {
                    println!(
                        "  {} [{}..{}] ({:.3})",
                        source.path, source.start_char, source.end_char, source.score
                    );
                }
            }
        }
        Commands::Explain { url, path } => {
            let result = analyze::explain(&ctx, &url, &path).await?;
            println!("{}", result.explanation);
        }
    }

    Ok(())
}
