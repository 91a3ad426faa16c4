// src/cli/mod.rs
// Command-line surface: status, promote, consolidate, search, bootstrap.

pub mod bootstrap;
pub mod consolidate;
pub mod promote;
pub mod search;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cortex")]
#[command(author = "Cortex")]
#[command(version)]
#[command(about = "Persistent cross-session memory layer", long_about = None)]
pub struct CliArgs {
    /// Base directory for the memory installation
    #[arg(long, env = "CORTEX_WORKING_DIR")]
    pub working_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print installation layout, tier counts, and adapter availability.
    Status,
    /// Run tier promotion (working -> short-term -> long-term / archive).
    Promote {
        #[arg(long)]
        dry_run: bool,
    },
    /// Merge near-duplicate records within each tier.
    Consolidate {
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the orchestrator against local sources.
    Search {
        query: String,
        #[arg(long = "type")]
        record_type: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value = "10")]
        limit: usize,
        #[arg(long, value_enum, default_value = "table")]
        format: SearchFormat,
    },
    /// Create directories and empty files; optionally seed from curated markdown.
    Bootstrap {
        #[arg(long)]
        seed: bool,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SearchFormat {
    Table,
    Json,
    Plain,
}

fn base_dir(args: &CliArgs) -> PathBuf {
    args.working_dir.clone().unwrap_or_else(|| {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".claude/memory")
    })
}

/// Dispatches a parsed command. Returns the process exit code.
pub async fn run(args: CliArgs) -> i32 {
    let base = base_dir(&args);
    match args.command {
        Command::Status => status::run(&base).await,
        Command::Promote { dry_run } => promote::run(&base, dry_run).await,
        Command::Consolidate { dry_run } => consolidate::run(&base, dry_run).await,
        Command::Search { query, record_type, source, limit, format } => {
            search::run(&base, &query, record_type, source, limit, format).await
        }
        Command::Bootstrap { seed, force } => bootstrap::run(&base, seed, force).await,
    }
}
