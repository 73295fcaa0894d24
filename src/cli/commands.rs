//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Solidafy typer-deduper CLI
#[derive(Parser, Debug)]
#[command(name = "solidafy-td")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Configured catalog (YAML or JSON)
    #[arg(short = 'k', long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the DDL plan for every stream without changing anything
    Plan,

    /// Print the typing SQL for a stream
    Generate {
        /// Stream name (or `namespace.name`)
        #[arg(long)]
        stream: String,

        /// Type every raw row instead of only unprocessed ones
        #[arg(long)]
        full_history: bool,
    },

    /// Append JSONL records to a stream's raw table
    LoadRaw {
        /// Stream name (or `namespace.name`)
        #[arg(long)]
        stream: String,

        /// Input file, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Prepare, type and dedupe every stream, then commit
    Run,

    /// Print a stream's final (or raw) rows
    Dump {
        /// Stream name (or `namespace.name`)
        #[arg(long)]
        stream: String,

        /// Dump the raw table instead of the final table
        #[arg(long)]
        raw: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
