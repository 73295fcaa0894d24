//! CLI module
//!
//! Command-line interface for the typer-deduper.
//!
//! # Commands
//!
//! - `plan` - Show what each final table needs
//! - `generate` - Print a stream's typing SQL
//! - `load-raw` - Append JSONL records to a raw table
//! - `run` - Prepare, type and dedupe, commit
//! - `dump` - Print final or raw rows

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{parse_raw_line, Runner};
