// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Solidafy Typer-Deduper
//!
//! Turns append-only raw tables of JSON records into typed, deduplicated,
//! schema-evolving final tables.
//!
//! ## Features
//!
//! - **Typing**: each declared field is cast to its column type; a failed
//!   cast stores NULL and records the failure in `_airbyte_meta`
//! - **Deduplication**: `append_dedup` streams keep one row per primary key,
//!   chosen by cursor, then extraction time, then raw id
//! - **CDC deletes**: rows with a set `_ab_cdc_deleted_at` remove the key
//! - **Schema evolution**: new columns are added in place; anything else
//!   rebuilds the final table from raw history (a soft reset)
//! - **Idempotence**: typing the same raw rows twice leaves the same result
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_typer_deduper::{
//!     catalog::{load_catalog, CatalogParser},
//!     destination::{DestinationDriver, DuckDbDestination},
//!     engine::TyperDeduper,
//!     naming::IdentifierResolver,
//!     Result,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let destination = Arc::new(DuckDbDestination::open("warehouse.duckdb", "airbyte_internal")?);
//!     let resolver = IdentifierResolver::new(
//!         destination.dialect().naming(),
//!         "airbyte_internal",
//!         "main",
//!     );
//!     let catalog = CatalogParser::new(resolver).parse(&load_catalog("catalog.yaml")?)?;
//!
//!     let stats = TyperDeduper::new(destination, catalog).run().await?;
//!     println!("{} typing runs", stats.typing_runs);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TyperDeduper                            │
//! │     prepare() → type_and_dedupe(stream)* → commit_final_tables()│
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Catalog  │  Differ   │   Planner     │  Typing   │ Destination │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Schema   │ Additive  │ No-op         │ Cast      │ DuckDB      │
//! │ Naming   │ Absent    │ Add columns   │ Dedup     │ Retry       │
//! │ Keys     │ Breaking  │ Soft reset    │ CDC       │ State       │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```
//!
//! Everything left of `Destination` only builds SQL; the destination
//! driver is the sole place that talks to a database.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Airbyte type model and JSON-schema parsing
pub mod schema;

/// Identifier naming and resolution
pub mod naming;

/// Configured catalog and validated stream configs
pub mod catalog;

/// SQL dialects
pub mod dialect;

/// SQL batches and DDL generation
pub mod sql;

/// Typing and deduplication statements
pub mod typing;

/// Final table schema comparison
pub mod differ;

/// DDL planning
pub mod planner;

/// Soft reset state machine
pub mod reset;

/// Destination drivers
pub mod destination;

/// Per-stream destination state
pub mod state;

/// Typer-deduper orchestration
pub mod engine;

/// Runtime configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use catalog::{load_catalog, CatalogParser, ParsedCatalog, StreamConfig};
pub use config::{load_config, TyperDeduperConfig};
pub use destination::{DestinationDriver, DuckDbDestination};
pub use engine::{TyperDeduper, TyperDeduperOptions, TypingStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
