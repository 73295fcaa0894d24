//! Typing and deduplication
//!
//! Builds the one transaction that moves raw rows into a final (or staging)
//! table. Every declared field is extracted from `_airbyte_data` and cast to
//! its column type; a cast that fails leaves the column NULL and records the
//! field in `_airbyte_meta.errors` instead of failing the row.
//!
//! For `append_dedup` streams only the best row per primary key survives:
//! highest cursor (NULL cursors last), then latest `_airbyte_extracted_at`,
//! then highest `_airbyte_raw_id`. Rows whose deletion marker is set are
//! removed after ranking, so a deletion still supersedes older versions.

mod query;

pub use query::{build_typing_operation, TypingSource};
