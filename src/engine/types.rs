//! Engine types
//!
//! Options, per-stream plans and run statistics for the typer-deduper.

use crate::differ::SchemaDiff;
use crate::planner::DdlPlan;
use serde::Serialize;

/// Options for a typer-deduper run
#[derive(Debug, Clone)]
pub struct TyperDeduperOptions {
    /// Maximum number of streams prepared or typed at once
    pub max_concurrency: usize,
}

impl Default for TyperDeduperOptions {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

impl TyperDeduperOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream concurrency (at least one)
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }
}

/// What preparing a stream will do (or did)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    /// Stream display name (`namespace.name` or `name`)
    pub stream: String,
    /// Final table
    pub table: String,
    pub diff: SchemaDiff,
    pub plan: DdlPlan,
}

/// Statistics from a typer-deduper run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypingStats {
    /// Streams whose final tables were prepared
    pub streams_prepared: usize,
    /// Columns added in place
    pub columns_added: usize,
    /// Soft resets started
    pub soft_resets: usize,
    /// Typing operations executed
    pub typing_runs: usize,
    /// Typing skipped because nothing was unprocessed
    pub typing_skipped: usize,
    /// Side tables swapped into production
    pub swaps: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl TypingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_prepared(&mut self) {
        self.streams_prepared += 1;
    }

    pub fn add_columns(&mut self, count: usize) {
        self.columns_added += count;
    }

    pub fn add_soft_reset(&mut self) {
        self.soft_resets += 1;
    }

    pub fn add_typing_run(&mut self) {
        self.typing_runs += 1;
    }

    pub fn add_typing_skipped(&mut self) {
        self.typing_skipped += 1;
    }

    pub fn add_swap(&mut self) {
        self.swaps += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
