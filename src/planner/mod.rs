//! DDL planner
//!
//! Turns a [`SchemaDiff`] into what has to happen to a final table before
//! typing can run: nothing, an in-place `ALTER TABLE ... ADD COLUMN`, or a
//! soft reset that rebuilds the table from raw history.

use crate::catalog::StreamConfig;
use crate::differ::SchemaDiff;
use crate::error::Result;
use crate::naming::ColumnId;
use crate::sql::{Sql, SqlGenerator};
use crate::types::DestinationSyncMode;
use std::fmt;

/// How much raw history a soft reset retypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Rebuild from every raw row
    FullHistory,
    /// Start empty; only this attempt's rows are typed (`overwrite`)
    CurrentAttempt,
}

/// The DDL needed for one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlPlan {
    NoOp,
    AlterAdd(Vec<ColumnId>),
    SoftReset(ResetScope),
}

impl DdlPlan {
    pub fn is_soft_reset(&self) -> bool {
        matches!(self, DdlPlan::SoftReset(_))
    }

    /// In-place statements for this plan; a soft reset has none
    pub fn operations(&self, config: &StreamConfig, generator: &SqlGenerator) -> Result<Sql> {
        match self {
            DdlPlan::AlterAdd(columns) => generator.alter_add_columns(config, columns),
            DdlPlan::NoOp | DdlPlan::SoftReset(_) => Ok(Sql::empty()),
        }
    }
}

impl fmt::Display for DdlPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdlPlan::NoOp => write!(f, "no-op"),
            DdlPlan::AlterAdd(columns) => {
                let names: Vec<String> = columns.iter().map(ToString::to_string).collect();
                write!(f, "add columns [{}]", names.join(", "))
            }
            DdlPlan::SoftReset(ResetScope::FullHistory) => write!(f, "soft reset (full history)"),
            DdlPlan::SoftReset(ResetScope::CurrentAttempt) => {
                write!(f, "soft reset (current attempt)")
            }
        }
    }
}

/// Plan the DDL for a stream
pub fn plan(config: &StreamConfig, diff: &SchemaDiff) -> DdlPlan {
    if config.destination_sync_mode() == DestinationSyncMode::Overwrite {
        return DdlPlan::SoftReset(ResetScope::CurrentAttempt);
    }

    match diff {
        SchemaDiff::Absent | SchemaDiff::Incompatible(_) => {
            DdlPlan::SoftReset(ResetScope::FullHistory)
        }
        SchemaDiff::Additive(columns) if columns.is_empty() => DdlPlan::NoOp,
        SchemaDiff::Additive(columns) => DdlPlan::AlterAdd(columns.clone()),
    }
}

/// Plan the DDL for a stream whose previous soft reset never swapped
pub fn plan_resuming(config: &StreamConfig, diff: &SchemaDiff, interrupted_reset: bool) -> DdlPlan {
    match plan(config, diff) {
        DdlPlan::NoOp | DdlPlan::AlterAdd(_) if interrupted_reset => {
            DdlPlan::SoftReset(ResetScope::FullHistory)
        }
        planned => planned,
    }
}
