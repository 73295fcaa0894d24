//! Schema differ
//!
//! Compares a stream's desired shape with what introspection found:
//!
//! - no table: [`SchemaDiff::Absent`]
//! - every existing column still declared with the same type, and only new
//!   nullable columns to add: [`SchemaDiff::Additive`]
//! - anything else, including a changed primary key, cursor, or switch into
//!   `append_dedup`: [`SchemaDiff::Incompatible`]

mod compare;
mod types;

pub use compare::diff;
pub use types::{ColumnDefinition, ExistingTable, RecordedKeys, SchemaDiff, TableDefinition};

#[cfg(test)]
mod tests;
