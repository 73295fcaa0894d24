//! SQL dialects
//!
//! A dialect knows how one warehouse spells things: identifier quoting and
//! naming rules, the mapping from [`AirbyteType`] to column types, JSON
//! extraction with null-on-failure casts, and the statements behind an
//! atomic table swap. Planning code is written once against [`SqlDialect`];
//! adding a warehouse means adding an implementation here and a
//! [`DestinationDriver`](crate::destination::DestinationDriver).

mod duckdb;

pub use self::duckdb::DuckDbDialect;

use crate::naming::{ColumnId, NamingConvention, TableRef};
use crate::schema::AirbyteType;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Debug;

/// Error code recorded in `_airbyte_meta` for a failed cast
pub const TYPECAST_ERROR: &str = "DESTINATION_TYPECAST_ERROR";

/// Dialect-specific SQL fragments
pub trait SqlDialect: Debug + Send + Sync {
    /// Short dialect name for logs
    fn name(&self) -> &'static str;

    /// Identifier normalization rules
    fn naming(&self) -> NamingConvention;

    /// Column type for an abstract type
    fn to_dialect_type(&self, ty: &AirbyteType) -> String;

    /// Column type of `_airbyte_raw_id`
    fn string_type(&self) -> &'static str;

    /// Column type of `_airbyte_extracted_at` and `_airbyte_loaded_at`
    fn timestamp_type(&self) -> &'static str;

    /// Column type of `_airbyte_data` and `_airbyte_meta`
    fn json_type(&self) -> &'static str;

    /// Canonical spelling of an introspected type name, for comparisons
    fn canonical_type_name(&self, type_name: &str) -> String {
        type_name.trim().to_uppercase()
    }

    /// Whether an introspected column type matches the expected one
    fn types_match(&self, expected: &str, actual: &str) -> bool {
        self.canonical_type_name(expected) == self.canonical_type_name(actual)
    }

    /// Quote an identifier (always applied, never conditional)
    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Fully qualified, quoted table name
    fn table(&self, table: &TableRef) -> String {
        format!("{}.{}", self.quote(&table.namespace), self.quote(&table.name))
    }

    /// Quote a string literal
    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Timestamp literal
    fn timestamp_literal(&self, ts: DateTime<Utc>) -> String {
        format!(
            "CAST({} AS {})",
            self.string_literal(&ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            self.timestamp_type()
        )
    }

    /// Expression for the current time
    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Typed value of a declared field read from `_airbyte_data`, NULL when the cast fails
    fn extract_and_cast(&self, column: &ColumnId, ty: &AirbyteType) -> String;

    /// Predicate: the field is present in `_airbyte_data` and not JSON null
    fn field_is_set(&self, column: &ColumnId) -> String;

    /// Predicate on the raw blob: the deletion marker is set (non-null and not false)
    fn raw_deletion_marker_is_set(&self, column: &ColumnId) -> String;

    /// `_airbyte_meta` value built from `(original field name, failure predicate)` pairs
    fn meta_expression(&self, failures: &[(String, String)]) -> String;

    /// Statements replacing `production` with `staging` in one transaction
    fn swap_statements(&self, staging: &TableRef, production: &TableRef) -> Vec<String> {
        vec![
            format!("DROP TABLE IF EXISTS {}", self.table(production)),
            format!(
                "ALTER TABLE {} RENAME TO {}",
                self.table(staging),
                self.quote(&production.name)
            ),
        ]
    }
}
