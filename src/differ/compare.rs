//! Schema comparison

use super::types::{ExistingTable, SchemaDiff};
use crate::catalog::StreamConfig;
use crate::dialect::SqlDialect;
use crate::naming::{COLUMN_EXTRACTED_AT, COLUMN_META, COLUMN_RAW_ID};
use crate::types::DestinationSyncMode;

/// Classify the change from an existing final table to the desired config
pub fn diff(
    dialect: &dyn SqlDialect,
    desired: &StreamConfig,
    existing: Option<&ExistingTable>,
) -> SchemaDiff {
    let Some(existing) = existing else {
        return SchemaDiff::Absent;
    };

    match find_incompatibility(dialect, desired, existing) {
        Some(reason) => SchemaDiff::Incompatible(reason),
        None => SchemaDiff::Additive(
            desired
                .columns()
                .keys()
                .filter(|c| existing.definition.column(c.name()).is_none())
                .cloned()
                .collect(),
        ),
    }
}

fn find_incompatibility(
    dialect: &dyn SqlDialect,
    desired: &StreamConfig,
    existing: &ExistingTable,
) -> Option<String> {
    let table = &existing.definition;

    let system_columns = [
        (COLUMN_RAW_ID, dialect.string_type()),
        (COLUMN_EXTRACTED_AT, dialect.timestamp_type()),
        (COLUMN_META, dialect.json_type()),
    ];
    for (name, expected) in system_columns {
        match table.column(name) {
            None => return Some(format!("system column {name} is missing")),
            Some(actual) if !dialect.types_match(expected, &actual.type_name) => {
                return Some(format!(
                    "system column {name} has type {}, expected {expected}",
                    actual.type_name
                ));
            }
            Some(_) => {}
        }
    }

    for existing_column in table.columns.values() {
        let name = existing_column.name.as_str();
        if system_columns.iter().any(|(system, _)| *system == name) {
            continue;
        }

        let Some((column, ty)) = desired.columns().iter().find(|(c, _)| c.name() == name) else {
            return Some(format!("column {name} is no longer declared"));
        };

        let expected = dialect.to_dialect_type(ty);
        if !dialect.types_match(&expected, &existing_column.type_name) {
            return Some(format!(
                "column {column} changed type from {} to {expected}",
                existing_column.type_name
            ));
        }
        if !existing_column.nullable {
            return Some(format!("column {column} is NOT NULL"));
        }
    }

    if desired.is_dedup() {
        if let Some(recorded) = &existing.recorded {
            if recorded.destination_sync_mode != DestinationSyncMode::AppendDedup {
                return Some(format!(
                    "destination sync mode changed from {} to {}",
                    recorded.destination_sync_mode,
                    desired.destination_sync_mode()
                ));
            }

            let primary_key: Vec<&str> = desired.primary_key().iter().map(|c| c.name()).collect();
            if recorded.primary_key != primary_key {
                return Some(format!(
                    "primary key changed from {:?} to {primary_key:?}",
                    recorded.primary_key
                ));
            }

            let cursor = desired.cursor().map(|c| c.name().to_string());
            if recorded.cursor != cursor {
                return Some(format!(
                    "cursor changed from {:?} to {cursor:?}",
                    recorded.cursor
                ));
            }
        }
    }

    None
}
