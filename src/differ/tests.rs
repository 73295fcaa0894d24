//! Schema differ tests

use super::*;
use crate::catalog::StreamConfig;
use crate::dialect::DuckDbDialect;
use crate::naming::{ColumnId, StreamId};
use crate::schema::AirbyteType;
use crate::types::DestinationSyncMode;
use pretty_assertions::assert_eq;

fn col(name: &str) -> ColumnId {
    ColumnId::new(name, name, name)
}

fn stream_id() -> StreamId {
    StreamId {
        original_namespace: None,
        original_name: "users".to_string(),
        raw_namespace: "airbyte_internal".to_string(),
        raw_name: "main_raw__stream_users".to_string(),
        final_namespace: "main".to_string(),
        final_name: "users".to_string(),
    }
}

fn desired(mode: DestinationSyncMode) -> StreamConfig {
    StreamConfig::builder(stream_id())
        .destination_sync_mode(mode)
        .column(col("id"), AirbyteType::INTEGER)
        .column(col("name"), AirbyteType::STRING)
        .column(col("updated_at"), AirbyteType::TIMESTAMP_WITH_TZ)
        .primary_key(vec![col("id")])
        .cursor(Some(col("updated_at")))
        .build()
        .unwrap()
}

fn system_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("_airbyte_raw_id", "VARCHAR", false),
        ColumnDefinition::new("_airbyte_extracted_at", "TIMESTAMP WITH TIME ZONE", false),
        ColumnDefinition::new("_airbyte_meta", "JSON", false),
    ]
}

fn existing(columns: Vec<ColumnDefinition>, recorded: Option<RecordedKeys>) -> ExistingTable {
    let mut all = system_columns();
    all.extend(columns);
    ExistingTable {
        definition: TableDefinition::new(all),
        recorded,
    }
}

fn dedup_keys() -> RecordedKeys {
    RecordedKeys {
        primary_key: vec!["id".to_string()],
        cursor: Some("updated_at".to_string()),
        destination_sync_mode: DestinationSyncMode::AppendDedup,
    }
}

fn diff_of(config: &StreamConfig, table: Option<&ExistingTable>) -> SchemaDiff {
    diff(&DuckDbDialect::new(), config, table)
}

#[test]
fn test_absent_table() {
    assert_eq!(diff_of(&desired(DestinationSyncMode::Append), None), SchemaDiff::Absent);
}

#[test]
fn test_identical_table_is_unchanged() {
    let table = existing(
        vec![
            ColumnDefinition::new("id", "BIGINT", true),
            ColumnDefinition::new("name", "VARCHAR", true),
            ColumnDefinition::new("updated_at", "TIMESTAMP WITH TIME ZONE", true),
        ],
        Some(dedup_keys()),
    );
    let result = diff_of(&desired(DestinationSyncMode::AppendDedup), Some(&table));
    assert!(result.is_unchanged());
}

#[test]
fn test_new_columns_are_additive() {
    let table = existing(vec![ColumnDefinition::new("id", "BIGINT", true)], None);
    let result = diff_of(&desired(DestinationSyncMode::Append), Some(&table));
    assert_eq!(
        result,
        SchemaDiff::Additive(vec![col("name"), col("updated_at")])
    );
    assert!(!result.is_unchanged());
}

#[test]
fn test_changed_type_is_incompatible() {
    let table = existing(vec![ColumnDefinition::new("id", "VARCHAR", true)], None);
    let result = diff_of(&desired(DestinationSyncMode::Append), Some(&table));
    assert!(matches!(result, SchemaDiff::Incompatible(reason) if reason.contains("changed type")));
}

#[test]
fn test_removed_column_is_incompatible() {
    let table = existing(
        vec![
            ColumnDefinition::new("id", "BIGINT", true),
            ColumnDefinition::new("legacy", "VARCHAR", true),
        ],
        None,
    );
    let result = diff_of(&desired(DestinationSyncMode::Append), Some(&table));
    assert!(matches!(result, SchemaDiff::Incompatible(reason) if reason.contains("legacy")));
}

#[test]
fn test_not_null_user_column_is_incompatible() {
    let table = existing(vec![ColumnDefinition::new("id", "BIGINT", false)], None);
    let result = diff_of(&desired(DestinationSyncMode::Append), Some(&table));
    assert!(matches!(result, SchemaDiff::Incompatible(_)));
}

#[test]
fn test_missing_system_column_is_incompatible() {
    let table = ExistingTable {
        definition: TableDefinition::new(vec![
            ColumnDefinition::new("_airbyte_raw_id", "VARCHAR", false),
            ColumnDefinition::new("id", "BIGINT", true),
        ]),
        recorded: None,
    };
    let result = diff_of(&desired(DestinationSyncMode::Append), Some(&table));
    assert!(
        matches!(result, SchemaDiff::Incompatible(reason) if reason.contains("_airbyte_extracted_at"))
    );
}

#[test]
fn test_mistyped_system_column_is_incompatible() {
    let table = ExistingTable {
        definition: TableDefinition::new(vec![
            ColumnDefinition::new("_airbyte_raw_id", "VARCHAR", false),
            ColumnDefinition::new("_airbyte_extracted_at", "TIMESTAMP", false),
            ColumnDefinition::new("_airbyte_meta", "JSON", false),
        ]),
        recorded: None,
    };
    let result = diff_of(&desired(DestinationSyncMode::Append), Some(&table));
    assert!(matches!(result, SchemaDiff::Incompatible(_)));
}

#[test]
fn test_changed_primary_key_is_incompatible() {
    let table = existing(vec![ColumnDefinition::new("id", "BIGINT", true)], {
        let mut keys = dedup_keys();
        keys.primary_key = vec!["name".to_string()];
        Some(keys)
    });
    let result = diff_of(&desired(DestinationSyncMode::AppendDedup), Some(&table));
    assert!(matches!(result, SchemaDiff::Incompatible(reason) if reason.contains("primary key")));
}

#[test]
fn test_changed_cursor_is_incompatible() {
    let table = existing(vec![], {
        let mut keys = dedup_keys();
        keys.cursor = None;
        Some(keys)
    });
    let result = diff_of(&desired(DestinationSyncMode::AppendDedup), Some(&table));
    assert!(matches!(result, SchemaDiff::Incompatible(reason) if reason.contains("cursor")));
}

#[test]
fn test_switch_to_dedup_is_incompatible() {
    let table = existing(vec![], {
        let mut keys = dedup_keys();
        keys.destination_sync_mode = DestinationSyncMode::Append;
        Some(keys)
    });
    let result = diff_of(&desired(DestinationSyncMode::AppendDedup), Some(&table));
    assert!(matches!(result, SchemaDiff::Incompatible(reason) if reason.contains("sync mode")));
}

#[test]
fn test_key_changes_ignored_outside_dedup() {
    let table = existing(vec![], {
        let mut keys = dedup_keys();
        keys.primary_key = vec!["other".to_string()];
        Some(keys)
    });
    let result = diff_of(&desired(DestinationSyncMode::Append), Some(&table));
    assert!(matches!(result, SchemaDiff::Additive(_)));
}

#[test]
fn test_recorded_keys_from_state() {
    let mut state = crate::state::StreamDestinationState::new();
    assert_eq!(RecordedKeys::from_state(&state), None);

    state.record_config(&desired(DestinationSyncMode::AppendDedup));
    assert_eq!(RecordedKeys::from_state(&state), Some(dedup_keys()));
}
