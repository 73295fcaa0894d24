//! Catalog tests

use super::*;
use crate::error::Error;
use crate::naming::{CaseFolding, ColumnId, IdentifierResolver, NamingConvention};
use crate::schema::AirbyteType;
use crate::types::{DestinationSyncMode, SyncMode};
use pretty_assertions::assert_eq;
use std::io::Write;

fn parser() -> CatalogParser {
    let naming = NamingConvention {
        case_folding: CaseFolding::Lower,
        ..NamingConvention::default()
    };
    CatalogParser::new(IdentifierResolver::new(naming, "airbyte_internal", "main"))
}

const USERS_CATALOG: &str = r#"
streams:
  - stream:
      name: users
      namespace: crm
      json_schema:
        type: object
        properties:
          id: { type: integer }
          updated_at: { type: string, format: date-time }
          Name: { type: [ "null", "string" ] }
          _ab_cdc_deleted_at: { type: [ "null", "string" ], format: date-time }
    sync_mode: incremental
    destination_sync_mode: append_dedup
    primary_key: [[id]]
    cursor_field: [updated_at]
"#;

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_catalog_from_yaml() {
    let catalog = load_catalog_from_str(USERS_CATALOG).unwrap();
    assert_eq!(catalog.streams.len(), 1);
    let stream = &catalog.streams[0];
    assert_eq!(stream.stream.name, "users");
    assert_eq!(stream.stream.namespace.as_deref(), Some("crm"));
    assert_eq!(stream.destination_sync_mode, DestinationSyncMode::AppendDedup);
    assert_eq!(stream.primary_key, Some(vec![vec!["id".to_string()]]));
}

#[test]
fn test_load_catalog_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"streams": [{{"stream": {{"name": "events", "json_schema": {{"type": "object", "properties": {{}}}}}}, "destination_sync_mode": "append"}}]}}"#
    )
    .unwrap();

    let catalog = load_catalog(file.path()).unwrap();
    assert_eq!(catalog.streams[0].stream.name, "events");
    assert_eq!(catalog.streams[0].sync_mode, SyncMode::FullRefresh);
}

#[test]
fn test_load_catalog_missing_file() {
    let err = load_catalog("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}

#[test]
fn test_load_catalog_invalid_yaml() {
    let err = load_catalog_from_str("streams: [").unwrap_err();
    assert!(err.is_config());
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_stream_config() {
    let catalog = load_catalog_from_str(USERS_CATALOG).unwrap();
    let parsed = parser().parse(&catalog).unwrap();
    let users = parsed.get(Some("crm"), "users").unwrap();

    assert_eq!(users.id().final_namespace, "crm");
    assert_eq!(users.id().raw_name, "crm_raw__stream_users");
    assert!(users.is_dedup());
    assert_eq!(users.sync_mode(), SyncMode::Incremental);

    let names: Vec<&str> = users.columns().keys().map(ColumnId::name).collect();
    assert_eq!(names, vec!["id", "updated_at", "name", "_ab_cdc_deleted_at"]);
    assert_eq!(users.primary_key()[0].name(), "id");
    assert_eq!(users.cursor().unwrap().name(), "updated_at");
    assert_eq!(users.deletion_marker().unwrap().name(), "_ab_cdc_deleted_at");
    assert_eq!(
        users.columns().get(users.cursor().unwrap()),
        Some(&AirbyteType::TIMESTAMP_WITH_TZ)
    );
    assert_eq!(users.columns().get_index(2).unwrap().0.original_name, "Name");

    assert!(parsed.find("crm.users").is_ok());
    assert!(parsed.find("users").is_ok());
    assert!(matches!(
        parsed.find("orders"),
        Err(Error::StreamNotFound { .. })
    ));
}

#[test]
fn test_dedup_without_primary_key_rejected() {
    let yaml = USERS_CATALOG.replace("    primary_key: [[id]]\n", "");
    let catalog = load_catalog_from_str(&yaml).unwrap();
    let err = parser().parse(&catalog).unwrap_err();
    assert!(matches!(err, Error::MissingPrimaryKey { .. }));
    assert!(err.is_config());
}

#[test]
fn test_duplicate_primary_key_rejected() {
    let yaml = USERS_CATALOG.replace("[[id]]", "[[id], [id]]");
    let catalog = load_catalog_from_str(&yaml).unwrap();
    let err = parser().parse(&catalog).unwrap_err();
    assert!(matches!(err, Error::DuplicatePrimaryKey { ref column, .. } if column == "id"));
}

#[test]
fn test_unknown_cursor_rejected() {
    let yaml = USERS_CATALOG.replace("cursor_field: [updated_at]", "cursor_field: [modified]");
    let catalog = load_catalog_from_str(&yaml).unwrap();
    let err = parser().parse(&catalog).unwrap_err();
    assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "modified"));
}

#[test]
fn test_nested_primary_key_rejected() {
    let yaml = USERS_CATALOG.replace("[[id]]", "[[id, nested]]");
    let catalog = load_catalog_from_str(&yaml).unwrap();
    let err = parser().parse(&catalog).unwrap_err();
    assert!(matches!(err, Error::InvalidSchema { .. }));
}

#[test]
fn test_append_without_primary_key_allowed() {
    let yaml = USERS_CATALOG
        .replace("append_dedup", "append")
        .replace("    primary_key: [[id]]\n", "");
    let catalog = load_catalog_from_str(&yaml).unwrap();
    let parsed = parser().parse(&catalog).unwrap();
    assert!(parsed.streams[0].primary_key().is_empty());
}

#[test]
fn test_streams_sharing_final_table_rejected() {
    let yaml = r#"
streams:
  - stream: { name: Users, json_schema: { type: object, properties: {} } }
  - stream: { name: users, json_schema: { type: object, properties: {} } }
"#;
    let catalog = load_catalog_from_str(yaml).unwrap();
    let err = parser().parse(&catalog).unwrap_err();
    assert!(err.to_string().contains("both map to final table main.users"));
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_builder_rejects_unknown_primary_key() {
    let id = crate::naming::IdentifierResolver::new(NamingConvention::default(), "raw", "main")
        .resolve_stream(None, "s");
    let err = StreamConfig::builder(id)
        .destination_sync_mode(DestinationSyncMode::AppendDedup)
        .column(ColumnId::new("a", "a", "a"), AirbyteType::INTEGER)
        .primary_key(vec![ColumnId::new("b", "b", "b")])
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::UnknownColumn { .. }));
}

#[test]
fn test_builder_rejects_duplicate_canonical_names() {
    let id = IdentifierResolver::new(NamingConvention::default(), "raw", "main")
        .resolve_stream(None, "s");
    let err = StreamConfig::builder(id)
        .column(ColumnId::new("Name", "name", "Name"), AirbyteType::STRING)
        .column(ColumnId::new("name", "name", "name"), AirbyteType::INTEGER)
        .build()
        .unwrap_err();

    assert!(err.is_config());
    let Error::InvalidSchema { stream, message } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(stream, "s");
    assert!(message.contains("'name'"), "{message}");
}
