//! Type model tests

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

// ============================================================================
// Primitive parsing
// ============================================================================

#[test_case(json!({"type": "string"}), AirbyteType::STRING ; "plain string")]
#[test_case(json!({"type": "integer"}), AirbyteType::INTEGER ; "integer")]
#[test_case(json!({"type": "number"}), AirbyteType::NUMBER ; "number")]
#[test_case(json!({"type": "number", "airbyte_type": "integer"}), AirbyteType::INTEGER ; "number hinted as integer")]
#[test_case(json!({"type": "boolean"}), AirbyteType::BOOLEAN ; "boolean")]
#[test_case(json!({"type": "string", "format": "date"}), AirbyteType::DATE ; "date")]
#[test_case(json!({"type": "string", "format": "time"}), AirbyteType::TIME_WITH_TZ ; "time defaults to tz")]
#[test_case(json!({"type": "string", "format": "time", "airbyte_type": "time_without_timezone"}), AirbyteType::TIME_WITHOUT_TZ ; "time without tz")]
#[test_case(json!({"type": "string", "format": "date-time"}), AirbyteType::TIMESTAMP_WITH_TZ ; "timestamp defaults to tz")]
#[test_case(json!({"type": "string", "format": "date-time", "airbyte_type": "timestamp_without_timezone"}), AirbyteType::TIMESTAMP_WITHOUT_TZ ; "timestamp without tz")]
#[test_case(json!({"type": ["null", "integer"]}), AirbyteType::INTEGER ; "nullable integer")]
#[test_case(json!({"type": "null"}), AirbyteType::UNKNOWN ; "only null")]
#[test_case(json!({}), AirbyteType::UNKNOWN ; "empty schema")]
#[test_case(json!({"oneOf": [{"type": "string"}, {"type": "integer"}]}), AirbyteType::UNKNOWN ; "one of")]
#[test_case(json!({"type": "geometry"}), AirbyteType::UNKNOWN ; "unknown type name")]
fn test_parse_primitive(schema: serde_json::Value, expected: AirbyteType) {
    assert_eq!(from_json_schema(&schema), expected);
}

#[test_case("String", AirbyteType::STRING)]
#[test_case("BinaryData", AirbyteType::STRING)]
#[test_case("Integer", AirbyteType::INTEGER)]
#[test_case("TimestampWithTimezone", AirbyteType::TIMESTAMP_WITH_TZ)]
#[test_case("TimeWithoutTimezone", AirbyteType::TIME_WITHOUT_TZ)]
#[test_case("Mystery", AirbyteType::UNKNOWN)]
fn test_parse_well_known_ref(name: &str, expected: AirbyteType) {
    let schema = json!({"$ref": format!("WellKnownTypes.json#/definitions/{name}")});
    assert_eq!(from_json_schema(&schema), expected);
}

// ============================================================================
// Unions
// ============================================================================

#[test]
fn test_union_prefers_most_general_type() {
    let schema = json!({"type": ["integer", "string", "null"]});
    assert_eq!(from_json_schema(&schema), AirbyteType::STRING);

    let schema = json!({"type": ["boolean", "number"]});
    assert_eq!(from_json_schema(&schema), AirbyteType::NUMBER);

    let schema = json!({"type": ["array", "object"], "properties": {}});
    assert!(matches!(from_json_schema(&schema), AirbyteType::Struct(_)));
}

// ============================================================================
// Composite types
// ============================================================================

#[test]
fn test_parse_struct_keeps_declaration_order() {
    let schema = json!({
        "type": "object",
        "properties": {
            "zeta": {"type": "string"},
            "alpha": {"type": "integer"},
            "mid": {"type": "object", "properties": {"x": {"type": "boolean"}}}
        }
    });

    let AirbyteType::Struct(fields) = from_json_schema(&schema) else {
        panic!("Expected struct");
    };
    let names: Vec<&str> = fields.fields().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(fields.get("alpha"), Some(&AirbyteType::INTEGER));

    let nested = AirbyteType::structure(vec![("x".to_string(), AirbyteType::BOOLEAN)]).unwrap();
    assert_eq!(fields.get("mid"), Some(&nested));
}

#[test]
fn test_parse_array() {
    let schema = json!({"type": "array", "items": {"type": "string"}});
    assert_eq!(
        from_json_schema(&schema),
        AirbyteType::array(AirbyteType::STRING)
    );

    let schema = json!({"type": "array"});
    assert_eq!(
        from_json_schema(&schema),
        AirbyteType::array(AirbyteType::UNKNOWN)
    );
}

#[test]
fn test_parse_untyped_with_properties_is_struct() {
    let schema = json!({"properties": {"id": {"type": "integer"}}});
    assert!(matches!(from_json_schema(&schema), AirbyteType::Struct(_)));
}

#[test]
fn test_struct_rejects_duplicate_fields() {
    let result = StructType::from_fields(vec![
        ("id".to_string(), AirbyteType::INTEGER),
        ("id".to_string(), AirbyteType::STRING),
    ]);
    assert!(result.is_err());
}

#[test]
fn test_structural_equality() {
    let element = || AirbyteType::structure(vec![("a".into(), AirbyteType::DATE)]).unwrap();
    let a = AirbyteType::array(element());
    let b = AirbyteType::array(element());
    assert_eq!(a, b);
    assert_ne!(a, AirbyteType::array(AirbyteType::DATE));
}

#[test]
fn test_opaque_types() {
    assert!(AirbyteType::UNKNOWN.is_opaque());
    assert!(AirbyteType::array(AirbyteType::STRING).is_opaque());
    assert!(AirbyteType::Struct(StructType::new()).is_opaque());
    assert!(!AirbyteType::INTEGER.is_opaque());
}

#[test]
fn test_display() {
    let ty = AirbyteType::structure(vec![
        ("id".into(), AirbyteType::INTEGER),
        ("tags".into(), AirbyteType::array(AirbyteType::STRING)),
    ])
    .unwrap();
    assert_eq!(ty.to_string(), "STRUCT<id: INTEGER, tags: ARRAY<STRING>>");
}

// ============================================================================
// Stream schemas
// ============================================================================

#[test]
fn test_parse_stream_schema() {
    let schema = json!({
        "type": "object",
        "properties": {"id": {"type": "integer"}, "name": {"type": ["null", "string"]}}
    });
    let columns = parse_stream_schema("users", &schema).unwrap();
    assert_eq!(columns.len(), 2);

    let empty = parse_stream_schema("users", &json!({})).unwrap();
    assert!(empty.is_empty());

    let err = parse_stream_schema("users", &json!({"type": "string"})).unwrap_err();
    assert!(err.to_string().contains("users"));
}
