//! JSON schema to `AirbyteType` conversion

use super::types::{AirbyteType, PrimitiveKind, StructType};
use crate::error::{Error, Result};
use serde_json::Value;

const WELL_KNOWN_PREFIX: &str = "WellKnownTypes.json#/definitions/";

/// Convert a JSON schema node into an `AirbyteType`
///
/// Never fails: anything that cannot be represented becomes `UNKNOWN`.
pub fn from_json_schema(schema: &Value) -> AirbyteType {
    let Value::Object(node) = schema else {
        return AirbyteType::UNKNOWN;
    };

    if node.contains_key("oneOf") || node.contains_key("anyOf") {
        return AirbyteType::UNKNOWN;
    }

    if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
        return from_well_known_ref(reference);
    }

    let declared: Vec<&str> = match node.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        Some(_) => return AirbyteType::UNKNOWN,
        None => {
            if node.contains_key("properties") {
                vec!["object"]
            } else if node.contains_key("items") {
                vec!["array"]
            } else {
                return AirbyteType::UNKNOWN;
            }
        }
    };

    let candidates: Vec<AirbyteType> = declared
        .into_iter()
        .filter(|t| *t != "null")
        .map(|t| from_type_name(t, schema))
        .collect();

    choose_type(candidates)
}

/// Parse a stream's top-level schema into its ordered columns
pub fn parse_stream_schema(stream: &str, schema: &Value) -> Result<StructType> {
    match from_json_schema(schema) {
        AirbyteType::Struct(fields) => Ok(fields),
        other if schema.as_object().is_some_and(serde_json::Map::is_empty) => {
            tracing::debug!("Stream {} has an empty schema ({})", stream, other);
            Ok(StructType::new())
        }
        other => Err(Error::invalid_schema(
            stream,
            format!("top-level schema must be an object, found {other}"),
        )),
    }
}

fn from_type_name(type_name: &str, schema: &Value) -> AirbyteType {
    let format = schema.get("format").and_then(Value::as_str);
    let airbyte_type = schema.get("airbyte_type").and_then(Value::as_str);

    match type_name {
        "string" => match (format, airbyte_type) {
            (Some("date"), _) => AirbyteType::DATE,
            (Some("time"), Some("time_without_timezone")) => AirbyteType::TIME_WITHOUT_TZ,
            (Some("time"), _) => AirbyteType::TIME_WITH_TZ,
            (Some("date-time"), Some("timestamp_without_timezone")) => {
                AirbyteType::TIMESTAMP_WITHOUT_TZ
            }
            (Some("date-time"), _) => AirbyteType::TIMESTAMP_WITH_TZ,
            _ => AirbyteType::STRING,
        },
        "integer" => AirbyteType::INTEGER,
        "number" => {
            if airbyte_type == Some("integer") {
                AirbyteType::INTEGER
            } else {
                AirbyteType::NUMBER
            }
        }
        "boolean" => AirbyteType::BOOLEAN,
        "object" => from_object_schema(schema),
        "array" => {
            let element = schema
                .get("items")
                .map_or(AirbyteType::UNKNOWN, from_json_schema);
            AirbyteType::array(element)
        }
        _ => AirbyteType::UNKNOWN,
    }
}

fn from_object_schema(schema: &Value) -> AirbyteType {
    let Some(Value::Object(properties)) = schema.get("properties") else {
        return AirbyteType::Struct(StructType::new());
    };

    let fields: Vec<(String, AirbyteType)> = properties
        .iter()
        .map(|(name, property)| (name.clone(), from_json_schema(property)))
        .collect();

    // JSON object keys are unique, so this cannot fail
    StructType::from_fields(fields).map_or(AirbyteType::UNKNOWN, AirbyteType::Struct)
}

fn from_well_known_ref(reference: &str) -> AirbyteType {
    let Some(name) = reference.strip_prefix(WELL_KNOWN_PREFIX) else {
        return AirbyteType::UNKNOWN;
    };
    match name {
        "String" | "BinaryData" => AirbyteType::STRING,
        "Boolean" => AirbyteType::BOOLEAN,
        "Date" => AirbyteType::DATE,
        "TimestampWithTimezone" => AirbyteType::TIMESTAMP_WITH_TZ,
        "TimestampWithoutTimezone" => AirbyteType::TIMESTAMP_WITHOUT_TZ,
        "TimeWithTimezone" => AirbyteType::TIME_WITH_TZ,
        "TimeWithoutTimezone" => AirbyteType::TIME_WITHOUT_TZ,
        "Number" => AirbyteType::NUMBER,
        "Integer" => AirbyteType::INTEGER,
        _ => AirbyteType::Primitive(PrimitiveKind::Unknown),
    }
}

/// Pick one type out of several candidates by precedence
fn choose_type(candidates: Vec<AirbyteType>) -> AirbyteType {
    candidates
        .into_iter()
        .min_by_key(AirbyteType::union_rank)
        .unwrap_or(AirbyteType::UNKNOWN)
}
