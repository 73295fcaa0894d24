//! DuckDB dialect

use super::{SqlDialect, TYPECAST_ERROR};
use crate::naming::{CaseFolding, ColumnId, NamingConvention, COLUMN_DATA};
use crate::schema::{AirbyteType, PrimitiveKind};
use serde_json::json;

/// Text accepted as an integer value
const INTEGER_TEXT: &str = r"\s*[+-]?[0-9]+\s*";

/// DuckDB SQL dialect
///
/// DuckDB identifiers are case-insensitive, so names are folded to lower case.
/// Fields are read from `_airbyte_data` with JSON pointer paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbDialect;

impl DuckDbDialect {
    /// Create the dialect
    pub fn new() -> Self {
        Self
    }

    /// JSON pointer literal for a top-level field
    fn path(&self, column: &ColumnId) -> String {
        let escaped = column.original_name.replace('~', "~0").replace('/', "~1");
        self.string_literal(&format!("/{escaped}"))
    }

    fn data(&self) -> String {
        self.quote(COLUMN_DATA)
    }

    fn json_type_of(&self, column: &ColumnId) -> String {
        format!("json_type({}, {})", self.data(), self.path(column))
    }
}

impl SqlDialect for DuckDbDialect {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn naming(&self) -> NamingConvention {
        NamingConvention {
            case_folding: CaseFolding::Lower,
            max_identifier_length: 255,
            replace_invalid_chars: false,
        }
    }

    fn to_dialect_type(&self, ty: &AirbyteType) -> String {
        let name = match ty {
            AirbyteType::Struct(_) | AirbyteType::Array(_) => "JSON",
            AirbyteType::Primitive(kind) => match kind {
                PrimitiveKind::String => "VARCHAR",
                PrimitiveKind::Boolean => "BOOLEAN",
                PrimitiveKind::Integer => "BIGINT",
                PrimitiveKind::Number => "DECIMAL(38, 9)",
                PrimitiveKind::Date => "DATE",
                PrimitiveKind::TimeWithTimezone => "TIMETZ",
                PrimitiveKind::TimeWithoutTimezone => "TIME",
                PrimitiveKind::TimestampWithTimezone => "TIMESTAMPTZ",
                PrimitiveKind::TimestampWithoutTimezone => "TIMESTAMP",
                PrimitiveKind::Unknown => "JSON",
            },
        };
        name.to_string()
    }

    fn string_type(&self) -> &'static str {
        "VARCHAR"
    }

    fn timestamp_type(&self) -> &'static str {
        "TIMESTAMPTZ"
    }

    fn json_type(&self) -> &'static str {
        "JSON"
    }

    fn canonical_type_name(&self, type_name: &str) -> String {
        let upper = type_name.trim().to_uppercase().replace(", ", ",");
        let canonical = match upper.as_str() {
            "TIMESTAMP WITH TIME ZONE" => "TIMESTAMPTZ",
            "TIME WITH TIME ZONE" => "TIMETZ",
            "INT8" | "LONG" | "INT64" => "BIGINT",
            "TEXT" | "STRING" => "VARCHAR",
            "BOOL" => "BOOLEAN",
            "NUMERIC" => "DECIMAL",
            other => other,
        };
        canonical.to_string()
    }

    fn extract_and_cast(&self, column: &ColumnId, ty: &AirbyteType) -> String {
        let data = self.data();
        let path = self.path(column);
        let json_type = self.json_type_of(column);

        match ty {
            AirbyteType::Struct(_) => format!(
                "CASE WHEN {json_type} = 'OBJECT' THEN json_extract({data}, {path}) END"
            ),
            AirbyteType::Array(_) => format!(
                "CASE WHEN {json_type} = 'ARRAY' THEN json_extract({data}, {path}) END"
            ),
            AirbyteType::Primitive(PrimitiveKind::Unknown) => format!(
                "CASE WHEN {json_type} <> 'NULL' THEN json_extract({data}, {path}) END"
            ),
            AirbyteType::Primitive(PrimitiveKind::String) => format!(
                "CASE WHEN {json_type} <> 'NULL' THEN json_extract_string({data}, {path}) END"
            ),
            // DuckDB rounds decimal text when casting to an integer type
            AirbyteType::Primitive(PrimitiveKind::Integer) => {
                let text = format!("json_extract_string({data}, {path})");
                format!(
                    "CASE WHEN {json_type} IN ('UBIGINT', 'BIGINT') \
                     OR ({json_type} = 'VARCHAR' AND regexp_full_match({text}, '{INTEGER_TEXT}')) \
                     THEN TRY_CAST({text} AS BIGINT) END"
                )
            }
            AirbyteType::Primitive(_) => format!(
                "TRY_CAST(json_extract_string({data}, {path}) AS {})",
                self.to_dialect_type(ty)
            ),
        }
    }

    fn field_is_set(&self, column: &ColumnId) -> String {
        format!("COALESCE({} <> 'NULL', FALSE)", self.json_type_of(column))
    }

    fn raw_deletion_marker_is_set(&self, column: &ColumnId) -> String {
        let json_type = self.json_type_of(column);
        let text = format!("json_extract_string({}, {})", self.data(), self.path(column));
        format!(
            "COALESCE({json_type} <> 'NULL' \
             AND NOT ({json_type} = 'BOOLEAN' AND {text} = 'false'), FALSE)"
        )
    }

    fn meta_expression(&self, failures: &[(String, String)]) -> String {
        if failures.is_empty() {
            return "json_object('errors', CAST('[]' AS JSON))".to_string();
        }

        let entries: Vec<String> = failures
            .iter()
            .map(|(field, condition)| {
                let entry = json!({ "field": field, "error": TYPECAST_ERROR }).to_string();
                format!("CASE WHEN {condition} THEN {} END", self.string_literal(&entry))
            })
            .collect();

        format!(
            "json_object('errors', CAST('[' || concat_ws(',', {}) || ']' AS JSON))",
            entries.join(", ")
        )
    }
}
