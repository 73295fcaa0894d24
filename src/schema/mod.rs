//! Type model
//!
//! Abstract value types for stream columns, independent of any destination.
//!
//! # Features
//!
//! - **Primitive kinds**: string, boolean, integer, number, date, time and
//!   timestamp (with and without timezone), and the opaque `UNKNOWN`
//! - **Structs**: ordered, duplicate-free field lists
//! - **Arrays**: a single element type
//! - **JSON schema parsing**: `type` arrays, `format`/`airbyte_type` hints,
//!   well-known `$ref` types, and precedence-based union resolution

mod parser;
mod types;

pub use parser::{from_json_schema, parse_stream_schema};
pub use types::{AirbyteType, PrimitiveKind, StructType};

#[cfg(test)]
mod tests;
