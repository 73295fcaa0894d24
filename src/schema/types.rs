//! Abstract type model

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Boolean,
    Integer,
    Number,
    Date,
    TimeWithTimezone,
    TimeWithoutTimezone,
    TimestampWithTimezone,
    TimestampWithoutTimezone,
    /// Unrepresentable or ambiguous source type, stored opaquely as JSON
    Unknown,
}

impl PrimitiveKind {
    /// All primitive kinds
    pub const ALL: [PrimitiveKind; 10] = [
        PrimitiveKind::String,
        PrimitiveKind::Boolean,
        PrimitiveKind::Integer,
        PrimitiveKind::Number,
        PrimitiveKind::Date,
        PrimitiveKind::TimeWithTimezone,
        PrimitiveKind::TimeWithoutTimezone,
        PrimitiveKind::TimestampWithTimezone,
        PrimitiveKind::TimestampWithoutTimezone,
        PrimitiveKind::Unknown,
    ];

    /// Upper-case name used in plans and logs
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::String => "STRING",
            PrimitiveKind::Boolean => "BOOLEAN",
            PrimitiveKind::Integer => "INTEGER",
            PrimitiveKind::Number => "NUMBER",
            PrimitiveKind::Date => "DATE",
            PrimitiveKind::TimeWithTimezone => "TIME_WITH_TIMEZONE",
            PrimitiveKind::TimeWithoutTimezone => "TIME_WITHOUT_TIMEZONE",
            PrimitiveKind::TimestampWithTimezone => "TIMESTAMP_WITH_TIMEZONE",
            PrimitiveKind::TimestampWithoutTimezone => "TIMESTAMP_WITHOUT_TIMEZONE",
            PrimitiveKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered struct fields with unique names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructType {
    fields: Vec<(String, AirbyteType)>,
}

impl StructType {
    /// Create an empty struct
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a struct from fields in declaration order, rejecting duplicate names
    pub fn from_fields(fields: Vec<(String, AirbyteType)>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (name, _) in &fields {
            if !seen.insert(name.as_str()) {
                return Err(Error::config(format!("Duplicate struct field '{name}'")));
            }
        }
        Ok(Self { fields })
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[(String, AirbyteType)] {
        &self.fields
    }

    /// Look up a field type by name
    pub fn get(&self, name: &str) -> Option<&AirbyteType> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| ty)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the struct has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An abstract value type
///
/// Values are immutable and compared structurally, so a type can be shared
/// freely between concurrently processed streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AirbyteType {
    Primitive(PrimitiveKind),
    Struct(StructType),
    Array(Box<AirbyteType>),
}

impl AirbyteType {
    pub const STRING: AirbyteType = AirbyteType::Primitive(PrimitiveKind::String);
    pub const BOOLEAN: AirbyteType = AirbyteType::Primitive(PrimitiveKind::Boolean);
    pub const INTEGER: AirbyteType = AirbyteType::Primitive(PrimitiveKind::Integer);
    pub const NUMBER: AirbyteType = AirbyteType::Primitive(PrimitiveKind::Number);
    pub const DATE: AirbyteType = AirbyteType::Primitive(PrimitiveKind::Date);
    pub const TIME_WITH_TZ: AirbyteType = AirbyteType::Primitive(PrimitiveKind::TimeWithTimezone);
    pub const TIME_WITHOUT_TZ: AirbyteType =
        AirbyteType::Primitive(PrimitiveKind::TimeWithoutTimezone);
    pub const TIMESTAMP_WITH_TZ: AirbyteType =
        AirbyteType::Primitive(PrimitiveKind::TimestampWithTimezone);
    pub const TIMESTAMP_WITHOUT_TZ: AirbyteType =
        AirbyteType::Primitive(PrimitiveKind::TimestampWithoutTimezone);
    pub const UNKNOWN: AirbyteType = AirbyteType::Primitive(PrimitiveKind::Unknown);

    /// Create an array type
    pub fn array(element: AirbyteType) -> Self {
        AirbyteType::Array(Box::new(element))
    }

    /// Create a struct type from fields
    pub fn structure(fields: Vec<(String, AirbyteType)>) -> Result<Self> {
        StructType::from_fields(fields).map(AirbyteType::Struct)
    }

    /// The primitive kind, if this is a primitive
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            AirbyteType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Whether the destination stores this type as an opaque JSON document
    pub fn is_opaque(&self) -> bool {
        !matches!(self, AirbyteType::Primitive(kind) if *kind != PrimitiveKind::Unknown)
    }

    /// Precedence used when a schema declares several candidate types (lower wins)
    pub(crate) fn union_rank(&self) -> u8 {
        match self {
            AirbyteType::Struct(_) => 0,
            AirbyteType::Array(_) => 1,
            AirbyteType::Primitive(kind) => match kind {
                PrimitiveKind::String => 2,
                PrimitiveKind::TimestampWithTimezone => 3,
                PrimitiveKind::TimestampWithoutTimezone => 4,
                PrimitiveKind::TimeWithTimezone => 5,
                PrimitiveKind::TimeWithoutTimezone => 6,
                PrimitiveKind::Date => 7,
                PrimitiveKind::Number => 8,
                PrimitiveKind::Integer => 9,
                PrimitiveKind::Boolean => 10,
                PrimitiveKind::Unknown => 11,
            },
        }
    }
}

impl fmt::Display for AirbyteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirbyteType::Primitive(kind) => write!(f, "{kind}"),
            AirbyteType::Array(element) => write!(f, "ARRAY<{element}>"),
            AirbyteType::Struct(fields) => {
                write!(f, "STRUCT<")?;
                for (i, (name, ty)) in fields.fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, ">")
            }
        }
    }
}
