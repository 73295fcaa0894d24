//! Differ types

use crate::naming::ColumnId;
use crate::state::StreamDestinationState;
use crate::types::DestinationSyncMode;
use indexmap::IndexMap;

/// An introspected column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    /// Type as reported by the destination
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// An introspected table, columns in ordinal order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinition {
    pub columns: IndexMap<String, ColumnDefinition>,
}

impl TableDefinition {
    /// Build from columns in ordinal order
    pub fn new(columns: impl IntoIterator<Item = ColumnDefinition>) -> Self {
        Self {
            columns: columns.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.get(name)
    }
}

/// Keys and mode a final table was last typed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedKeys {
    pub primary_key: Vec<String>,
    pub cursor: Option<String>,
    pub destination_sync_mode: DestinationSyncMode,
}

impl RecordedKeys {
    /// Extract recorded keys from destination state, if any were recorded
    pub fn from_state(state: &StreamDestinationState) -> Option<Self> {
        Some(Self {
            primary_key: state.primary_key.clone().unwrap_or_default(),
            cursor: state.cursor.clone(),
            destination_sync_mode: state.destination_sync_mode?,
        })
    }
}

/// What the destination currently holds for a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingTable {
    pub definition: TableDefinition,
    pub recorded: Option<RecordedKeys>,
}

/// Difference between a stream's desired and existing final table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDiff {
    /// No final table exists
    Absent,
    /// The table can be brought up to date by adding these columns (possibly none)
    Additive(Vec<ColumnId>),
    /// The table cannot be evolved in place
    Incompatible(String),
}

impl SchemaDiff {
    /// Whether the existing table already matches
    pub fn is_unchanged(&self) -> bool {
        matches!(self, SchemaDiff::Additive(columns) if columns.is_empty())
    }
}
