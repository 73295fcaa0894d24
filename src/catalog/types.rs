//! Catalog types
//!
//! The configured catalog is the serialized input; `StreamConfig` is the
//! validated, immutable form every planning component works with.

use crate::error::{Error, Result};
use crate::naming::{ColumnId, StreamId};
use crate::schema::AirbyteType;
use crate::types::{DestinationSyncMode, JsonValue, SyncMode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Original name of the conventional CDC deletion marker column
pub const CDC_DELETED_AT: &str = "_ab_cdc_deleted_at";

// ============================================================================
// Configured Catalog (input)
// ============================================================================

/// Configured catalog (selected streams for sync)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    /// Selected streams
    pub streams: Vec<ConfiguredStream>,
}

/// Stream in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStream {
    /// Stream name
    pub name: String,

    /// Source namespace
    #[serde(default)]
    pub namespace: Option<String>,

    /// JSON schema for the stream
    #[serde(default)]
    pub json_schema: JsonValue,
}

/// Configured stream for sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredStream {
    /// Stream reference
    pub stream: CatalogStream,

    /// Selected sync mode
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Destination sync mode
    #[serde(default)]
    pub destination_sync_mode: DestinationSyncMode,

    /// Cursor field to use
    #[serde(default)]
    pub cursor_field: Option<Vec<String>>,

    /// Primary key to use
    #[serde(default)]
    pub primary_key: Option<Vec<Vec<String>>>,
}

// ============================================================================
// Stream Config (validated)
// ============================================================================

/// A stream's desired destination shape
///
/// Built only through [`StreamConfigBuilder`], which enforces that
/// `append_dedup` has a primary key, that primary key columns are distinct,
/// and that every referenced column is declared.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    id: StreamId,
    sync_mode: SyncMode,
    destination_sync_mode: DestinationSyncMode,
    primary_key: Vec<ColumnId>,
    cursor: Option<ColumnId>,
    columns: IndexMap<ColumnId, AirbyteType>,
    deletion_marker: Option<ColumnId>,
}

impl StreamConfig {
    /// Start building a stream config
    pub fn builder(id: StreamId) -> StreamConfigBuilder {
        StreamConfigBuilder::new(id)
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    pub fn destination_sync_mode(&self) -> DestinationSyncMode {
        self.destination_sync_mode
    }

    pub fn primary_key(&self) -> &[ColumnId] {
        &self.primary_key
    }

    pub fn cursor(&self) -> Option<&ColumnId> {
        self.cursor.as_ref()
    }

    /// Declared columns in order
    pub fn columns(&self) -> &IndexMap<ColumnId, AirbyteType> {
        &self.columns
    }

    /// Column whose truthy value marks a CDC delete
    pub fn deletion_marker(&self) -> Option<&ColumnId> {
        self.deletion_marker.as_ref()
    }

    /// Whether typing deduplicates by primary key
    pub fn is_dedup(&self) -> bool {
        self.destination_sync_mode.is_dedup()
    }
}

/// Builder for [`StreamConfig`]
#[derive(Debug, Clone)]
pub struct StreamConfigBuilder {
    id: StreamId,
    sync_mode: SyncMode,
    destination_sync_mode: DestinationSyncMode,
    primary_key: Vec<ColumnId>,
    cursor: Option<ColumnId>,
    columns: IndexMap<ColumnId, AirbyteType>,
    deletion_marker: Option<ColumnId>,
}

impl StreamConfigBuilder {
    fn new(id: StreamId) -> Self {
        Self {
            id,
            sync_mode: SyncMode::default(),
            destination_sync_mode: DestinationSyncMode::default(),
            primary_key: Vec::new(),
            cursor: None,
            columns: IndexMap::new(),
            deletion_marker: None,
        }
    }

    #[must_use]
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    #[must_use]
    pub fn destination_sync_mode(mut self, mode: DestinationSyncMode) -> Self {
        self.destination_sync_mode = mode;
        self
    }

    /// Append a declared column
    #[must_use]
    pub fn column(mut self, id: ColumnId, ty: AirbyteType) -> Self {
        self.columns.insert(id, ty);
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = (ColumnId, AirbyteType)>) -> Self {
        self.columns.extend(columns);
        self
    }

    #[must_use]
    pub fn primary_key(mut self, pk: Vec<ColumnId>) -> Self {
        self.primary_key = pk;
        self
    }

    #[must_use]
    pub fn cursor(mut self, cursor: Option<ColumnId>) -> Self {
        self.cursor = cursor;
        self
    }

    #[must_use]
    pub fn deletion_marker(mut self, marker: Option<ColumnId>) -> Self {
        self.deletion_marker = marker;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<StreamConfig> {
        let stream = self.id.to_string();

        if self.destination_sync_mode.is_dedup() && self.primary_key.is_empty() {
            return Err(Error::MissingPrimaryKey { stream });
        }

        let mut names = HashSet::new();
        for column in self.columns.keys() {
            if !names.insert(column.canonical_name.as_str()) {
                return Err(Error::invalid_schema(
                    stream,
                    format!(
                        "column '{}' resolves to '{}', which is already taken",
                        column.original_name, column.canonical_name
                    ),
                ));
            }
        }

        let mut seen = HashSet::new();
        for column in &self.primary_key {
            if !seen.insert(&column.canonical_name) {
                return Err(Error::DuplicatePrimaryKey {
                    stream,
                    column: column.original_name.clone(),
                });
            }
        }

        let referenced = self
            .primary_key
            .iter()
            .chain(self.cursor.iter())
            .chain(self.deletion_marker.iter());
        for column in referenced {
            if !self.columns.contains_key(column) {
                return Err(Error::UnknownColumn {
                    stream,
                    column: column.original_name.clone(),
                });
            }
        }

        Ok(StreamConfig {
            id: self.id,
            sync_mode: self.sync_mode,
            destination_sync_mode: self.destination_sync_mode,
            primary_key: self.primary_key,
            cursor: self.cursor,
            columns: self.columns,
            deletion_marker: self.deletion_marker,
        })
    }
}

// ============================================================================
// Parsed Catalog
// ============================================================================

/// All validated streams of a configured catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCatalog {
    pub streams: Vec<StreamConfig>,
}

impl ParsedCatalog {
    /// Find a stream by source namespace and name
    pub fn get(&self, namespace: Option<&str>, name: &str) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| {
            s.id().original_name == name && s.id().original_namespace.as_deref() == namespace
        })
    }

    /// Find a stream by source name, or `namespace.name`
    pub fn find(&self, name: &str) -> Result<&StreamConfig> {
        self.streams
            .iter()
            .find(|s| s.id().original_name == name || s.id().to_string() == name)
            .ok_or_else(|| Error::StreamNotFound {
                stream: name.to_string(),
            })
    }
}
