//! Configured catalog loading and validation

use super::types::{
    ConfiguredCatalog, ConfiguredStream, ParsedCatalog, StreamConfig, CDC_DELETED_AT,
};
use crate::error::{Error, Result};
use crate::naming::{ColumnId, IdentifierResolver};
use crate::schema::parse_stream_schema;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Load a configured catalog from a YAML or JSON file
pub fn load_catalog(path: impl AsRef<Path>) -> Result<ConfiguredCatalog> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::config(format!(
                "Failed to read catalog file '{}': {}",
                path.display(),
                e
            ))
        }
    })?;
    load_catalog_from_str(&content)
}

/// Load a configured catalog from a YAML (or JSON) string
pub fn load_catalog_from_str(content: &str) -> Result<ConfiguredCatalog> {
    serde_yaml::from_str(content)
        .map_err(|e| Error::config(format!("Failed to parse catalog: {e}")))
}

/// Turns a configured catalog into validated stream configs
///
/// Every check happens here, before any destination I/O.
#[derive(Debug, Clone)]
pub struct CatalogParser {
    resolver: IdentifierResolver,
}

impl CatalogParser {
    /// Create a parser using the given identifier resolver
    pub fn new(resolver: IdentifierResolver) -> Self {
        Self { resolver }
    }

    /// Parse every stream, rejecting streams that share a destination table
    pub fn parse(&self, catalog: &ConfiguredCatalog) -> Result<ParsedCatalog> {
        let mut final_tables: HashMap<(String, String), String> = HashMap::new();
        let mut raw_tables: HashMap<(String, String), String> = HashMap::new();
        let mut streams = Vec::with_capacity(catalog.streams.len());

        for configured in &catalog.streams {
            let config = self.parse_stream(configured)?;
            let id = config.id();

            let final_key = (id.final_namespace.clone(), id.final_name.clone());
            if let Some(other) = final_tables.insert(final_key, id.to_string()) {
                return Err(Error::config(format!(
                    "Streams '{other}' and '{id}' both map to final table {}",
                    id.final_table("")
                )));
            }
            let raw_key = (id.raw_namespace.clone(), id.raw_name.clone());
            if let Some(other) = raw_tables.insert(raw_key, id.to_string()) {
                return Err(Error::config(format!(
                    "Streams '{other}' and '{id}' both map to raw table {}",
                    id.raw_table()
                )));
            }

            streams.push(config);
        }

        Ok(ParsedCatalog { streams })
    }

    /// Parse and validate a single configured stream
    pub fn parse_stream(&self, configured: &ConfiguredStream) -> Result<StreamConfig> {
        let stream = &configured.stream;
        let display_name = match &stream.namespace {
            Some(ns) => format!("{ns}.{}", stream.name),
            None => stream.name.clone(),
        };

        let fields = parse_stream_schema(&display_name, &stream.json_schema)?;
        let (id, column_ids) = self.resolver.resolve(
            stream.namespace.as_deref(),
            &stream.name,
            fields.fields().iter().map(|(name, _)| name.as_str()),
        );

        let columns: Vec<(ColumnId, _)> = column_ids
            .into_iter()
            .zip(fields.fields().iter().map(|(_, ty)| ty.clone()))
            .collect();

        let lookup = |path: &[String], what: &str| -> Result<ColumnId> {
            let [name] = path else {
                return Err(Error::invalid_schema(
                    &display_name,
                    format!("{what} must be a single top-level field, got {path:?}"),
                ));
            };
            columns
                .iter()
                .find(|(c, _)| &c.original_name == name)
                .map(|(c, _)| c.clone())
                .ok_or_else(|| Error::UnknownColumn {
                    stream: display_name.clone(),
                    column: name.clone(),
                })
        };

        let primary_key = configured
            .primary_key
            .iter()
            .flatten()
            .map(|path| lookup(path.as_slice(), "primary key"))
            .collect::<Result<Vec<_>>>()?;

        let cursor = match configured.cursor_field.as_deref() {
            None | Some([]) => None,
            Some(path) => Some(lookup(path, "cursor")?),
        };

        let deletion_marker = columns
            .iter()
            .find(|(c, _)| c.original_name == CDC_DELETED_AT)
            .map(|(c, _)| c.clone());

        StreamConfig::builder(id)
            .sync_mode(configured.sync_mode)
            .destination_sync_mode(configured.destination_sync_mode)
            .columns(columns)
            .primary_key(primary_key)
            .cursor(cursor)
            .deletion_marker(deletion_marker)
            .build()
    }
}
