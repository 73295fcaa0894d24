//! Identifier resolution

use super::types::{ColumnId, NamingConvention, StreamId};
use std::collections::HashSet;

/// Final table system columns
pub const COLUMN_RAW_ID: &str = "_airbyte_raw_id";
pub const COLUMN_EXTRACTED_AT: &str = "_airbyte_extracted_at";
pub const COLUMN_LOADED_AT: &str = "_airbyte_loaded_at";
pub const COLUMN_DATA: &str = "_airbyte_data";
pub const COLUMN_META: &str = "_airbyte_meta";

/// Columns every final table carries ahead of the declared ones
pub const FINAL_SYSTEM_COLUMNS: [&str; 3] = [COLUMN_RAW_ID, COLUMN_EXTRACTED_AT, COLUMN_META];

/// Maps declared stream and field names to collision-free destination identifiers
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    naming: NamingConvention,
    raw_namespace: String,
    default_namespace: String,
}

impl IdentifierResolver {
    /// Create a resolver
    pub fn new(
        naming: NamingConvention,
        raw_namespace: impl Into<String>,
        default_namespace: impl Into<String>,
    ) -> Self {
        Self {
            naming,
            raw_namespace: raw_namespace.into(),
            default_namespace: default_namespace.into(),
        }
    }

    /// The naming convention in use
    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }

    /// Resolve a stream and its declared fields
    pub fn resolve<'a>(
        &self,
        namespace: Option<&str>,
        name: &str,
        fields: impl IntoIterator<Item = &'a str>,
    ) -> (StreamId, Vec<ColumnId>) {
        (self.resolve_stream(namespace, name), self.resolve_columns(fields))
    }

    /// Build the stream id for a source stream
    pub fn resolve_stream(&self, namespace: Option<&str>, name: &str) -> StreamId {
        let namespace = namespace.filter(|ns| !ns.is_empty());
        let effective_namespace = namespace.unwrap_or(&self.default_namespace);
        let raw_name = format!("{effective_namespace}_raw__stream_{name}");

        StreamId {
            original_namespace: namespace.map(ToString::to_string),
            original_name: name.to_string(),
            raw_namespace: self.naming.normalize(&self.raw_namespace),
            raw_name: self.naming.normalize(&raw_name),
            final_namespace: self.naming.normalize(effective_namespace),
            final_name: self.naming.normalize(name),
        }
    }

    /// Build collision-free column ids, in declaration order
    ///
    /// The first field to claim a normalized name keeps it; later ones get
    /// `_2`, `_3`, ... System column names are never handed out.
    pub fn resolve_columns<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> Vec<ColumnId> {
        let mut used: HashSet<String> = FINAL_SYSTEM_COLUMNS
            .iter()
            .map(|c| self.naming.normalize(c))
            .collect();

        fields
            .into_iter()
            .map(|original| {
                let display = self.naming.normalize(original);
                let mut canonical = display.clone();
                let mut counter = 2;
                while used.contains(&canonical) {
                    canonical = self
                        .naming
                        .with_suffix(&display, &format!("_{counter}"));
                    counter += 1;
                }
                if canonical != display {
                    tracing::debug!(
                        "Column '{}' collides after normalization, renamed to '{}'",
                        original,
                        canonical
                    );
                }
                used.insert(canonical.clone());
                ColumnId::new(original, canonical, display)
            })
            .collect()
    }
}
