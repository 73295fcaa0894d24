//! DDL and DML generation

use super::types::Sql;
use crate::catalog::StreamConfig;
use crate::dialect::SqlDialect;
use crate::error::{Error, Result};
use crate::naming::{
    ColumnId, StreamId, TableRef, COLUMN_DATA, COLUMN_EXTRACTED_AT, COLUMN_LOADED_AT, COLUMN_META,
    COLUMN_RAW_ID,
};
use crate::state::{StreamDestinationState, StreamKey};
use crate::typing::{build_typing_operation, TypingSource};
use std::collections::HashMap;
use std::sync::Arc;

/// Suffix of the side table a soft reset builds
pub const SOFT_RESET_SUFFIX: &str = "_ab_soft_reset";

/// Name of the destination state table (in the raw namespace)
pub const STATE_TABLE: &str = "_airbyte_destination_state";

/// Generates SQL for one dialect
#[derive(Debug, Clone)]
pub struct SqlGenerator {
    dialect: Arc<dyn SqlDialect>,
}

impl SqlGenerator {
    /// Create a generator for a dialect
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    fn q(&self, identifier: &str) -> String {
        self.dialect.quote(identifier)
    }

    /// Create a namespace if it does not exist
    pub fn create_schema(&self, namespace: &str) -> Sql {
        Sql::of(format!("CREATE SCHEMA IF NOT EXISTS {}", self.q(namespace)))
    }

    /// Create the final table (or a suffixed side table) for a stream
    ///
    /// With `force`, any existing table of that name is dropped first, in the
    /// same transaction.
    pub fn create_table(&self, config: &StreamConfig, suffix: &str, force: bool) -> Sql {
        let table = self.dialect.table(&config.id().final_table(suffix));

        let mut columns = vec![
            format!(
                "{} {} NOT NULL",
                self.q(COLUMN_RAW_ID),
                self.dialect.string_type()
            ),
            format!(
                "{} {} NOT NULL",
                self.q(COLUMN_EXTRACTED_AT),
                self.dialect.timestamp_type()
            ),
            format!(
                "{} {} NOT NULL",
                self.q(COLUMN_META),
                self.dialect.json_type()
            ),
        ];
        columns.extend(config.columns().iter().map(|(column, ty)| {
            format!("{} {}", self.q(column.name()), self.dialect.to_dialect_type(ty))
        }));
        let body = columns.join(", ");

        if force {
            Sql::transactionally([
                format!("DROP TABLE IF EXISTS {table}"),
                format!("CREATE TABLE {table} ({body})"),
            ])
        } else {
            Sql::of(format!("CREATE TABLE IF NOT EXISTS {table} ({body})"))
        }
    }

    /// Create a stream's raw table if it does not exist
    pub fn create_raw_table(&self, stream: &StreamId) -> Sql {
        let table = self.dialect.table(&stream.raw_table());
        Sql::of(format!(
            "CREATE TABLE IF NOT EXISTS {table} ({} {} NOT NULL, {} {} NOT NULL, {} {}, {} {} NOT NULL)",
            self.q(COLUMN_RAW_ID),
            self.dialect.string_type(),
            self.q(COLUMN_EXTRACTED_AT),
            self.dialect.timestamp_type(),
            self.q(COLUMN_LOADED_AT),
            self.dialect.timestamp_type(),
            self.q(COLUMN_DATA),
            self.dialect.json_type(),
        ))
    }

    /// Add nullable columns to the final table, in one transaction
    pub fn alter_add_columns(&self, config: &StreamConfig, columns: &[ColumnId]) -> Result<Sql> {
        let table = self.dialect.table(&config.id().final_table(""));
        let statements = columns
            .iter()
            .map(|column| {
                let ty = config.columns().get(column).ok_or_else(|| Error::UnknownColumn {
                    stream: config.id().to_string(),
                    column: column.original_name.clone(),
                })?;
                Ok(format!(
                    "ALTER TABLE {table} ADD COLUMN {} {}",
                    self.q(column.name()),
                    self.dialect.to_dialect_type(ty)
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Sql::transactionally(statements))
    }

    /// Type raw rows into the final table (or a suffixed side table)
    pub fn typing_operation(
        &self,
        config: &StreamConfig,
        source: TypingSource,
        suffix: &str,
    ) -> Sql {
        build_typing_operation(self.dialect.as_ref(), config, source, suffix)
    }

    /// Replace the final table with a suffixed side table
    pub fn swap(&self, config: &StreamConfig, suffix: &str) -> Sql {
        let id = config.id();
        Sql::transactionally(
            self.dialect
                .swap_statements(&id.final_table(suffix), &id.final_table("")),
        )
    }

    /// Destination state table location
    pub fn state_table(&self, raw_namespace: &str) -> TableRef {
        TableRef::new(raw_namespace, STATE_TABLE)
    }

    /// Create the namespace and table holding destination state
    pub fn create_state_table(&self, raw_namespace: &str) -> Sql {
        let table = self.dialect.table(&self.state_table(raw_namespace));
        self.create_schema(raw_namespace).concat(Sql::of(format!(
            "CREATE TABLE IF NOT EXISTS {table} (\"name\" {s}, \"namespace\" {s}, \"destination_state\" {s}, \"updated_at\" {ts})",
            s = self.dialect.string_type(),
            ts = self.dialect.timestamp_type(),
        )))
    }

    /// Replace stored destination state for the given streams, atomically
    pub fn commit_states(
        &self,
        raw_namespace: &str,
        states: &HashMap<StreamKey, StreamDestinationState>,
    ) -> Result<Sql> {
        let table = self.dialect.table(&self.state_table(raw_namespace));

        let mut keys: Vec<&StreamKey> = states.keys().collect();
        keys.sort();

        let mut deletes = Vec::with_capacity(keys.len());
        let mut inserts = Vec::with_capacity(keys.len());
        for key in keys {
            let (namespace, name) = key;
            let json = serde_json::to_string(&states[key]).map_err(|e| Error::State {
                message: format!("Failed to serialize state for {namespace}.{name}: {e}"),
            })?;
            let name = self.dialect.string_literal(name);
            let namespace = self.dialect.string_literal(namespace);

            deletes.push(format!(
                "DELETE FROM {table} WHERE \"name\" = {name} AND \"namespace\" = {namespace}"
            ));
            inserts.push(format!(
                "INSERT INTO {table} (\"name\", \"namespace\", \"destination_state\", \"updated_at\") VALUES ({name}, {namespace}, {}, {})",
                self.dialect.string_literal(&json),
                self.dialect.current_timestamp()
            ));
        }

        Ok(Sql::transactionally(deletes.into_iter().chain(inserts)))
    }

    /// Query reading every stored destination state
    pub fn load_states_query(&self, raw_namespace: &str) -> String {
        format!(
            "SELECT \"namespace\", \"name\", \"destination_state\" FROM {}",
            self.dialect.table(&self.state_table(raw_namespace))
        )
    }
}
