//! DuckDB destination
//!
//! Runs generated SQL against an embedded DuckDB database. The base
//! connection is cloned per operation and the clone is driven on the
//! blocking thread pool; a semaphore bounds concurrent connections.

use super::{DestinationDriver, RawTableStatus, RawRecord, RetryPolicy};
use crate::dialect::{DuckDbDialect, SqlDialect};
use crate::differ::{ColumnDefinition, TableDefinition};
use crate::error::{is_transient_duckdb_message, Error, Result};
use crate::naming::{
    StreamId, TableRef, COLUMN_DATA, COLUMN_EXTRACTED_AT, COLUMN_LOADED_AT, COLUMN_RAW_ID,
};
use crate::sql::{Sql, SqlGenerator, STATE_TABLE};
use crate::state::{StreamDestinationState, StreamKey};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use duckdb::types::{TimeUnit, Value};
use duckdb::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Default number of concurrently open connections
const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// DuckDB destination driver
pub struct DuckDbDestination {
    conn: Arc<Mutex<Connection>>,
    dialect: Arc<DuckDbDialect>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    raw_namespace: String,
    location: String,
}

impl DuckDbDestination {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>, raw_namespace: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            Error::config(format!(
                "Failed to open DuckDB database '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_connection(conn, raw_namespace, path.display().to_string())
    }

    /// Open a fresh in-memory database
    pub fn open_in_memory(raw_namespace: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;
        Self::from_connection(conn, raw_namespace, ":memory:".to_string())
    }

    fn from_connection(
        conn: Connection,
        raw_namespace: impl Into<String>,
        location: String,
    ) -> Result<Self> {
        if let Err(e) = conn.execute_batch("LOAD json;") {
            debug!("json extension not loaded explicitly: {}", e);
        }

        let dialect = DuckDbDialect::new();
        let raw_namespace = dialect.naming().normalize(&raw_namespace.into());
        info!("Opened DuckDB destination at {}", location);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dialect: Arc::new(dialect),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONNECTIONS)),
            retry: RetryPolicy::default(),
            raw_namespace,
            location,
        })
    }

    /// Set the retry policy for transient failures
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound the number of concurrently used connections
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    fn clone_connection(&self) -> Result<Connection> {
        let base = self
            .conn
            .lock()
            .map_err(|_| Error::Other("DuckDB connection lock poisoned".to_string()))?;
        base.try_clone().map_err(Error::from)
    }

    /// Run `f` on a dedicated connection on the blocking pool
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Other(format!("Connection pool closed: {e}")))?;
        let mut conn = self.clone_connection()?;

        tokio::task::spawn_blocking(move || f(&mut conn))
            .await
            .map_err(|e| Error::Other(format!("DuckDB task failed: {e}")))?
    }

    /// Columns of any table, in ordinal order
    pub async fn introspect_table(&self, table: &TableRef) -> Result<Option<TableDefinition>> {
        let table = table.clone();
        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
                     WHERE table_catalog = current_database() \
                     AND table_schema = ? AND table_name = ? \
                     ORDER BY ordinal_position",
                )
                .map_err(|e| Error::introspection(table.to_string(), e.to_string()))?;

            let columns = stmt
                .query_map(params![table.namespace, table.name], |row| {
                    let name: String = row.get(0)?;
                    let type_name: String = row.get(1)?;
                    let nullable: String = row.get(2)?;
                    Ok(ColumnDefinition::new(name, type_name, nullable == "YES"))
                })
                .map_err(|e| Error::introspection(table.to_string(), e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::introspection(table.to_string(), e.to_string()))?;

            if columns.is_empty() {
                Ok(None)
            } else {
                Ok(Some(TableDefinition::new(columns)))
            }
        })
        .await
    }

    /// Whether a table exists
    pub async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let table = table.clone();
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_catalog = current_database() AND table_schema = ? AND table_name = ?",
                params![table.namespace, table.name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    /// Number of rows in a table, optionally filtered by a SQL predicate
    pub async fn count_rows(&self, table: &TableRef, predicate: Option<&str>) -> Result<i64> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.dialect.table(table));
        if let Some(predicate) = predicate {
            sql.push_str(&format!(" WHERE {predicate}"));
        }
        self.with_connection(move |conn| {
            conn.query_row(&sql, [], |row| row.get(0))
                .map_err(|e| execution_error(&sql, &e))
        })
        .await
    }

    /// Append records to a stream's raw table, creating it if needed
    pub async fn insert_raw_records(
        &self,
        stream: &StreamId,
        records: Vec<RawRecord>,
    ) -> Result<usize> {
        let generator = SqlGenerator::new(self.dialect.clone());
        let raw = stream.raw_table();
        self.execute(
            &generator
                .create_schema(&raw.namespace)
                .concat(generator.create_raw_table(stream)),
        )
        .await?;

        let sql = format!(
            "INSERT INTO {} ({}, {}, {}, {}) \
             VALUES (?, CAST(? AS TIMESTAMPTZ), NULL, CAST(? AS JSON))",
            self.dialect.table(&raw),
            self.dialect.quote(COLUMN_RAW_ID),
            self.dialect.quote(COLUMN_EXTRACTED_AT),
            self.dialect.quote(COLUMN_LOADED_AT),
            self.dialect.quote(COLUMN_DATA),
        );

        let count = records.len();
        self.with_connection(move |conn| {
            let tx = conn.transaction().map_err(|e| execution_error("BEGIN", &e))?;
            {
                let mut stmt = tx.prepare(&sql).map_err(|e| execution_error(&sql, &e))?;
                for record in &records {
                    let extracted_at = record
                        .extracted_at
                        .to_rfc3339_opts(SecondsFormat::Micros, true);
                    let data = serde_json::to_string(&record.data)?;
                    stmt.execute(params![record.raw_id, extracted_at, data])
                        .map_err(|e| execution_error(&sql, &e))?;
                }
            }
            tx.commit().map_err(|e| execution_error("COMMIT", &e))
        })
        .await?;

        debug!("Inserted {} raw records into {}", count, raw);
        Ok(count)
    }

    /// Every row of a table as JSON objects, in extraction order
    ///
    /// Values are rendered as text; JSON columns are parsed back into JSON.
    pub async fn dump_table(&self, table: &TableRef) -> Result<Vec<JsonObject>> {
        let Some(definition) = self.introspect_table(table).await? else {
            return Err(Error::introspection(table.to_string(), "table does not exist"));
        };

        let columns: Vec<(String, bool)> = definition
            .columns
            .values()
            .map(|c| (c.name.clone(), self.dialect.types_match("JSON", &c.type_name)))
            .collect();
        let projections: Vec<String> = columns
            .iter()
            .map(|(name, _)| {
                let quoted = self.dialect.quote(name);
                format!("CAST({quoted} AS VARCHAR) AS {quoted}")
            })
            .collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}, {}",
            projections.join(", "),
            self.dialect.table(table),
            self.dialect.quote(COLUMN_EXTRACTED_AT),
            self.dialect.quote(COLUMN_RAW_ID),
        );

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(|e| execution_error(&sql, &e))?;
            let mut rows = stmt.query([]).map_err(|e| execution_error(&sql, &e))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut object = JsonObject::new();
                for (i, (name, is_json)) in columns.iter().enumerate() {
                    let text: Option<String> = row.get(i)?;
                    let value = match text {
                        None => JsonValue::Null,
                        Some(text) if *is_json => {
                            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
                        }
                        Some(text) => JsonValue::String(text),
                    };
                    object.insert(name.clone(), value);
                }
                out.push(object);
            }
            Ok(out)
        })
        .await
    }

    async fn execute_transaction(&self, statements: Vec<String>) -> Result<()> {
        self.with_connection(move |conn| run_transaction(conn, &statements))
            .await
    }
}

#[async_trait]
impl DestinationDriver for DuckDbDestination {
    fn dialect(&self) -> Arc<dyn SqlDialect> {
        self.dialect.clone()
    }

    fn raw_namespace(&self) -> &str {
        &self.raw_namespace
    }

    async fn execute(&self, sql: &Sql) -> Result<()> {
        for transaction in sql.transactions() {
            self.retry
                .run("DuckDB transaction", || {
                    self.execute_transaction(transaction.clone())
                })
                .await?;
        }
        Ok(())
    }

    async fn introspect_final_table(
        &self,
        stream: &StreamId,
        suffix: &str,
    ) -> Result<Option<TableDefinition>> {
        self.introspect_table(&stream.final_table(suffix)).await
    }

    async fn raw_table_status(&self, stream: &StreamId) -> Result<RawTableStatus> {
        let raw = stream.raw_table();
        if !self.table_exists(&raw).await? {
            return Ok(RawTableStatus::default());
        }

        let table = self.dialect.table(&raw);
        let extracted_at = self.dialect.quote(COLUMN_EXTRACTED_AT);
        let loaded_at = self.dialect.quote(COLUMN_LOADED_AT);
        let oldest_unprocessed =
            format!("SELECT MIN({extracted_at}) FROM {table} WHERE {loaded_at} IS NULL");
        let newest = format!("SELECT MAX({extracted_at}) FROM {table}");

        self.with_connection(move |conn| {
            let min: Value = conn
                .query_row(&oldest_unprocessed, [], |row| row.get(0))
                .map_err(|e| execution_error(&oldest_unprocessed, &e))?;
            if let Some(min) = value_to_datetime(min) {
                return Ok(RawTableStatus {
                    exists: true,
                    has_unprocessed_records: true,
                    max_processed_timestamp: Some(min - Duration::seconds(1)),
                });
            }

            let max: Value = conn
                .query_row(&newest, [], |row| row.get(0))
                .map_err(|e| execution_error(&newest, &e))?;
            Ok(RawTableStatus {
                exists: true,
                has_unprocessed_records: false,
                max_processed_timestamp: value_to_datetime(max),
            })
        })
        .await
    }

    async fn load_destination_states(&self) -> Result<HashMap<StreamKey, StreamDestinationState>> {
        let table = TableRef::new(&self.raw_namespace, STATE_TABLE);
        if !self.table_exists(&table).await? {
            return Ok(HashMap::new());
        }

        let sql = self.generator().load_states_query(&self.raw_namespace);
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(|e| execution_error(&sql, &e))?;
            let rows = stmt
                .query_map([], |row| {
                    let namespace: Option<String> = row.get(0)?;
                    let name: String = row.get(1)?;
                    let state: Option<String> = row.get(2)?;
                    Ok((namespace.unwrap_or_default(), name, state))
                })
                .map_err(|e| execution_error(&sql, &e))?;

            let mut states = HashMap::new();
            for row in rows {
                let (namespace, name, state) = row?;
                let state = match state {
                    Some(json) => serde_json::from_str(&json).map_err(|e| {
                        Error::state(format!("Invalid state for {namespace}.{name}: {e}"))
                    })?,
                    None => StreamDestinationState::default(),
                };
                states.insert((namespace, name), state);
            }
            Ok(states)
        })
        .await
    }
}

impl std::fmt::Debug for DuckDbDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbDestination")
            .field("location", &self.location)
            .field("raw_namespace", &self.raw_namespace)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn run_transaction(conn: &mut Connection, statements: &[String]) -> Result<()> {
    let tx = conn.transaction().map_err(|e| execution_error("BEGIN", &e))?;
    for statement in statements {
        debug!("Executing: {}", statement);
        tx.execute_batch(statement)
            .map_err(|e| execution_error(statement, &e))?;
    }
    tx.commit().map_err(|e| execution_error("COMMIT", &e))
}

fn execution_error(statement: &str, error: &duckdb::Error) -> Error {
    let message = error.to_string();
    let retryable = is_transient_duckdb_message(&message);
    Error::execution(statement, message, retryable)
}

/// Convert a DuckDB timestamp value to UTC
fn value_to_datetime(value: Value) -> Option<DateTime<Utc>> {
    let Value::Timestamp(unit, i) = value else {
        return None;
    };
    let micros = match unit {
        TimeUnit::Second => i.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => i.checked_mul(1_000)?,
        TimeUnit::Microsecond => i,
        TimeUnit::Nanosecond => i / 1_000,
    };
    let secs = micros.div_euclid(1_000_000);
    let nsecs = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nsecs)
}
