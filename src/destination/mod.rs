//! Destination drivers
//!
//! The contract between the planning core and a warehouse. A driver runs
//! [`Sql`] batches (each inner list atomically), introspects final tables,
//! reports raw table progress and stores destination state. Everything else,
//! including retries of transient failures, is the driver's business; the
//! planning core never retries.
//!
//! [`DuckDbDestination`] is the reference implementation.

mod duckdb;
mod retry;

pub use self::duckdb::DuckDbDestination;
pub use retry::RetryPolicy;

use crate::catalog::StreamConfig;
use crate::dialect::SqlDialect;
use crate::differ::TableDefinition;
use crate::error::{Error, Result};
use crate::naming::StreamId;
use crate::sql::{Sql, SqlGenerator};
use crate::state::{StreamDestinationState, StreamKey};
use crate::types::JsonValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Progress of a stream's raw table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawTableStatus {
    /// Whether the raw table exists
    pub exists: bool,
    /// Whether any row has `_airbyte_loaded_at IS NULL`
    pub has_unprocessed_records: bool,
    /// Lower bound for the next typing run's `_airbyte_extracted_at` filter
    ///
    /// Just under the oldest unprocessed row when there is one, otherwise the
    /// newest extraction time seen.
    pub max_processed_timestamp: Option<DateTime<Utc>>,
}

/// One row to append to a raw table
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub raw_id: String,
    pub extracted_at: DateTime<Utc>,
    pub data: JsonValue,
}

impl RawRecord {
    /// Create a record with a fresh random id
    pub fn new(data: JsonValue, extracted_at: DateTime<Utc>) -> Self {
        Self {
            raw_id: Uuid::new_v4().to_string(),
            extracted_at,
            data,
        }
    }

    /// Create a record with a given id
    pub fn with_id(
        raw_id: impl Into<String>,
        data: JsonValue,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            raw_id: raw_id.into(),
            extracted_at,
            data,
        }
    }
}

/// A warehouse the engine can type and deduplicate into
#[async_trait]
pub trait DestinationDriver: Send + Sync {
    /// SQL dialect of this destination
    fn dialect(&self) -> Arc<dyn SqlDialect>;

    /// Run a batch; each transaction commits atomically, in order
    async fn execute(&self, sql: &Sql) -> Result<()>;

    /// Columns of the stream's final table (with suffix), if it exists
    async fn introspect_final_table(
        &self,
        stream: &StreamId,
        suffix: &str,
    ) -> Result<Option<TableDefinition>>;

    /// Progress of the stream's raw table
    async fn raw_table_status(&self, stream: &StreamId) -> Result<RawTableStatus>;

    /// Read every stored destination state
    async fn load_destination_states(&self) -> Result<HashMap<StreamKey, StreamDestinationState>>;

    /// Namespace holding raw tables and destination state
    fn raw_namespace(&self) -> &str;

    fn generator(&self) -> SqlGenerator {
        SqlGenerator::new(self.dialect())
    }

    /// Create a namespace if missing
    async fn create_namespace_if_absent(&self, namespace: &str) -> Result<()> {
        self.execute(&self.generator().create_schema(namespace)).await
    }

    /// Create the destination state table if missing
    async fn prepare_state_table(&self) -> Result<()> {
        let sql = self.generator().create_state_table(self.raw_namespace());
        self.execute(&sql).await
    }

    /// Atomically replace the final table with the given side table
    async fn swap(&self, config: &StreamConfig, suffix: &str) -> Result<()> {
        let stream = config.id();
        let sql = self.generator().swap(config, suffix);
        self.execute(&sql).await.map_err(|e| {
            Error::swap(
                stream.final_table(suffix).to_string(),
                stream.final_table("").to_string(),
                e.to_string(),
            )
        })
    }

    /// Persist destination state for the given streams
    async fn commit_destination_states(
        &self,
        states: &HashMap<StreamKey, StreamDestinationState>,
    ) -> Result<()> {
        let sql = self.generator().commit_states(self.raw_namespace(), states)?;
        self.execute(&sql).await
    }
}

#[cfg(test)]
pub(crate) mod testing;
