//! In-memory driver that records executed SQL

use super::{DestinationDriver, RawTableStatus};
use crate::dialect::{DuckDbDialect, SqlDialect};
use crate::differ::TableDefinition;
use crate::error::{Error, Result};
use crate::naming::StreamId;
use crate::sql::Sql;
use crate::state::{StreamDestinationState, StreamKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Records every statement; fails statements matching a pattern
#[derive(Debug, Default)]
pub(crate) struct RecordingDriver {
    pub executed: Mutex<Vec<Vec<String>>>,
    pub fail_on: Mutex<Option<String>>,
    pub tables: Mutex<HashMap<String, TableDefinition>>,
    pub raw_status: Mutex<HashMap<String, RawTableStatus>>,
    pub states: Mutex<HashMap<StreamKey, StreamDestinationState>>,
    pub committed_states: Mutex<Vec<HashMap<StreamKey, StreamDestinationState>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any transaction containing a statement with this fragment
    pub fn fail_on(&self, fragment: Option<&str>) {
        *self.fail_on.lock().unwrap() = fragment.map(ToString::to_string);
    }

    pub fn set_table(&self, stream: &StreamId, definition: TableDefinition) {
        self.tables
            .lock()
            .unwrap()
            .insert(stream.final_table("").to_string(), definition);
    }

    pub fn set_raw_status(&self, stream: &StreamId, status: RawTableStatus) {
        self.raw_status
            .lock()
            .unwrap()
            .insert(stream.raw_table().to_string(), status);
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.executed.lock().unwrap().clear();
    }
}

#[async_trait]
impl DestinationDriver for RecordingDriver {
    fn dialect(&self) -> Arc<dyn SqlDialect> {
        Arc::new(DuckDbDialect::new())
    }

    fn raw_namespace(&self) -> &str {
        "airbyte_internal"
    }

    async fn execute(&self, sql: &Sql) -> Result<()> {
        let fail_on = self.fail_on.lock().unwrap().clone();
        for transaction in sql.transactions() {
            if let Some(fragment) = &fail_on {
                if let Some(statement) =
                    transaction.iter().find(|s| s.contains(fragment.as_str()))
                {
                    return Err(Error::execution(statement.clone(), "injected failure", false));
                }
            }
            self.executed.lock().unwrap().push(transaction.clone());
        }
        Ok(())
    }

    async fn introspect_final_table(
        &self,
        stream: &StreamId,
        suffix: &str,
    ) -> Result<Option<TableDefinition>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(&stream.final_table(suffix).to_string())
            .cloned())
    }

    async fn raw_table_status(&self, stream: &StreamId) -> Result<RawTableStatus> {
        Ok(self
            .raw_status
            .lock()
            .unwrap()
            .get(&stream.raw_table().to_string())
            .copied()
            .unwrap_or(RawTableStatus {
                exists: true,
                has_unprocessed_records: true,
                max_processed_timestamp: None,
            }))
    }

    async fn load_destination_states(&self) -> Result<HashMap<StreamKey, StreamDestinationState>> {
        Ok(self.states.lock().unwrap().clone())
    }

    async fn commit_destination_states(
        &self,
        states: &HashMap<StreamKey, StreamDestinationState>,
    ) -> Result<()> {
        self.committed_states.lock().unwrap().push(states.clone());
        self.states.lock().unwrap().extend(states.clone());
        Ok(())
    }
}
