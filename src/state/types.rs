//! Destination state types
//!
//! One record per stream, serialized to JSON and stored in the destination
//! next to the raw tables so it survives process restarts.

use crate::catalog::StreamConfig;
use crate::types::DestinationSyncMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `(namespace, name)` of a source stream; the namespace is empty when absent
pub type StreamKey = (String, String);

/// Persisted per-stream bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDestinationState {
    /// A soft reset was started and has not been swapped in yet
    #[serde(default)]
    pub needs_soft_reset: bool,

    /// Primary key columns the final table was last typed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,

    /// Cursor column the final table was last typed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    /// Destination sync mode the final table was last typed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_sync_mode: Option<DestinationSyncMode>,
}

impl StreamDestinationState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the keys a stream config types with
    pub fn record_config(&mut self, config: &StreamConfig) {
        self.primary_key = Some(
            config
                .primary_key()
                .iter()
                .map(|c| c.canonical_name.clone())
                .collect(),
        );
        self.cursor = config.cursor().map(|c| c.canonical_name.clone());
        self.destination_sync_mode = Some(config.destination_sync_mode());
    }

    /// Whether keys were ever recorded
    pub fn has_recorded_keys(&self) -> bool {
        self.destination_sync_mode.is_some()
    }
}

/// Destination state of every stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationState {
    pub streams: HashMap<StreamKey, StreamDestinationState>,
}

impl DestinationState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, key: &StreamKey) -> Option<&StreamDestinationState> {
        self.streams.get(key)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, key: &StreamKey) -> &mut StreamDestinationState {
        self.streams.entry(key.clone()).or_default()
    }
}
