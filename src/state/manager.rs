//! Destination state manager
//!
//! Caches per-stream state in memory; the destination driver persists it.

use super::types::{DestinationState, StreamDestinationState, StreamKey};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, concurrently updated destination state
#[derive(Debug, Clone, Default)]
pub struct DestinationStateManager {
    state: Arc<RwLock<DestinationState>>,
}

impl DestinationStateManager {
    /// Create an empty state manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state manager from loaded states
    pub fn from_states(streams: HashMap<StreamKey, StreamDestinationState>) -> Self {
        Self {
            state: Arc::new(RwLock::new(DestinationState { streams })),
        }
    }

    /// Create a state manager from a JSON object of `"namespace.name"` keys
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, StreamDestinationState> =
            serde_json::from_str(json).map_err(|e| Error::State {
                message: format!("Failed to parse state JSON: {e}"),
            })?;

        let streams = raw
            .into_iter()
            .map(|(key, state)| (split_key(&key), state))
            .collect();
        Ok(Self::from_states(streams))
    }

    /// Replace the cached state
    pub async fn replace(&self, streams: HashMap<StreamKey, StreamDestinationState>) {
        let mut state = self.state.write().await;
        state.streams = streams;
    }

    /// Get a stream's state (default when unknown)
    pub async fn get(&self, key: &StreamKey) -> StreamDestinationState {
        let state = self.state.read().await;
        state.get_stream(key).cloned().unwrap_or_default()
    }

    /// Update a stream's state in place
    pub async fn update<F>(&self, key: &StreamKey, f: F) -> StreamDestinationState
    where
        F: FnOnce(&mut StreamDestinationState),
    {
        let mut state = self.state.write().await;
        let stream = state.get_stream_mut(key);
        f(stream);
        stream.clone()
    }

    /// Set or clear the soft reset flag
    pub async fn set_needs_soft_reset(
        &self,
        key: &StreamKey,
        needs: bool,
    ) -> StreamDestinationState {
        self.update(key, |s| s.needs_soft_reset = needs).await
    }

    /// Copy of every stream's state
    pub async fn snapshot(&self) -> HashMap<StreamKey, StreamDestinationState> {
        self.state.read().await.streams.clone()
    }

    /// Export state as a JSON object keyed by `"namespace.name"`
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        let keyed: std::collections::BTreeMap<String, &StreamDestinationState> = state
            .streams
            .iter()
            .map(|(key, value)| (join_key(key), value))
            .collect();
        serde_json::to_string_pretty(&keyed).map_err(|e| Error::State {
            message: format!("Failed to serialize state: {e}"),
        })
    }
}

fn join_key((namespace, name): &StreamKey) -> String {
    if namespace.is_empty() {
        name.clone()
    } else {
        format!("{namespace}.{name}")
    }
}

fn split_key(key: &str) -> StreamKey {
    match key.split_once('.') {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (String::new(), key.to_string()),
    }
}
