//! Destination state
//!
//! Per-stream bookkeeping the engine needs across runs: whether a soft reset
//! is in flight, and the keys and sync mode the final table was last typed
//! with. The state lives in a destination table and is committed together
//! with the final tables.

mod manager;
mod types;

pub use manager::DestinationStateManager;
pub use types::{DestinationState, StreamDestinationState, StreamKey};
