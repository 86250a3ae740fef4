//! Pluggable state serialization for persisted history
//!
//! The core never chooses a storage format. Hosts that persist history
//! supply a [`StateCodec`]; the history is exported as a sequential log of
//! encoded states keyed by sequence number.

use crate::error::CodecError;
use crate::state::State;
use chrono::{DateTime, Utc};
use samloop_types::Sequence;
use serde::{Deserialize, Serialize};

/// Encodes and decodes states for persistence
pub trait StateCodec: Send + Sync {
    fn encode(&self, state: &State) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<State, CodecError>;
}

/// JSON codec backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl StateCodec for JsonCodec {
    fn encode(&self, state: &State) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(state).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<State, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// One encoded history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub sequence: Sequence,
    pub timestamp: DateTime<Utc>,
    pub bytes: Vec<u8>,
}

/// Encoded history log plus the cursor position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedHistory {
    pub cursor: usize,
    pub entries: Vec<PersistedEntry>,
}
