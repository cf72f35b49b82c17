use cb_core::{Block, Cubist};
use serde::{Deserialize, Serialize};

use crate::config::FieldConfig;
use crate::error::SimResult;

/// Seed and stream position of the shared random source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomState {
    /// Seed the stream started from.
    pub seed: u64,
    /// ChaCha word position reached so far.
    pub position: u128,
}

/// Full contents of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// Every block, in cell index order.
    pub blocks: Vec<Block>,
    /// Where the shared random stream stands.
    pub random: RandomState,
}

/// Everything a replica needs to rejoin the agreed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Configuration the session was started with.
    pub config: FieldConfig,
    /// Participants in join order.
    pub roster: Vec<Cubist>,
    /// The grid.
    pub field: FieldSnapshot,
    /// Sequence number of the next change event.
    pub next_seq: u64,
}

impl SessionSnapshot {
    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
