use cb_core::GridIndex;
use cb_core::grid::{MAX_WIDTH, MIN_WIDTH};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Configuration for a field and the session that drives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Cells along each axis of the cubic field.
    pub width: u32,
    /// Value of the blocks placed at initialization.
    pub base_value: u64,
    /// Blocks seeded into each plane along the x axis.
    pub blocks_per_plane: u32,
    /// Seed agreed through the replication substrate. Every replica must use
    /// the same value.
    pub seed: u64,
    /// Maximum change log size (oldest events dropped when exceeded). 0 = unlimited.
    pub max_events: usize,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 9,
            base_value: 3,
            blocks_per_plane: 3,
            seed: 42,
            max_events: 0,
        }
    }
}

impl FieldConfig {
    /// Set the field width.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Set the value of initially placed blocks.
    pub fn with_base_value(mut self, value: u64) -> Self {
        self.base_value = value;
        self
    }

    /// Set how many blocks are seeded into each plane.
    pub fn with_blocks_per_plane(mut self, count: u32) -> Self {
        self.blocks_per_plane = count;
        self
    }

    /// Set the shared seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the maximum change log size (0 = unlimited).
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Check the configuration and build the grid index it describes.
    pub fn validate(&self) -> SimResult<GridIndex> {
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&self.width) {
            return Err(SimError::InvalidConfig(format!(
                "width {} outside {MIN_WIDTH}..={MAX_WIDTH}",
                self.width
            )));
        }
        if self.base_value == 0 {
            return Err(SimError::InvalidConfig("base value must be positive".into()));
        }
        let plane_capacity = self.width * self.width / 4;
        if self.blocks_per_plane > plane_capacity.max(1) {
            return Err(SimError::InvalidConfig(format!(
                "{} blocks per plane cannot be kept apart in a {}x{} plane",
                self.blocks_per_plane, self.width, self.width
            )));
        }
        Ok(GridIndex::new(self.width)?)
    }
}
