use cb_core::{CbError, CellIndex};

/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Failures of the simulation itself. Rejected intents are not errors.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Relocation addressed a cell with no block. Callers must treat this
    /// as fatal: the replica has diverged from the agreed state.
    #[error("internal consistency: no block at cell {0}")]
    MissingBlock(CellIndex),

    /// A block was about to be placed on an occupied cell. Fatal, like
    /// [`SimError::MissingBlock`].
    #[error("internal consistency: cell {0} already holds a block")]
    CellOccupied(CellIndex),

    /// Rejection sampling could not find a free, isolated cell.
    #[error("no free cell found in plane {plane} after {attempts} attempts")]
    PlacementExhausted {
        /// The plane being populated.
        plane: u32,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The field configuration cannot be simulated.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A snapshot is internally inconsistent.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    /// A core data model error.
    #[error(transparent)]
    Core(#[from] CbError),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Whether this error means the field contradicted itself, as opposed to
    /// bad input such as a config or snapshot.
    pub fn is_consistency_failure(&self) -> bool {
        matches!(self, SimError::MissingBlock(_) | SimError::CellOccupied(_))
    }
}
