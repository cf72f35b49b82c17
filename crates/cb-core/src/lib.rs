//! Core types for Cellblock: grid addressing, cubists, and blocks.
//!
//! This crate holds the leaf data model of the simulation. It knows nothing
//! about events, randomness or sessions; [`Block::plan_move`] validates a push
//! against any grid that implements [`grid::Occupancy`].

/// Blocks, block values, and the move validation state machine.
pub mod block;
/// Participants, their identities, and the color pool.
pub mod cubist;
/// Error types used throughout the crate.
pub mod error;
/// Coordinates, linear cell indexes, and face directions.
pub mod grid;

/// Re-export block types.
pub use block::{Block, BlockValue, MovePlan, MoveRejection};
/// Re-export participant types.
pub use cubist::{
    Cubist, CubistRegistry, Identity, JoinOutcome, PALETTE, PaletteSlot, ParticipantId,
    UNCLAIMED_COLOR,
};
/// Re-export error types.
pub use error::{CbError, CbResult};
/// Re-export grid types.
pub use grid::{CellIndex, Coord, Direction, GridIndex, Occupancy};
