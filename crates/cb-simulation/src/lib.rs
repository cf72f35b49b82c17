//! Deterministic replicated field simulation for Cellblock.
//!
//! Every replica runs the same [`Session`] over the same totally ordered
//! stream of [`Intent`]s. Each intent either commits atomically, producing an
//! ordered batch of [`ChangeEvent`]s, or is rejected without touching state.
//! Randomness is drawn only from the session seed, so replicas converge
//! without exchanging state.

/// Configuration types for a field.
pub mod config;
/// Error types for the simulation crate.
pub mod error;
/// Change events and the staged change feed.
pub mod event;
/// The authoritative sparse grid: placement, adjacency, moves and merges.
pub mod field;
/// Inbound intents delivered by the replication substrate.
pub mod intent;
/// Reference event consumer that rebuilds the grid from events alone.
pub mod mirror;
/// Deterministic randomness shared by all replicas.
pub mod random;
/// Top-level orchestrator that applies intents.
pub mod session;
/// Full-state snapshots for resynchronization.
pub mod snapshot;

/// Re-export of [`config::FieldConfig`].
pub use config::FieldConfig;
/// Re-exports of [`error::SimError`] and [`error::SimResult`].
pub use error::{SimError, SimResult};
/// Re-exports of the change feed types.
pub use event::{ChangeEvent, ChangeFeed, ChangeKind, ChangeSink};
/// Re-exports of the field types.
pub use field::{FieldSimulation, MergeSummary, MoveOutcome, Relocation};
/// Re-export of [`intent::Intent`].
pub use intent::Intent;
/// Re-export of [`mirror::FieldMirror`].
pub use mirror::FieldMirror;
/// Re-export of [`random::SharedRandom`].
pub use random::SharedRandom;
/// Re-exports of the session types.
pub use session::{IntentReport, Session};
/// Re-exports of the snapshot types.
pub use snapshot::{FieldSnapshot, RandomState, SessionSnapshot};
