use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cubist::{CubistRegistry, ParticipantId};
use crate::grid::{Coord, Direction, Occupancy};

/// Value printed on a cube. Merges triple it: 3, 9, 27, 81, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockValue(pub u64);

impl BlockValue {
    /// The value of a block produced by consolidating blocks of this value.
    pub fn tripled(self) -> Self {
        Self(self.0.saturating_mul(3))
    }
}

impl fmt::Display for BlockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single cube occupying one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Face value.
    pub value: BlockValue,
    /// Current cell. Kept in step with the grid key by the field.
    pub position: Coord,
    /// Participant holding the claim on this block, if any.
    pub owner: Option<ParticipantId>,
}

impl Block {
    /// An unowned block.
    pub fn new(value: BlockValue, position: Coord) -> Self {
        Self {
            value,
            position,
            owner: None,
        }
    }

    /// Whether `other` can consolidate with this block: equal value, and
    /// `other` is either unclaimed or claimed by this block's owner.
    pub fn matches(&self, other: &Block) -> bool {
        other.value == self.value
            && other
                .owner
                .as_ref()
                .is_none_or(|o| self.owner.as_ref() == Some(o))
    }

    /// Validate a push of this block by `participant` along `direction`.
    ///
    /// Checks run in a fixed order: contact lock, participant lookup,
    /// ownership, bounds, destination occupancy. Nothing is mutated; the
    /// returned plan is committed by the field.
    pub fn plan_move<O>(
        &self,
        field: &O,
        registry: &CubistRegistry,
        participant: &ParticipantId,
        direction: Direction,
    ) -> Result<MovePlan, MoveRejection>
    where
        O: Occupancy + ?Sized,
    {
        if field.exists_adjacent(self.position) {
            return Err(MoveRejection::Locked);
        }

        let cubist = registry
            .get(participant)
            .ok_or(MoveRejection::UnknownParticipant)?;
        if cubist.is_spectator() {
            return Err(MoveRejection::Spectator);
        }

        let claim = match &self.owner {
            Some(owner) if owner != participant => return Err(MoveRejection::OwnedByOther),
            Some(_) => None,
            None => Some(participant.clone()),
        };

        let to = self.position.step(direction);
        let Some(target) = field.grid().to_index(to) else {
            return Err(MoveRejection::OutOfBounds);
        };
        if field.is_occupied(target) {
            return Err(MoveRejection::Occupied);
        }

        Ok(MovePlan { to, claim })
    }
}

/// A validated move, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// Destination cell, inside the field and empty.
    pub to: Coord,
    /// Set when the move also claims an unowned block.
    pub claim: Option<ParticipantId>,
}

/// Why a move intent was dropped. Rejections are ordinary traffic, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// No block at the addressed cell.
    NoBlock,
    /// The block touches another block on some face.
    Locked,
    /// The participant is not on the roster.
    UnknownParticipant,
    /// The participant holds no identity and cannot claim blocks.
    Spectator,
    /// Another participant owns the block.
    OwnedByOther,
    /// The destination lies outside the field.
    OutOfBounds,
    /// The destination cell already holds a block.
    Occupied,
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            MoveRejection::NoBlock => "no block at cell",
            MoveRejection::Locked => "block is in contact with another block",
            MoveRejection::UnknownParticipant => "participant not on roster",
            MoveRejection::Spectator => "spectators cannot claim blocks",
            MoveRejection::OwnedByOther => "block owned by another participant",
            MoveRejection::OutOfBounds => "destination outside the field",
            MoveRejection::Occupied => "destination occupied",
        };
        f.write_str(reason)
    }
}
