use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CbError, CbResult};

/// Number of colors in the cubist palette, and so the identity cap.
pub const PALETTE_SIZE: usize = 6;

/// The fixed cubist palette, in allocation order.
pub const PALETTE: [&str; PALETTE_SIZE] = [
    "#880000", "#008800", "#000088", "#228800", "#002288", "#880022",
];

/// Display color for unowned blocks and spectators.
pub const UNCLAIMED_COLOR: &str = "#aaaaaa";

/// Opaque participant identifier handed out by the replication substrate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap a substrate-provided identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position in the fixed palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PaletteSlot(u8);

impl PaletteSlot {
    /// The slot at `index`, if the palette has one.
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < PALETTE_SIZE).then_some(Self(index))
    }

    /// Zero-based palette position.
    pub fn index(self) -> u8 {
        self.0
    }

    /// CSS hex color of this slot.
    pub fn hex(self) -> &'static str {
        PALETTE[self.0 as usize]
    }

    fn all() -> impl Iterator<Item = PaletteSlot> {
        (0..PALETTE_SIZE as u8).map(PaletteSlot)
    }
}

impl TryFrom<u8> for PaletteSlot {
    type Error = String;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or_else(|| format!("palette has no slot {index}"))
    }
}

impl From<PaletteSlot> for u8 {
    fn from(slot: PaletteSlot) -> Self {
        slot.0
    }
}

/// Display name and color held by a cubist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Name shown in the visitor list.
    pub name: String,
    /// Color used for blocks this cubist owns.
    pub color: PaletteSlot,
}

/// A connected participant. Spectators carry no identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cubist {
    /// Substrate identifier.
    pub id: ParticipantId,
    /// Name and color, absent for spectators.
    pub identity: Option<Identity>,
}

impl Cubist {
    /// Whether this participant joined past the identity cap.
    pub fn is_spectator(&self) -> bool {
        self.identity.is_none()
    }

    /// Display name, or `"Spectator"` without an identity.
    pub fn display_name(&self) -> &str {
        self.identity
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or("Spectator")
    }

    /// Display color, or [`UNCLAIMED_COLOR`] without an identity.
    pub fn color_hex(&self) -> &'static str {
        self.identity
            .as_ref()
            .map(|i| i.color.hex())
            .unwrap_or(UNCLAIMED_COLOR)
    }
}

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new cubist received a name and color.
    Joined(Identity),
    /// A new participant was tracked without an identity.
    Spectator,
    /// The participant was already on the roster; nothing changed.
    AlreadyPresent,
}

impl JoinOutcome {
    /// Whether the roster changed.
    pub fn changed(&self) -> bool {
        !matches!(self, JoinOutcome::AlreadyPresent)
    }
}

/// The roster of connected participants and the color pool they draw from.
///
/// Kept in join order so every replica iterates it identically.
#[derive(Debug, Clone, Default)]
pub struct CubistRegistry {
    roster: Vec<Cubist>,
}

impl CubistRegistry {
    /// An empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a snapshot roster, checking its invariants.
    pub fn from_roster(roster: Vec<Cubist>) -> CbResult<Self> {
        let mut ids = HashSet::new();
        let mut colors = HashSet::new();
        for cubist in &roster {
            if !ids.insert(&cubist.id) {
                return Err(CbError::DuplicateParticipant(cubist.id.clone()));
            }
            if let Some(identity) = &cubist.identity {
                if !colors.insert(identity.color) {
                    return Err(CbError::DuplicateColor(identity.color.index()));
                }
            }
        }
        Ok(Self { roster })
    }

    /// Admit a participant.
    ///
    /// New participants get the first free palette color and the name
    /// `Visitor{n}`, where `n` counts identity holders at join time. Once
    /// every color is held, newcomers are tracked as spectators.
    pub fn join(&mut self, id: ParticipantId) -> JoinOutcome {
        if self.contains(&id) {
            return JoinOutcome::AlreadyPresent;
        }

        let held = self.identity_count();
        let identity = self.first_free_color().map(|color| Identity {
            name: format!("Visitor{}", held + 1),
            color,
        });

        let outcome = match &identity {
            Some(identity) => JoinOutcome::Joined(identity.clone()),
            None => JoinOutcome::Spectator,
        };
        tracing::debug!(participant = %id, ?outcome, "participant joined");
        self.roster.push(Cubist { id, identity });
        outcome
    }

    /// Remove a participant, returning its color to the pool.
    ///
    /// Returns the departed cubist, or `None` if it was never present.
    pub fn leave(&mut self, id: &ParticipantId) -> Option<Cubist> {
        let pos = self.roster.iter().position(|c| &c.id == id)?;
        let cubist = self.roster.remove(pos);
        tracing::debug!(participant = %id, "participant left");
        Some(cubist)
    }

    /// Change the display name of an identity holder.
    ///
    /// Returns `false` for unknown participants, spectators, blank names and
    /// names equal to the current one.
    pub fn rename(&mut self, id: &ParticipantId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let Some(identity) = self
            .roster
            .iter_mut()
            .find(|c| &c.id == id)
            .and_then(|c| c.identity.as_mut())
        else {
            return false;
        };
        if identity.name == name {
            return false;
        }
        identity.name = name.to_string();
        true
    }

    /// Look up a participant.
    pub fn get(&self, id: &ParticipantId) -> Option<&Cubist> {
        self.roster.iter().find(|c| &c.id == id)
    }

    /// Whether a participant is on the roster.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.get(id).is_some()
    }

    /// All participants in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Cubist> {
        self.roster.iter()
    }

    /// Number of tracked participants, spectators included.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Number of participants currently holding a color.
    pub fn identity_count(&self) -> usize {
        self.roster.iter().filter(|c| c.identity.is_some()).count()
    }

    /// Palette colors no live participant holds, in palette order.
    pub fn available_colors(&self) -> Vec<PaletteSlot> {
        PaletteSlot::all().filter(|s| !self.holds(*s)).collect()
    }

    fn holds(&self, slot: PaletteSlot) -> bool {
        self.roster
            .iter()
            .any(|c| c.identity.as_ref().is_some_and(|i| i.color == slot))
    }

    fn first_free_color(&self) -> Option<PaletteSlot> {
        PaletteSlot::all().find(|s| !self.holds(*s))
    }
}
