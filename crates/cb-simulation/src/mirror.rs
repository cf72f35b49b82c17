use std::collections::BTreeMap;

use cb_core::{BlockValue, CellIndex, ParticipantId};

use crate::event::{ChangeEvent, ChangeKind, ChangeSink};
use crate::field::FieldSimulation;

/// What a view knows about one occupied cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCell {
    /// Block value.
    pub value: BlockValue,
    /// Current owner.
    pub owner: Option<ParticipantId>,
}

/// A replica of the occupied grid rebuilt purely from change events.
///
/// This is what a view layer holds. Starting from the same initial snapshot
/// and applying the same events, it must agree with the field it mirrors.
#[derive(Debug, Clone, Default)]
pub struct FieldMirror {
    cells: BTreeMap<CellIndex, MirrorCell>,
    last_seq: Option<u64>,
    faults: Vec<String>,
}

impl FieldMirror {
    /// Seed a mirror from the current state of a field.
    pub fn of(field: &FieldSimulation) -> Self {
        let cells = field
            .iter()
            .map(|(index, block)| {
                (
                    index,
                    MirrorCell {
                        value: block.value,
                        owner: block.owner.clone(),
                    },
                )
            })
            .collect();
        Self {
            cells,
            ..Self::default()
        }
    }

    /// Mirrored cells in index order.
    pub fn cells(&self) -> &BTreeMap<CellIndex, MirrorCell> {
        &self.cells
    }

    /// Events that could not be applied, e.g. a move out of an empty cell.
    pub fn faults(&self) -> &[String] {
        &self.faults
    }

    /// Whether the mirror holds exactly the field's blocks, values and owners.
    pub fn agrees_with(&self, field: &FieldSimulation) -> bool {
        self.cells.len() == field.len()
            && field.iter().all(|(index, block)| {
                self.cells
                    .get(&index)
                    .is_some_and(|c| c.value == block.value && c.owner == block.owner)
            })
    }

    fn fault(&mut self, event: &ChangeEvent, what: &str) {
        self.faults.push(format!("seq {}: {what}", event.seq));
    }
}

impl ChangeSink for FieldMirror {
    fn apply(&mut self, event: &ChangeEvent) {
        if let Some(last) = self.last_seq {
            if event.seq != last + 1 {
                self.fault(event, "out of order");
            }
        }
        self.last_seq = Some(event.seq);

        match &event.kind {
            ChangeKind::BlockMoved { from, to } => match self.cells.remove(from) {
                Some(cell) => {
                    if self.cells.insert(*to, cell).is_some() {
                        self.fault(event, "moved onto occupied cell");
                    }
                }
                None => self.fault(event, "moved from empty cell"),
            },
            ChangeKind::BlockAdded { at, value } => {
                let cell = MirrorCell {
                    value: *value,
                    owner: None,
                };
                if self.cells.insert(*at, cell).is_some() {
                    self.fault(event, "added onto occupied cell");
                }
            }
            ChangeKind::BlockRemoved { at } => {
                if self.cells.remove(at).is_none() {
                    self.fault(event, "removed from empty cell");
                }
            }
            ChangeKind::OwnershipChanged { at, owner } => match self.cells.get_mut(at) {
                Some(cell) => cell.owner = owner.clone(),
                None => self.fault(event, "ownership of empty cell"),
            },
            ChangeKind::RosterChanged => {}
        }
    }
}
