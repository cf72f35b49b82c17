use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::iter;

use cb_core::{
    Block, BlockValue, CellIndex, Coord, CubistRegistry, Direction, GridIndex, MoveRejection,
    Occupancy, ParticipantId,
};

use crate::config::FieldConfig;
use crate::error::{SimError, SimResult};
use crate::event::{ChangeFeed, ChangeKind};
use crate::random::SharedRandom;
use crate::snapshot::{FieldSnapshot, RandomState};

/// Rejection-sampling attempts per block during initialization.
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 10_000;
/// Random columns tried before a relocation falls back to a full scan.
pub const RELOCATION_ATTEMPTS: u32 = 64;

/// Result of a move intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The block moved, possibly triggering a merge.
    Moved {
        /// Cell the block left.
        from: CellIndex,
        /// Cell the block landed on.
        to: CellIndex,
        /// Consolidation triggered by the landing, if any.
        merge: Option<MergeSummary>,
    },
    /// The intent was dropped; nothing changed.
    Rejected(MoveRejection),
}

/// Where an unpaired merge partner ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// Moved to an isolated free cell.
    Moved {
        /// Original cell.
        from: CellIndex,
        /// New cell.
        to: CellIndex,
    },
    /// No isolated free cell existed; the block was removed.
    Dropped {
        /// Original cell.
        from: CellIndex,
    },
}

/// What a consolidation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Value of the consumed blocks.
    pub value: BlockValue,
    /// Value of each produced block.
    pub product: BlockValue,
    /// Cells whose blocks were consumed, mover first.
    pub consumed: Vec<CellIndex>,
    /// Cells that received a produced block.
    pub produced: Vec<CellIndex>,
    /// The unpaired partner, if the match count was odd.
    pub relocated: Option<Relocation>,
}

/// The authoritative sparse grid.
///
/// Cells map to at most one block; empty cells are absent. The map is ordered
/// so every traversal, and so every emitted event, is identical on all
/// replicas. Owned cells are indexed per participant so a departure clears
/// ownership without scanning the grid.
#[derive(Debug, Clone)]
pub struct FieldSimulation {
    grid: GridIndex,
    base_value: BlockValue,
    blocks: BTreeMap<CellIndex, Block>,
    owned: BTreeMap<ParticipantId, BTreeSet<CellIndex>>,
    random: SharedRandom,
}

impl Occupancy for FieldSimulation {
    fn grid(&self) -> &GridIndex {
        &self.grid
    }

    fn is_occupied(&self, index: CellIndex) -> bool {
        self.blocks.contains_key(&index)
    }
}

impl FieldSimulation {
    /// An empty field for `config`.
    pub fn empty(config: &FieldConfig) -> SimResult<Self> {
        let grid = config.validate()?;
        Ok(Self {
            grid,
            base_value: BlockValue(config.base_value),
            blocks: BTreeMap::new(),
            owned: BTreeMap::new(),
            random: SharedRandom::new(config.seed),
        })
    }

    /// A field populated with the initial layout for `config`.
    ///
    /// Each plane along x receives `blocks_per_plane` base-value blocks at
    /// random (y, z), resampled until the cell is free and touches nothing.
    pub fn seeded(config: &FieldConfig) -> SimResult<Self> {
        let mut field = Self::empty(config)?;
        let w = field.grid.width();
        for plane in 0..w {
            for _ in 0..config.blocks_per_plane {
                field.place_isolated(plane)?;
            }
        }
        tracing::debug!(
            blocks = field.len(),
            seed = config.seed,
            width = w,
            "field initialized"
        );
        Ok(field)
    }

    /// Rebuild a field from a snapshot.
    pub fn restore(config: &FieldConfig, snapshot: FieldSnapshot) -> SimResult<Self> {
        let mut field = Self::empty(config)?;
        for block in snapshot.blocks {
            let index = field.grid.to_index(block.position).ok_or_else(|| {
                SimError::Snapshot(format!("block at {} lies outside the field", block.position))
            })?;
            if field.is_occupied(index) {
                return Err(SimError::Snapshot(format!("two blocks share cell {index}")));
            }
            field.place(index, block);
        }
        field.random = SharedRandom::resume(snapshot.random);
        Ok(field)
    }

    /// Capture the grid and the random stream position.
    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            blocks: self.blocks.values().cloned().collect(),
            random: self.random.state(),
        }
    }

    fn place_isolated(&mut self, plane: u32) -> SimResult<()> {
        let w = self.grid.width();
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let y = self.random.below(w);
            let z = self.random.below(w);
            let coord = Coord::new(plane as i32, y as i32, z as i32);
            if let Some(index) = self.free_isolated(coord) {
                self.place(index, Block::new(self.base_value, coord));
                return Ok(());
            }
        }
        Err(SimError::PlacementExhausted {
            plane,
            attempts: MAX_PLACEMENT_ATTEMPTS,
        })
    }

    /// Index of `coord` if it is in the field, empty, and touches nothing.
    fn free_isolated(&self, coord: Coord) -> Option<CellIndex> {
        let index = self.grid.to_index(coord)?;
        (!self.is_occupied(index) && !self.exists_adjacent(coord)).then_some(index)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Position of the shared random stream.
    pub fn random_state(&self) -> RandomState {
        self.random.state()
    }

    /// The block at `index`.
    pub fn get(&self, index: CellIndex) -> Option<&Block> {
        self.blocks.get(&index)
    }

    /// All blocks in index order.
    pub fn iter(&self) -> impl Iterator<Item = (CellIndex, &Block)> {
        self.blocks.iter().map(|(i, b)| (*i, b))
    }

    /// Number of blocks on the field.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the field holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Cells whose blocks `participant` owns, in index order.
    pub fn owned_by(&self, participant: &ParticipantId) -> Vec<CellIndex> {
        self.owned
            .get(participant)
            .map(|cells| cells.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Occupied face neighbours of the block at `index` that are not in
    /// `seen` and match it, in neighbour scan order.
    pub fn get_adjacent(&self, index: CellIndex, seen: &[CellIndex]) -> Vec<CellIndex> {
        let Some(source) = self.blocks.get(&index) else {
            return Vec::new();
        };
        self.grid
            .neighbors(source.position)
            .filter(|i| !seen.contains(i))
            .filter(|i| self.blocks.get(i).is_some_and(|b| source.matches(b)))
            .collect()
    }

    /// The block at `index` and every block reachable from it through
    /// successive matches, in breadth-first order.
    pub fn cluster(&self, index: CellIndex) -> Vec<CellIndex> {
        if !self.is_occupied(index) {
            return Vec::new();
        }
        let mut seen = vec![index];
        let mut queue = VecDeque::from([index]);
        while let Some(current) = queue.pop_front() {
            for next in self.get_adjacent(current, &seen) {
                seen.push(next);
                queue.push_back(next);
            }
        }
        seen
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Validate and commit a push of the block at `index`.
    ///
    /// Rejections stage nothing. On success the feed holds an
    /// ownership-changed event when the push claimed the block, then the
    /// block-moved event and any merge events.
    pub fn request_move(
        &mut self,
        registry: &CubistRegistry,
        index: CellIndex,
        participant: &ParticipantId,
        direction: Direction,
        feed: &mut ChangeFeed,
    ) -> SimResult<MoveOutcome> {
        let Some(block) = self.blocks.get(&index) else {
            return Ok(self.reject(index, participant, MoveRejection::NoBlock));
        };
        let plan = match block.plan_move(&*self, registry, participant, direction) {
            Ok(plan) => plan,
            Err(reason) => return Ok(self.reject(index, participant, reason)),
        };

        let Some(target) = self.grid.to_index(plan.to) else {
            return Ok(self.reject(index, participant, MoveRejection::OutOfBounds));
        };
        self.ensure_relocatable(index, target)?;

        if let Some(owner) = plan.claim {
            self.set_owner(index, Some(owner.clone()));
            feed.stage(ChangeKind::OwnershipChanged {
                at: index,
                owner: Some(owner),
            });
        }
        let merge = self.move_block(index, target, feed)?;
        Ok(MoveOutcome::Moved {
            from: index,
            to: target,
            merge,
        })
    }

    fn reject(
        &self,
        index: CellIndex,
        participant: &ParticipantId,
        reason: MoveRejection,
    ) -> MoveOutcome {
        tracing::trace!(cell = %index, %participant, %reason, "move rejected");
        MoveOutcome::Rejected(reason)
    }

    /// Relocate the block at `old` to `new`, then consolidate around it.
    ///
    /// Fails without mutating anything if `old` is empty or `new` is taken;
    /// either means upstream arbitration is broken.
    pub fn move_block(
        &mut self,
        old: CellIndex,
        new: CellIndex,
        feed: &mut ChangeFeed,
    ) -> SimResult<Option<MergeSummary>> {
        self.ensure_relocatable(old, new)?;
        let coord = self.grid.coord_of(new)?;
        let mut block = self.take(old).ok_or(SimError::MissingBlock(old))?;
        block.position = coord;
        self.place(new, block);
        feed.stage(ChangeKind::BlockMoved { from: old, to: new });
        self.consolidate(new, feed)
    }

    fn ensure_relocatable(&self, old: CellIndex, new: CellIndex) -> SimResult<()> {
        if !self.is_occupied(old) {
            tracing::error!(cell = %old, "relocation from an empty cell");
            return Err(SimError::MissingBlock(old));
        }
        if self.is_occupied(new) {
            tracing::error!(cell = %new, "relocation onto an occupied cell");
            return Err(SimError::CellOccupied(new));
        }
        Ok(())
    }

    /// Merge the block that just landed at `at` with its matching neighbours.
    ///
    /// Matches are paired in neighbour scan order. The mover and every paired
    /// neighbour are consumed; each pair yields one block of triple value,
    /// the first on the mover's cell and the rest on the first cell of their
    /// pair. An odd leftover is moved to a fresh isolated cell.
    fn consolidate(
        &mut self,
        at: CellIndex,
        feed: &mut ChangeFeed,
    ) -> SimResult<Option<MergeSummary>> {
        let Some(value) = self.blocks.get(&at).map(|b| b.value) else {
            return Ok(None);
        };
        let matches = self.get_adjacent(at, &[at]);
        if matches.len() < 2 {
            return Ok(None);
        }

        let pairs: Vec<&[CellIndex]> = matches.chunks_exact(2).collect();
        let leftover = matches.chunks_exact(2).remainder().first().copied();

        let consumed: Vec<CellIndex> = iter::once(at)
            .chain(pairs.iter().flat_map(|p| p.iter().copied()))
            .collect();
        let produced: Vec<CellIndex> = iter::once(at)
            .chain(pairs.iter().skip(1).map(|p| p[0]))
            .collect();
        let placements = produced
            .iter()
            .map(|cell| self.grid.coord_of(*cell).map(|c| (*cell, c)))
            .collect::<Result<Vec<_>, _>>()?;

        for cell in &consumed {
            self.take(*cell);
            feed.stage(ChangeKind::BlockRemoved { at: *cell });
        }

        let product = value.tripled();
        for (cell, coord) in placements {
            self.place(cell, Block::new(product, coord));
            feed.stage(ChangeKind::BlockAdded {
                at: cell,
                value: product,
            });
        }

        let relocated = leftover.map(|cell| self.relocate_leftover(cell, feed));

        tracing::debug!(
            cell = %at,
            %value,
            %product,
            consumed = consumed.len(),
            produced = produced.len(),
            "blocks consolidated"
        );
        Ok(Some(MergeSummary {
            value,
            product,
            consumed,
            produced,
            relocated,
        }))
    }

    fn relocate_leftover(&mut self, from: CellIndex, feed: &mut ChangeFeed) -> Relocation {
        let Some(mut block) = self.take(from) else {
            return Relocation::Dropped { from };
        };
        if block.owner.take().is_some() {
            feed.stage(ChangeKind::OwnershipChanged {
                at: from,
                owner: None,
            });
        }

        match self.find_free_cell() {
            Some((to, coord)) => {
                block.position = coord;
                self.place(to, block);
                feed.stage(ChangeKind::BlockMoved { from, to });
                Relocation::Moved { from, to }
            }
            None => {
                tracing::warn!(cell = %from, "no isolated cell left, dropping leftover block");
                feed.stage(ChangeKind::BlockRemoved { at: from });
                Relocation::Dropped { from }
            }
        }
    }

    /// Pick a random column and scan upward in z for a free isolated cell,
    /// retrying a bounded number of columns before scanning the whole field.
    fn find_free_cell(&mut self) -> Option<(CellIndex, Coord)> {
        let w = self.grid.width();
        for _ in 0..RELOCATION_ATTEMPTS {
            let x = self.random.below(w) as i32;
            let y = self.random.below(w) as i32;
            let found = (0..w as i32)
                .map(|z| Coord::new(x, y, z))
                .find_map(|c| self.free_isolated(c).map(|i| (i, c)));
            if found.is_some() {
                return found;
            }
        }
        (0..self.grid.cell_count())
            .filter_map(|raw| self.grid.from_index(CellIndex(raw)))
            .find_map(|c| self.free_isolated(c).map(|i| (i, c)))
    }

    /// Clear every claim held by `participant`, staging one
    /// ownership-changed event per block. Returns the affected cells.
    pub fn release_owner(
        &mut self,
        participant: &ParticipantId,
        feed: &mut ChangeFeed,
    ) -> Vec<CellIndex> {
        let Some(cells) = self.owned.remove(participant) else {
            return Vec::new();
        };
        for cell in &cells {
            if let Some(block) = self.blocks.get_mut(cell) {
                block.owner = None;
            }
            feed.stage(ChangeKind::OwnershipChanged {
                at: *cell,
                owner: None,
            });
        }
        cells.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Cell bookkeeping. Every grid write goes through these three so the
    // ownership index never drifts from the blocks.
    // -----------------------------------------------------------------------

    fn place(&mut self, index: CellIndex, block: Block) {
        if let Some(owner) = &block.owner {
            self.owned.entry(owner.clone()).or_default().insert(index);
        }
        self.blocks.insert(index, block);
    }

    fn take(&mut self, index: CellIndex) -> Option<Block> {
        let block = self.blocks.remove(&index)?;
        if let Some(owner) = &block.owner {
            self.unindex_owner(owner, index);
        }
        Some(block)
    }

    fn set_owner(&mut self, index: CellIndex, owner: Option<ParticipantId>) {
        let Some(previous) = self.blocks.get_mut(&index).map(|b| b.owner.take()) else {
            return;
        };
        if let Some(previous) = previous {
            self.unindex_owner(&previous, index);
        }
        if let Some(owner) = owner {
            self.owned.entry(owner.clone()).or_default().insert(index);
            if let Some(block) = self.blocks.get_mut(&index) {
                block.owner = Some(owner);
            }
        }
    }

    fn unindex_owner(&mut self, owner: &ParticipantId, index: CellIndex) {
        if let Some(cells) = self.owned.get_mut(owner) {
            cells.remove(&index);
            if cells.is_empty() {
                self.owned.remove(owner);
            }
        }
    }

    /// Put a block on the grid directly. Test fixtures only.
    #[cfg(test)]
    pub(crate) fn insert(&mut self, block: Block) -> CellIndex {
        let index = self.grid.to_index(block.position).expect("fixture in field");
        assert!(!self.is_occupied(index), "fixture cell {index} taken");
        self.place(index, block);
        index
    }
}
