use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CbError, CbResult};

/// Smallest field width the lattice supports.
pub const MIN_WIDTH: u32 = 2;
/// Largest field width the lattice supports (64³ cells fit a `u32` index).
pub const MAX_WIDTH: u32 = 64;

/// Linear address of a cell: `x + y·W + z·W²`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellIndex(pub u32);

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An integer lattice position. Not necessarily inside the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Position along the plane axis.
    pub x: i32,
    /// Position along the second axis.
    pub y: i32,
    /// Position along the depth axis.
    pub z: i32,
}

impl Coord {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The coordinate one step along `direction`. May leave the field.
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six unit face normals a block can be pushed along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 3]", into = "[i32; 3]")]
pub enum Direction {
    /// +x
    PosX,
    /// -x
    NegX,
    /// +y
    PosY,
    /// -y
    NegY,
    /// +z
    PosZ,
    /// -z
    NegZ,
}

impl Direction {
    /// All directions in neighbour scan order.
    pub const ALL: [Direction; 6] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
    ];

    /// The unit vector for this direction.
    pub const fn delta(self) -> (i32, i32, i32) {
        match self {
            Direction::PosX => (1, 0, 0),
            Direction::NegX => (-1, 0, 0),
            Direction::PosY => (0, 1, 0),
            Direction::NegY => (0, -1, 0),
            Direction::PosZ => (0, 0, 1),
            Direction::NegZ => (0, 0, -1),
        }
    }

    /// Parse a raw delta vector, accepting only unit axis vectors.
    pub fn from_delta(dx: i32, dy: i32, dz: i32) -> CbResult<Self> {
        match (dx, dy, dz) {
            (1, 0, 0) => Ok(Direction::PosX),
            (-1, 0, 0) => Ok(Direction::NegX),
            (0, 1, 0) => Ok(Direction::PosY),
            (0, -1, 0) => Ok(Direction::NegY),
            (0, 0, 1) => Ok(Direction::PosZ),
            (0, 0, -1) => Ok(Direction::NegZ),
            _ => Err(CbError::InvalidDirection(dx, dy, dz)),
        }
    }
}

impl TryFrom<[i32; 3]> for Direction {
    type Error = CbError;

    fn try_from(v: [i32; 3]) -> CbResult<Self> {
        Self::from_delta(v[0], v[1], v[2])
    }
}

impl From<Direction> for [i32; 3] {
    fn from(d: Direction) -> Self {
        let (dx, dy, dz) = d.delta();
        [dx, dy, dz]
    }
}

/// Bijective mapping between in-field coordinates and linear cell indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridIndex {
    width: u32,
}

impl GridIndex {
    /// Create the index for a `width`×`width`×`width` field.
    pub fn new(width: u32) -> CbResult<Self> {
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
            return Err(CbError::InvalidWidth(width));
        }
        Ok(Self { width })
    }

    /// Cells along one axis.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Total number of cells in the field.
    pub fn cell_count(&self) -> u32 {
        self.width * self.width * self.width
    }

    /// Whether each axis of `(x, y, z)` lies in `[0, W)`.
    pub fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        let w = self.width as i32;
        (0..w).contains(&x) && (0..w).contains(&y) && (0..w).contains(&z)
    }

    /// Whether `coord` lies inside the field.
    pub fn contains(&self, coord: Coord) -> bool {
        self.in_bounds(coord.x, coord.y, coord.z)
    }

    /// Linear index of `coord`, or `None` when it lies outside the field.
    pub fn to_index(&self, coord: Coord) -> Option<CellIndex> {
        if !self.contains(coord) {
            return None;
        }
        let w = self.width;
        Some(CellIndex(
            coord.x as u32 + coord.y as u32 * w + coord.z as u32 * w * w,
        ))
    }

    /// Coordinate of a linear index, or `None` past the end of the field.
    pub fn from_index(&self, index: CellIndex) -> Option<Coord> {
        if index.0 >= self.cell_count() {
            return None;
        }
        let w = self.width;
        Some(Coord {
            x: (index.0 % w) as i32,
            y: (index.0 / w % w) as i32,
            z: (index.0 / (w * w)) as i32,
        })
    }

    /// Like [`from_index`](Self::from_index) but reports the range error.
    pub fn coord_of(&self, index: CellIndex) -> CbResult<Coord> {
        self.from_index(index).ok_or(CbError::IndexOutOfRange {
            index,
            width: self.width,
        })
    }

    /// In-field face neighbours of `coord`, in [`Direction::ALL`] order.
    pub fn neighbors(&self, coord: Coord) -> impl Iterator<Item = CellIndex> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| self.to_index(coord.step(d)))
    }
}

/// Read access to which cells of a field hold a block.
pub trait Occupancy {
    /// The addressing scheme of the field.
    fn grid(&self) -> &GridIndex;

    /// Whether a block sits at `index`.
    fn is_occupied(&self, index: CellIndex) -> bool;

    /// Whether any face neighbour of `coord` holds a block.
    fn exists_adjacent(&self, coord: Coord) -> bool {
        self.grid().neighbors(coord).any(|i| self.is_occupied(i))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    struct Cells {
        grid: GridIndex,
        occupied: HashSet<CellIndex>,
    }

    impl Occupancy for Cells {
        fn grid(&self) -> &GridIndex {
            &self.grid
        }
        fn is_occupied(&self, index: CellIndex) -> bool {
            self.occupied.contains(&index)
        }
    }

    #[test]
    fn index_formula_matches_layout() {
        let grid = GridIndex::new(9).unwrap();
        assert_eq!(grid.to_index(Coord::new(0, 0, 0)), Some(CellIndex(0)));
        assert_eq!(grid.to_index(Coord::new(1, 0, 0)), Some(CellIndex(1)));
        assert_eq!(grid.to_index(Coord::new(0, 1, 0)), Some(CellIndex(9)));
        assert_eq!(grid.to_index(Coord::new(0, 0, 1)), Some(CellIndex(81)));
        assert_eq!(grid.to_index(Coord::new(4, 4, 4)), Some(CellIndex(364)));
        assert_eq!(grid.to_index(Coord::new(8, 8, 8)), Some(CellIndex(728)));
    }

    #[test]
    fn out_of_bounds_has_no_index() {
        let grid = GridIndex::new(9).unwrap();
        assert_eq!(grid.to_index(Coord::new(-1, 0, 0)), None);
        assert_eq!(grid.to_index(Coord::new(0, 9, 0)), None);
        assert_eq!(grid.to_index(Coord::new(0, 0, 9)), None);
        assert_eq!(grid.from_index(CellIndex(729)), None);
        assert!(grid.coord_of(CellIndex(729)).is_err());
    }

    #[test]
    fn width_limits() {
        assert!(GridIndex::new(1).is_err());
        assert!(GridIndex::new(2).is_ok());
        assert!(GridIndex::new(64).is_ok());
        assert!(GridIndex::new(65).is_err());
    }

    #[test]
    fn corner_has_three_neighbors() {
        let grid = GridIndex::new(9).unwrap();
        let n: Vec<_> = grid.neighbors(Coord::new(0, 0, 0)).collect();
        assert_eq!(n, vec![CellIndex(1), CellIndex(9), CellIndex(81)]);
    }

    #[test]
    fn interior_neighbors_in_scan_order() {
        let grid = GridIndex::new(9).unwrap();
        let centre = grid.to_index(Coord::new(4, 4, 4)).unwrap().0;
        let n: Vec<u32> = grid.neighbors(Coord::new(4, 4, 4)).map(|i| i.0).collect();
        assert_eq!(
            n,
            vec![
                centre + 1,
                centre - 1,
                centre + 9,
                centre - 9,
                centre + 81,
                centre - 81
            ]
        );
    }

    #[test]
    fn neighbor_at_coordinate_one_is_seen() {
        // A block at x=0 touches one at x=1 and the reverse.
        let grid = GridIndex::new(9).unwrap();
        let cells = Cells {
            grid,
            occupied: [CellIndex(0)].into_iter().collect(),
        };
        assert!(cells.exists_adjacent(Coord::new(1, 0, 0)));
        assert!(!cells.exists_adjacent(Coord::new(2, 0, 0)));
        assert!(!cells.exists_adjacent(Coord::new(0, 0, 0)));
    }

    #[test]
    fn direction_parsing() {
        assert_eq!(Direction::from_delta(0, -1, 0).unwrap(), Direction::NegY);
        assert!(Direction::from_delta(1, 1, 0).is_err());
        assert!(Direction::from_delta(0, 0, 0).is_err());
        assert!(Direction::from_delta(2, 0, 0).is_err());
    }

    #[test]
    fn direction_serializes_as_vector() {
        let json = serde_json::to_string(&Direction::NegZ).unwrap();
        assert_eq!(json, "[0,0,-1]");
        let d: Direction = serde_json::from_str("[1,0,0]").unwrap();
        assert_eq!(d, Direction::PosX);
        assert!(serde_json::from_str::<Direction>("[1,0,1]").is_err());
    }

    proptest! {
        #[test]
        fn index_round_trips(w in 2u32..=16, x in 0i32..16, y in 0i32..16, z in 0i32..16) {
            let grid = GridIndex::new(w).unwrap();
            let c = Coord::new(x, y, z);
            match grid.to_index(c) {
                Some(i) => prop_assert_eq!(grid.from_index(i), Some(c)),
                None => prop_assert!(!grid.contains(c)),
            }
        }

        #[test]
        fn every_index_maps_back(w in 2u32..=12, raw in 0u32..1728) {
            let grid = GridIndex::new(w).unwrap();
            let index = CellIndex(raw);
            if let Some(c) = grid.from_index(index) {
                prop_assert_eq!(grid.to_index(c), Some(index));
            } else {
                prop_assert!(raw >= grid.cell_count());
            }
        }
    }
}
