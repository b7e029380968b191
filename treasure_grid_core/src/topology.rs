//! Static board description: dimensions, walls and treasure locations.
//!
//! Walls live on the edges between cells rather than inside them. A wall
//! segment joins two neighbouring lattice points, where lattice point
//! `(r, c)` is the top-left corner of cell `(r, c)`. A segment
//! `(r, c)-(r, c + 1)` is therefore the top edge of cell `(r, c)` and a
//! segment `(r, c)-(r + 1, c)` is its left edge.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Action, Cell};

/// Represents errors that can occur while building a topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("Board must have at least one row and one column, got ({rows}, {cols})")]
    EmptyBoard { rows: usize, cols: usize },
    #[error("Wall from {start} to {end} is neither horizontal nor vertical")]
    SkewedWall { start: Cell, end: Cell },
    #[error("Wall from {start} to {end} leaves the ({rows}, {cols}) board outline")]
    WallOutOfBounds {
        start: Cell,
        end: Cell,
        rows: usize,
        cols: usize,
    },
    #[error("Treasure {cell} is out of bounds for board size ({rows}, {cols})")]
    TreasureOutOfBounds { cell: Cell, rows: usize, cols: usize },
    #[error("Treasure {cell} is listed more than once")]
    DuplicateTreasure { cell: Cell },
}

/// A straight wall given by two corner points sharing a row or a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Cell, Cell)", into = "(Cell, Cell)")]
pub struct WallRect {
    pub start: Cell,
    pub end: Cell,
}

impl WallRect {
    pub const fn new(start: Cell, end: Cell) -> Self {
        WallRect { start, end }
    }

    /// Expands the wall into its unit segments.
    pub fn segments(&self) -> Result<Vec<WallSegment>, TopologyError> {
        let (start, end) = (self.start, self.end);
        if start.row == end.row {
            let row = start.row;
            Ok((start.col.min(end.col)..start.col.max(end.col))
                .map(|col| WallSegment::ordered(Cell::new(row, col), Cell::new(row, col + 1)))
                .collect())
        } else if start.col == end.col {
            let col = start.col;
            Ok((start.row.min(end.row)..start.row.max(end.row))
                .map(|row| WallSegment::ordered(Cell::new(row, col), Cell::new(row + 1, col)))
                .collect())
        } else {
            Err(TopologyError::SkewedWall { start, end })
        }
    }
}

impl From<(Cell, Cell)> for WallRect {
    fn from((start, end): (Cell, Cell)) -> Self {
        WallRect { start, end }
    }
}

impl From<WallRect> for (Cell, Cell) {
    fn from(rect: WallRect) -> Self {
        (rect.start, rect.end)
    }
}

/// An impassable unit edge between two lattice points one step apart.
///
/// The pair is unordered; the constructor stores it with the smaller point first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallSegment {
    a: Cell,
    b: Cell,
}

impl WallSegment {
    /// Builds a segment from two points one unit apart, in either order.
    pub fn between(p: Cell, q: Cell) -> Option<Self> {
        p.is_adjacent(q).then(|| Self::ordered(p, q))
    }

    fn ordered(p: Cell, q: Cell) -> Self {
        if p <= q {
            WallSegment { a: p, b: q }
        } else {
            WallSegment { a: q, b: p }
        }
    }

    /// The two end points, smaller first.
    pub fn endpoints(&self) -> (Cell, Cell) {
        (self.a, self.b)
    }

    /// True if the segment runs along a row (a top edge of a cell).
    pub fn is_horizontal(&self) -> bool {
        self.a.row == self.b.row
    }

    /// The wall segment a one-step move between two adjacent cells would cross.
    fn crossed_by(current: Cell, next: Cell) -> Self {
        if current.col == next.col {
            let row = current.row.max(next.row);
            Self::ordered(Cell::new(row, current.col), Cell::new(row, current.col + 1))
        } else {
            let col = current.col.max(next.col);
            Self::ordered(Cell::new(current.row, col), Cell::new(current.row + 1, col))
        }
    }
}

/// Static description of the board.
#[derive(Debug, Clone)]
pub struct GridTopology {
    rows: usize,
    cols: usize,
    treasures: Vec<Cell>,
    treasure_index: HashMap<Cell, usize>,
    walls: HashSet<WallSegment>,
    /// Derived segments in declaration order, without duplicates.
    segments: Vec<WallSegment>,
}

impl GridTopology {
    /// Builds a topology, expanding every wall into unit segments.
    ///
    /// Fails if the board is empty, a wall is not axis-aligned or leaves the
    /// board outline, or a treasure is off the board or repeated.
    pub fn new(
        rows: usize,
        cols: usize,
        treasures: Vec<Cell>,
        walls: &[WallRect],
    ) -> Result<Self, TopologyError> {
        if rows == 0 || cols == 0 {
            return Err(TopologyError::EmptyBoard { rows, cols });
        }

        let mut treasure_index = HashMap::with_capacity(treasures.len());
        for (index, &cell) in treasures.iter().enumerate() {
            if cell.row >= rows || cell.col >= cols {
                return Err(TopologyError::TreasureOutOfBounds { cell, rows, cols });
            }
            if treasure_index.insert(cell, index).is_some() {
                return Err(TopologyError::DuplicateTreasure { cell });
            }
        }

        let mut wall_set = HashSet::new();
        let mut segments = Vec::new();
        for rect in walls {
            let expanded = rect.segments()?;
            let outside = |p: Cell| p.row > rows || p.col > cols;
            if outside(rect.start) || outside(rect.end) {
                return Err(TopologyError::WallOutOfBounds {
                    start: rect.start,
                    end: rect.end,
                    rows,
                    cols,
                });
            }
            for segment in expanded {
                if wall_set.insert(segment) {
                    segments.push(segment);
                }
            }
        }

        tracing::debug!(
            rows,
            cols,
            treasures = treasures.len(),
            wall_segments = segments.len(),
            "built grid topology"
        );

        Ok(GridTopology {
            rows,
            cols,
            treasures,
            treasure_index,
            walls: wall_set,
            segments,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_in_bounds(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// The ordered treasure set.
    pub fn treasures(&self) -> &[Cell] {
        &self.treasures
    }

    /// Position of `cell` in the treasure set, if it holds a treasure.
    pub fn treasure_index(&self, cell: Cell) -> Option<usize> {
        self.treasure_index.get(&cell).copied()
    }

    /// Every derived wall segment, in the order the walls were declared.
    pub fn wall_segments(&self) -> &[WallSegment] {
        &self.segments
    }

    /// Iterates over all board cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Cell::new(row, col)))
    }

    /// Draws a cell uniformly over the whole board, ignoring walls and treasures.
    pub fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Cell {
        let row = rng.random_range(0..self.rows);
        let col = rng.random_range(0..self.cols);
        Cell::new(row, col)
    }

    /// Returns true if a wall separates the two cells.
    ///
    /// # Panics
    ///
    /// Panics if the cells are not 4-adjacent.
    pub fn has_wall_between(&self, a: Cell, b: Cell) -> bool {
        assert!(
            a.is_adjacent(b),
            "wall lookup between non-adjacent cells {} and {}",
            a,
            b
        );
        self.walls.contains(&WallSegment::crossed_by(a, b))
    }

    /// Decides whether a one-step move from `current` to `next` is allowed.
    ///
    /// A move is illegal when `next` is off the board or a wall lies on the
    /// shared edge.
    ///
    /// # Panics
    ///
    /// Panics if `next` is not 4-adjacent to `current`.
    pub fn is_legal(&self, current: Cell, next: Cell) -> bool {
        assert!(
            current.is_adjacent(next),
            "move from {} to {} is not a single orthogonal step",
            current,
            next
        );
        if !self.is_in_bounds(next) {
            return false;
        }
        !self.walls.contains(&WallSegment::crossed_by(current, next))
    }

    /// Applies `action` from `current`, returning the cell the agent ends up in.
    ///
    /// Illegal moves leave the agent where it was.
    pub fn resolve_move(&self, current: Cell, action: Action) -> Cell {
        match current.step(action) {
            Some(next) if self.is_legal(current, next) => next,
            _ => current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(a: (usize, usize), b: (usize, usize)) -> WallSegment {
        WallSegment::between(a.into(), b.into()).unwrap()
    }

    fn open_board(rows: usize, cols: usize, walls: &[WallRect]) -> GridTopology {
        GridTopology::new(rows, cols, vec![], walls).unwrap()
    }

    #[test]
    fn test_vertical_wall_expansion() {
        let rect = WallRect::new(Cell::new(0, 4), Cell::new(4, 4));
        let segments = rect.segments().unwrap();
        assert_eq!(
            segments,
            vec![
                seg((0, 4), (1, 4)),
                seg((1, 4), (2, 4)),
                seg((2, 4), (3, 4)),
                seg((3, 4), (4, 4)),
            ]
        );
    }

    #[test]
    fn test_horizontal_wall_expansion_ignores_corner_order() {
        let forward = WallRect::new(Cell::new(7, 0), Cell::new(7, 3)).segments().unwrap();
        let backward = WallRect::new(Cell::new(7, 3), Cell::new(7, 0)).segments().unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 3);
        assert!(forward.iter().all(|s| s.is_horizontal()));
    }

    #[test]
    fn test_skewed_wall_is_rejected() {
        let err = GridTopology::new(
            5,
            5,
            vec![],
            &[WallRect::new(Cell::new(0, 0), Cell::new(2, 3))],
        )
        .unwrap_err();
        assert!(matches!(err, TopologyError::SkewedWall { .. }));
    }

    #[test]
    fn test_wall_may_run_along_outline() {
        let topology = open_board(10, 10, &[WallRect::new(Cell::new(6, 5), Cell::new(10, 5))]);
        assert_eq!(topology.wall_segments().len(), 4);
    }

    #[test]
    fn test_wall_outside_outline_is_rejected() {
        let err = GridTopology::new(
            3,
            3,
            vec![],
            &[WallRect::new(Cell::new(0, 5), Cell::new(2, 5))],
        )
        .unwrap_err();
        assert!(matches!(err, TopologyError::WallOutOfBounds { .. }));
    }

    #[test]
    fn test_bad_treasures_are_rejected() {
        let err = GridTopology::new(3, 3, vec![Cell::new(3, 0)], &[]).unwrap_err();
        assert!(matches!(err, TopologyError::TreasureOutOfBounds { .. }));
        let err = GridTopology::new(3, 3, vec![Cell::new(1, 1), Cell::new(1, 1)], &[]).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateTreasure { cell: Cell::new(1, 1) });
        let err = GridTopology::new(0, 3, vec![], &[]).unwrap_err();
        assert!(matches!(err, TopologyError::EmptyBoard { .. }));
    }

    #[test]
    fn test_overlapping_walls_are_deduplicated() {
        let topology = open_board(
            5,
            5,
            &[
                WallRect::new(Cell::new(2, 0), Cell::new(2, 3)),
                WallRect::new(Cell::new(2, 2), Cell::new(2, 4)),
            ],
        );
        assert_eq!(topology.wall_segments().len(), 4);
    }

    #[test]
    fn test_out_of_bounds_moves_are_illegal() {
        let topology = open_board(3, 3, &[]);
        assert!(!topology.is_legal(Cell::new(2, 2), Cell::new(3, 2)));
        assert!(!topology.is_legal(Cell::new(2, 2), Cell::new(2, 3)));
        assert!(topology.is_legal(Cell::new(1, 1), Cell::new(0, 1)));
        assert_eq!(topology.resolve_move(Cell::new(0, 0), Action::Up), Cell::new(0, 0));
        assert_eq!(topology.resolve_move(Cell::new(0, 0), Action::Left), Cell::new(0, 0));
    }

    #[test]
    fn test_vertical_wall_blocks_both_directions() {
        // Left edge of column 4 for rows 0..4.
        let topology = open_board(10, 10, &[WallRect::new(Cell::new(0, 4), Cell::new(4, 4))]);
        for row in 0..4 {
            let west = Cell::new(row, 3);
            let east = Cell::new(row, 4);
            assert!(!topology.is_legal(west, east));
            assert!(!topology.is_legal(east, west));
            assert!(topology.has_wall_between(west, east));
        }
        assert!(topology.is_legal(Cell::new(4, 3), Cell::new(4, 4)));
        assert!(topology.is_legal(Cell::new(0, 4), Cell::new(1, 4)));
    }

    #[test]
    fn test_horizontal_wall_blocks_both_directions() {
        // Top edge of row 4 for columns 0..1.
        let topology = open_board(10, 10, &[WallRect::new(Cell::new(4, 0), Cell::new(4, 1))]);
        let above = Cell::new(3, 0);
        let below = Cell::new(4, 0);
        assert!(!topology.is_legal(above, below));
        assert!(!topology.is_legal(below, above));
        assert!(topology.is_legal(Cell::new(3, 1), Cell::new(4, 1)));
        assert!(topology.is_legal(below, Cell::new(5, 0)));
    }

    #[test]
    fn test_legality_is_symmetric_on_reference_board() {
        let config = crate::config::BoardConfig::default();
        let topology = config.build_topology().unwrap();
        for cell in topology.cells() {
            for action in Action::ALL {
                let Some(next) = cell.step(action) else { continue };
                if !topology.is_in_bounds(next) {
                    continue;
                }
                assert_eq!(topology.is_legal(cell, next), topology.is_legal(next, cell));
            }
        }
    }

    #[test]
    #[should_panic(expected = "not a single orthogonal step")]
    fn test_diagonal_move_panics() {
        let topology = open_board(3, 3, &[]);
        topology.is_legal(Cell::new(0, 0), Cell::new(1, 1));
    }

    #[test]
    #[should_panic(expected = "not a single orthogonal step")]
    fn test_zero_move_panics() {
        let topology = open_board(3, 3, &[]);
        topology.is_legal(Cell::new(1, 1), Cell::new(1, 1));
    }

    #[test]
    fn test_random_cell_stays_on_board() {
        use rand::{SeedableRng, rngs::StdRng};

        let topology = open_board(4, 7, &[]);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..500 {
            assert!(topology.is_in_bounds(topology.random_cell(&mut rng)));
        }
        assert_eq!(topology.cells().count(), 28);
    }
}
