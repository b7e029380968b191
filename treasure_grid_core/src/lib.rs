use serde::{Deserialize, Serialize};

pub mod config;
pub mod episode;
pub mod map;
pub mod policy;
pub mod q_table;
pub mod topology;
pub mod training;

/// Reward handed out for a single step.
pub type Reward = i32;

/// Represents a 2D board coordinate, 0-indexed from the top-left corner.
///
/// Also used for the lattice points that bound wall segments, which range
/// one past the last row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }

    /// Returns the neighbouring cell in the direction of `action`.
    ///
    /// Returns `None` if the step would go above row 0 or left of column 0.
    /// Bounds on the far side are the topology's business.
    pub fn step(self, action: Action) -> Option<Cell> {
        let (dr, dc) = action.delta();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        Some(Cell { row, col })
    }

    /// Returns true if `other` shares an edge with this cell.
    pub fn is_adjacent(self, other: Cell) -> bool {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col) == 1
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Cell { row, col }
    }
}

impl From<Cell> for (usize, usize) {
    fn from(cell: Cell) -> Self {
        (cell.row, cell.col)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Represents the moves the agent can decide to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    /// Every action, in the order used for tie-breaking.
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Position of this action inside [`Action::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
        }
    }

    /// (row, column) displacement of the move.
    #[inline]
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }

    /// Converts a move between two adjacent cells into an Action.
    ///
    /// Returns `None` for identical, diagonal or distant cells.
    pub fn between(from: Cell, to: Cell) -> Option<Action> {
        let dr = to.row as isize - from.row as isize;
        let dc = to.col as isize - from.col as isize;

        match (dr, dc) {
            (-1, 0) => Some(Action::Up),
            (1, 0) => Some(Action::Down),
            (0, -1) => Some(Action::Left),
            (0, 1) => Some(Action::Right),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
        }
    }
}
