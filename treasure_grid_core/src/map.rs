use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Cell;

/// A generic 2D board structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Provides methods for accessing and modifying elements via [`Cell`] coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn new(rows: usize, cols: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = rows.checked_mul(cols).expect("Grid size overflow");
        Grid {
            rows,
            cols,
            cells: vec![T::default(); size],
        }
    }

    /// Converts a cell to a flat vector index.
    ///
    /// Returns `None` if the cell is out of bounds.
    #[inline]
    fn cell_to_index(&self, cell: Cell) -> Option<usize> {
        if self.contains(cell) {
            Some(cell.row * self.cols + cell.col)
        } else {
            None
        }
    }

    #[inline]
    fn index_to_cell(&self, index: usize) -> Cell {
        Cell {
            row: index / self.cols,
            col: index % self.cols,
        }
    }

    /// Checks if the given cell is within the grid boundaries.
    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Returns an iterator that yields `(Cell, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Cell, &T)> {
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, value)| (self.index_to_cell(index), value))
    }
}

/// Indexing using Cell coordinates for access
impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, cell: Cell) -> &Self::Output {
        match self.cell_to_index(cell) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                cell, self.rows, self.cols
            ),
        }
    }
}

/// Indexing using Cell coordinates for mutable access
impl<T> IndexMut<Cell> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, cell: Cell) -> &mut Self::Output {
        let (rows, cols) = (self.rows, self.cols);
        match self.cell_to_index(cell) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                cell, rows, cols
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_is_row_major() {
        let mut grid: Grid<u8> = Grid::new(2, 3);
        grid[Cell::new(1, 0)] = 7;
        let cells: Vec<(Cell, u8)> = grid.enumerate().map(|(c, v)| (c, *v)).collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[2].0, Cell::new(0, 2));
        assert_eq!(cells[3], (Cell::new(1, 0), 7));
    }

    #[test]
    fn test_contains_respects_bounds() {
        let grid: Grid<u8> = Grid::new(2, 3);
        assert!(!grid.contains(Cell::new(2, 0)));
        assert!(!grid.contains(Cell::new(0, 3)));
        assert!(grid.contains(Cell::new(1, 2)));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_panics_out_of_bounds() {
        let grid: Grid<u8> = Grid::new(2, 2);
        let _ = grid[Cell::new(5, 5)];
    }
}
