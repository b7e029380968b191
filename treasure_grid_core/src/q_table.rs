//! Tabular action-value estimates for every board cell.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Action, Cell, Reward, config::LearningConfig, map::Grid};

/// Value estimates for the four actions of one cell, indexed by [`Action::index`].
pub type ActionValues = [f64; 4];

/// Q-table mapping (cell, action) pairs to learned values.
///
/// Every cell of the board carries an entry for every action from
/// construction on, so lookups never miss and the table never grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: Grid<ActionValues>,
    /// Learning rate β
    learning_rate: f64,
    /// Discount factor α
    discount: f64,
}

impl QTable {
    /// Creates a zero-initialised table for a `rows` x `cols` board.
    pub fn new(rows: usize, cols: usize, learning: LearningConfig) -> Self {
        Self {
            values: Grid::new(rows, cols),
            learning_rate: learning.learning_rate,
            discount: learning.discount,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// All four action values of `cell`.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is off the board.
    pub fn values(&self, cell: Cell) -> &ActionValues {
        &self.values[cell]
    }

    pub fn value(&self, cell: Cell, action: Action) -> f64 {
        self.values[cell][action.index()]
    }

    /// Highest action value available from `cell`.
    pub fn max_value(&self, cell: Cell) -> f64 {
        self.values[cell]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Action with the highest value in `cell`.
    ///
    /// Ties go to the earliest action in [`Action::ALL`].
    pub fn greedy_action(&self, cell: Cell) -> Action {
        let values = &self.values[cell];
        let mut best = Action::ALL[0];
        for action in Action::ALL.into_iter().skip(1) {
            if values[action.index()] > values[best.index()] {
                best = action;
            }
        }
        best
    }

    /// Q-learning update.
    ///
    /// Q(s,a) ← Q(s,a) + β[r + α max_a' Q(s',a') - Q(s,a)]
    pub fn update(&mut self, cell: Cell, action: Action, reward: Reward, next_cell: Cell) {
        let next_max = self.max_value(next_cell);
        let current = self.value(cell, action);
        let target = f64::from(reward) + self.discount * next_max;
        self.values[cell][action.index()] = current + self.learning_rate * (target - current);
    }
}

impl fmt::Display for QTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Q-Table:")?;
        for (cell, values) in self.values.enumerate() {
            write!(f, "State {cell}:")?;
            for action in Action::ALL {
                write!(f, " {}={:.3}", action.name(), values[action.index()])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
