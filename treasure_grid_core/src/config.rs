use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    Cell,
    topology::{GridTopology, TopologyError, WallRect},
};

/// Represents errors raised while loading or checking a training configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Largest board, in cells, a configuration may ask for.
pub const MAX_BOARD_CELLS: usize = 1 << 20;

/// Board layout: size, treasures and walls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub rows: usize,
    pub cols: usize,
    pub treasures: Vec<Cell>,
    pub walls: Vec<WallRect>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let cell = Cell::new;
        let wall = |a: (usize, usize), b: (usize, usize)| WallRect::new(a.into(), b.into());
        Self {
            rows: 10,
            cols: 10,
            treasures: vec![cell(1, 2), cell(1, 4), cell(8, 2), cell(5, 8)],
            walls: vec![
                wall((4, 0), (4, 1)),
                wall((4, 3), (4, 4)),
                wall((0, 4), (4, 4)),
                wall((0, 7), (4, 7)),
                wall((2, 6), (2, 7)),
                wall((6, 5), (6, 6)),
                wall((7, 0), (7, 3)),
                wall((6, 5), (10, 5)),
                wall((5, 8), (10, 8)),
            ],
        }
    }
}

impl BoardConfig {
    pub fn build_topology(&self) -> Result<GridTopology, TopologyError> {
        GridTopology::new(self.rows, self.cols, self.treasures.clone(), &self.walls)
    }
}

/// Q-learning constants, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Learning rate β
    pub learning_rate: f64,
    /// Discount factor α
    pub discount: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.6,
            discount: 0.95,
        }
    }
}

/// Linearly decaying exploration rate, keyed by epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub epsilon_floor: f64,
    /// Subtracted from 1.0 once per epoch.
    pub decay_per_epoch: f64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            epsilon_floor: 0.1,
            decay_per_epoch: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub total_epochs: usize,
    pub episodes_per_epoch: usize,
    pub max_steps_per_episode: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            total_epochs: 3,
            episodes_per_epoch: 30,
            max_steps_per_episode: 400,
        }
    }
}

/// Everything needed to run one training session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub board: BoardConfig,
    pub learning: LearningConfig,
    pub exploration: ExplorationConfig,
    pub schedule: ScheduleConfig,
    /// Seed for start cells and exploration draws; `None` uses OS entropy.
    pub seed: Option<u64>,
}

impl TrainingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Checks numeric ranges and that the board itself builds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let LearningConfig {
            learning_rate,
            discount,
        } = self.learning;
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "learning rate must be in (0, 1], got {learning_rate}"
            )));
        }
        if !(0.0..=1.0).contains(&discount) {
            return Err(ConfigError::Invalid(format!(
                "discount must be in [0, 1], got {discount}"
            )));
        }
        let floor = self.exploration.epsilon_floor;
        if !(0.0..=1.0).contains(&floor) {
            return Err(ConfigError::Invalid(format!(
                "epsilon floor must be in [0, 1], got {floor}"
            )));
        }
        let decay = self.exploration.decay_per_epoch;
        if !(decay >= 0.0 && decay.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "epsilon decay must be a non-negative number, got {decay}"
            )));
        }
        let schedule = self.schedule;
        if schedule.total_epochs == 0
            || schedule.episodes_per_epoch == 0
            || schedule.max_steps_per_episode == 0
        {
            return Err(ConfigError::Invalid(
                "epochs, episodes per epoch and steps per episode must all be positive".to_string(),
            ));
        }
        let BoardConfig { rows, cols, .. } = self.board;
        match rows.checked_mul(cols) {
            Some(cells) if cells <= MAX_BOARD_CELLS => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "board of {rows} x {cols} exceeds the {MAX_BOARD_CELLS} cell limit"
                )));
            }
        }
        self.board.build_topology()?;
        Ok(())
    }
}
