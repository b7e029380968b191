use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Action, Cell, config::ExplorationConfig, q_table::QTable};

/// Trait defining how an action is picked during training.
pub trait Policy {
    /// Chooses the next action for an agent standing on `cell`.
    /// `&mut self` lets the policy advance its own random state.
    fn choose_action(&mut self, epoch: usize, cell: Cell, q_table: &QTable) -> Action;

    /// Probability of a random action during `epoch`, for reporting.
    fn exploration_rate(&self, _epoch: usize) -> f64 {
        0.0
    }
}

/// Exploration rate as a function of the epoch index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    floor: f64,
    decay_per_epoch: f64,
}

impl EpsilonSchedule {
    pub fn new(floor: f64, decay_per_epoch: f64) -> Self {
        Self {
            floor,
            decay_per_epoch,
        }
    }

    /// `max(floor, 1 - epoch * decay)`
    pub fn epsilon(&self, epoch: usize) -> f64 {
        (1.0 - epoch as f64 * self.decay_per_epoch).max(self.floor)
    }
}

impl From<ExplorationConfig> for EpsilonSchedule {
    fn from(config: ExplorationConfig) -> Self {
        Self::new(config.epsilon_floor, config.decay_per_epoch)
    }
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        ExplorationConfig::default().into()
    }
}

/// Explores with probability epsilon, otherwise follows the Q-table greedily.
#[derive(Debug)]
pub struct EpsilonGreedy {
    schedule: EpsilonSchedule,
    rng: StdRng,
}

impl EpsilonGreedy {
    pub fn new(schedule: EpsilonSchedule, seed: u64) -> Self {
        Self {
            schedule,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy(schedule: EpsilonSchedule) -> Self {
        Self {
            schedule,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn schedule(&self) -> &EpsilonSchedule {
        &self.schedule
    }
}

impl Policy for EpsilonGreedy {
    fn choose_action(&mut self, epoch: usize, cell: Cell, q_table: &QTable) -> Action {
        let draw: f64 = self.rng.random();
        if draw < self.schedule.epsilon(epoch) {
            Action::ALL[self.rng.random_range(0..Action::ALL.len())]
        } else {
            q_table.greedy_action(cell)
        }
    }

    fn exploration_rate(&self, epoch: usize) -> f64 {
        self.schedule.epsilon(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;

    #[test]
    fn test_epsilon_schedule() {
        let schedule = EpsilonSchedule::default();
        assert!((schedule.epsilon(1) - 0.99).abs() < 1e-12);
        assert!((schedule.epsilon(50) - 0.5).abs() < 1e-12);
        assert_eq!(schedule.epsilon(100), 0.1);
        assert_eq!(schedule.epsilon(1000), 0.1);
    }

    #[test]
    fn test_epsilon_is_non_increasing() {
        let schedule = EpsilonSchedule::new(0.05, 0.02);
        let mut last = schedule.epsilon(0);
        for epoch in 1..200 {
            let eps = schedule.epsilon(epoch);
            assert!(eps <= last);
            assert!(eps >= 0.05);
            last = eps;
        }
    }

    #[test]
    fn test_exploitation_follows_q_table() {
        // Floor 0 and full decay: never explores after epoch 1.
        let mut policy = EpsilonGreedy::new(EpsilonSchedule::new(0.0, 1.0), 7);
        let mut q_table = QTable::new(2, 2, LearningConfig::default());
        let cell = Cell::new(1, 1);
        q_table.update(cell, Action::Left, 10, cell);
        for _ in 0..50 {
            assert_eq!(policy.choose_action(5, cell, &q_table), Action::Left);
        }
    }

    #[test]
    fn test_full_exploration_covers_all_actions() {
        let mut policy = EpsilonGreedy::new(EpsilonSchedule::new(1.0, 0.0), 11);
        let q_table = QTable::new(1, 1, LearningConfig::default());
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[policy.choose_action(1, Cell::new(0, 0), &q_table).index()] = true;
        }
        assert_eq!(seen, [true; 4]);
    }

    #[test]
    fn test_same_seed_same_choices() {
        let q_table = QTable::new(3, 3, LearningConfig::default());
        let mut a = EpsilonGreedy::new(EpsilonSchedule::default(), 123);
        let mut b = EpsilonGreedy::new(EpsilonSchedule::default(), 123);
        for epoch in 1..40 {
            let cell = Cell::new(epoch % 3, epoch % 2);
            assert_eq!(
                a.choose_action(epoch, cell, &q_table),
                b.choose_action(epoch, cell, &q_table)
            );
        }
    }
}
