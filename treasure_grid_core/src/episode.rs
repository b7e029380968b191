use serde::{Deserialize, Serialize};

use crate::{Action, Cell, Reward, topology::GridTopology};

/// Reward for landing on a treasure that has not been collected yet.
pub const TREASURE_REWARD: Reward = 10;
/// Cost of every other step, blocked moves included.
pub const STEP_PENALTY: Reward = -1;

/// Mutable state of one in-flight episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeState {
    agent: Cell,
    collected: Vec<bool>,
    terminal: bool,
}

/// What happened during a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub action: Action,
    pub from: Cell,
    pub to: Cell,
    pub reward: Reward,
    /// Index of the treasure picked up on this step, if any.
    pub collected: Option<usize>,
    pub terminal: bool,
}

impl StepOutcome {
    /// False when a wall or the board edge blocked the move.
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

impl EpisodeState {
    /// Starts an episode at `start` with every treasure of `topology` still on the board.
    pub fn new(start: Cell, topology: &GridTopology) -> Self {
        EpisodeState {
            agent: start,
            collected: vec![false; topology.treasures().len()],
            terminal: false,
        }
    }

    #[inline]
    pub fn agent(&self) -> Cell {
        self.agent
    }

    /// Collection flags, indexed like the topology's treasure set.
    pub fn collected(&self) -> &[bool] {
        &self.collected
    }

    pub fn collected_count(&self) -> usize {
        self.collected.iter().filter(|c| **c).count()
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Reward for the agent's current cell, evaluated before collection.
    pub fn reward(&self, topology: &GridTopology) -> Reward {
        match topology.treasure_index(self.agent) {
            Some(index) if !self.collected[index] => TREASURE_REWARD,
            _ => STEP_PENALTY,
        }
    }

    /// Flags the treasure under the agent as collected.
    ///
    /// Returns its index if this call collected it.
    fn collect(&mut self, topology: &GridTopology) -> Option<usize> {
        let index = topology.treasure_index(self.agent)?;
        if self.collected[index] {
            return None;
        }
        self.collected[index] = true;
        Some(index)
    }

    fn refresh_terminal(&mut self) {
        self.terminal = self.collected.iter().all(|c| *c);
    }

    /// Advances the episode by one step.
    ///
    /// Moves the agent if the move is legal, scores the resulting cell,
    /// collects any fresh treasure and recomputes the terminal flag.
    /// Returns `None` without touching anything once the episode is terminal.
    pub fn step(&mut self, action: Action, topology: &GridTopology) -> Option<StepOutcome> {
        if self.terminal {
            return None;
        }

        let from = self.agent;
        self.agent = topology.resolve_move(from, action);

        let reward = self.reward(topology);
        let collected = self.collect(topology);
        self.refresh_terminal();

        Some(StepOutcome {
            action,
            from,
            to: self.agent,
            reward,
            collected,
            terminal: self.terminal,
        })
    }
}
