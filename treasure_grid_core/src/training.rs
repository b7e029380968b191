//! Epoch / episode / step orchestration.

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{
    config::{ConfigError, LearningConfig, ScheduleConfig, TrainingConfig},
    episode::EpisodeState,
    policy::{EpsilonGreedy, EpsilonSchedule, Policy},
    q_table::QTable,
    topology::GridTopology,
};

/// Read-only snapshot handed to renderers before every step.
#[derive(Debug)]
pub struct EpisodeView<'a> {
    pub topology: &'a GridTopology,
    pub state: &'a EpisodeState,
    pub epoch: usize,
    pub episode: usize,
    /// Steps already taken in this episode.
    pub step: usize,
    pub total_reward: i64,
    pub epsilon: f64,
}

/// Result of one finished episode, as recorded in the reward history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub epoch: usize,
    pub episode: usize,
    pub total_reward: i64,
    pub steps: usize,
    /// True if every treasure was collected before the step cap.
    pub solved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub epsilon: f64,
    pub episodes: usize,
    pub mean_reward: f64,
    pub solved: usize,
}

/// How a call to [`Trainer::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingOutcome {
    Completed,
    /// A stop was requested part-way through this episode; it was not recorded.
    Cancelled { epoch: usize, episode: usize },
}

/// Hooks for the collaborators around the training loop.
///
/// None of them can touch the episode state or the Q-table.
pub trait TrainingObserver {
    /// Called once before every step.
    fn render(&mut self, _view: &EpisodeView<'_>) {}

    /// Polled once before every step; returning true ends training at once.
    fn stop_requested(&mut self) -> bool;

    /// Receives each finished episode, in order.
    fn on_episode_end(&mut self, _summary: &EpisodeSummary) {}

    fn on_epoch_end(&mut self, _summary: &EpochSummary, _q_table: &QTable) {}
}

/// Observer that never renders and never stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {
    fn stop_requested(&mut self) -> bool {
        false
    }
}

/// Owns the learned table and drives training over epochs and episodes.
#[derive(Debug)]
pub struct Trainer<P = EpsilonGreedy> {
    topology: GridTopology,
    q_table: QTable,
    policy: P,
    schedule: ScheduleConfig,
    /// Start-cell draws.
    rng: StdRng,
    history: Vec<EpisodeSummary>,
}

impl Trainer<EpsilonGreedy> {
    /// Validates `config` and builds a trainer with an epsilon-greedy policy.
    ///
    /// With a seed, start cells use `seed` and exploration uses `seed + 1`.
    pub fn from_config(config: &TrainingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let topology = config.board.build_topology()?;
        let schedule = EpsilonSchedule::from(config.exploration);
        let (policy, rng) = match config.seed {
            Some(seed) => (
                EpsilonGreedy::new(schedule, seed.wrapping_add(1)),
                StdRng::seed_from_u64(seed),
            ),
            None => (EpsilonGreedy::from_entropy(schedule), StdRng::from_os_rng()),
        };
        Ok(Trainer::new(topology, config.learning, config.schedule, policy, rng))
    }
}

impl<P: Policy> Trainer<P> {
    pub fn new(
        topology: GridTopology,
        learning: LearningConfig,
        schedule: ScheduleConfig,
        policy: P,
        rng: StdRng,
    ) -> Self {
        let q_table = QTable::new(topology.rows(), topology.cols(), learning);
        Trainer {
            topology,
            q_table,
            policy,
            schedule,
            rng,
            history: Vec::new(),
        }
    }

    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    /// Every recorded episode, across all epochs.
    pub fn history(&self) -> &[EpisodeSummary] {
        &self.history
    }

    /// Per-episode total rewards, in the order the episodes ran.
    pub fn reward_history(&self) -> Vec<i64> {
        self.history.iter().map(|s| s.total_reward).collect()
    }

    /// Runs every epoch of the schedule.
    ///
    /// The Q-table carries over between episodes and epochs; each episode
    /// starts from a fresh [`EpisodeState`].
    pub fn run<O: TrainingObserver + ?Sized>(&mut self, observer: &mut O) -> TrainingOutcome {
        let ScheduleConfig {
            total_epochs,
            episodes_per_epoch,
            max_steps_per_episode,
        } = self.schedule;
        info!(
            total_epochs,
            episodes_per_epoch,
            max_steps_per_episode,
            treasures = self.topology.treasures().len(),
            "starting training"
        );

        for epoch in 1..=total_epochs {
            let mut reward_sum = 0i64;
            let mut solved = 0usize;

            for episode in 1..=episodes_per_epoch {
                let Some(summary) = self.run_episode(epoch, episode, observer) else {
                    info!(epoch, episode, "training cancelled");
                    return TrainingOutcome::Cancelled { epoch, episode };
                };
                reward_sum += summary.total_reward;
                solved += usize::from(summary.solved);
                self.history.push(summary);
                observer.on_episode_end(&summary);
            }

            let summary = EpochSummary {
                epoch,
                epsilon: self.policy.exploration_rate(epoch),
                episodes: episodes_per_epoch,
                mean_reward: reward_sum as f64 / episodes_per_epoch as f64,
                solved,
            };
            info!(
                epoch,
                epsilon = summary.epsilon,
                mean_reward = summary.mean_reward,
                solved,
                "epoch finished"
            );
            observer.on_epoch_end(&summary, &self.q_table);
        }

        info!(episodes = self.history.len(), "training complete");
        TrainingOutcome::Completed
    }

    /// Plays one episode. Returns `None` if the observer asked to stop.
    fn run_episode<O: TrainingObserver + ?Sized>(
        &mut self,
        epoch: usize,
        episode: usize,
        observer: &mut O,
    ) -> Option<EpisodeSummary> {
        let start = self.topology.random_cell(&mut self.rng);
        let mut state = EpisodeState::new(start, &self.topology);
        let epsilon = self.policy.exploration_rate(epoch);
        let mut total_reward = 0i64;
        let mut steps = 0usize;

        while steps < self.schedule.max_steps_per_episode && !state.is_terminal() {
            observer.render(&EpisodeView {
                topology: &self.topology,
                state: &state,
                epoch,
                episode,
                step: steps,
                total_reward,
                epsilon,
            });
            if observer.stop_requested() {
                return None;
            }

            let action = self
                .policy
                .choose_action(epoch, state.agent(), &self.q_table);
            let Some(outcome) = state.step(action, &self.topology) else {
                break;
            };
            total_reward += i64::from(outcome.reward);
            // Keyed on the cell just arrived in, bootstrapping from that same cell.
            self.q_table
                .update(outcome.to, action, outcome.reward, outcome.to);
            steps += 1;

            trace!(
                ?action,
                from = %outcome.from,
                to = %outcome.to,
                reward = outcome.reward,
                "step"
            );
        }

        let summary = EpisodeSummary {
            epoch,
            episode,
            total_reward,
            steps,
            solved: state.is_terminal(),
        };
        debug!(
            epoch,
            episode,
            %start,
            total_reward,
            steps,
            solved = summary.solved,
            "episode finished"
        );
        Some(summary)
    }
}
