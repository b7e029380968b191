use treasure_grid_core::{
    Action, Cell,
    config::{BoardConfig, ScheduleConfig, TrainingConfig},
    training::{EpisodeSummary, EpisodeView, NoopObserver, Trainer, TrainingObserver, TrainingOutcome},
};

fn seeded(seed: u64, epochs: usize, episodes: usize, steps: usize) -> TrainingConfig {
    TrainingConfig {
        seed: Some(seed),
        schedule: ScheduleConfig {
            total_epochs: epochs,
            episodes_per_epoch: episodes,
            max_steps_per_episode: steps,
        },
        ..TrainingConfig::default()
    }
}

#[test]
fn same_seed_gives_identical_histories() {
    let config = seeded(2024, 2, 10, 150);

    let mut first = Trainer::from_config(&config).unwrap();
    let mut second = Trainer::from_config(&config).unwrap();
    assert_eq!(first.run(&mut NoopObserver), TrainingOutcome::Completed);
    assert_eq!(second.run(&mut NoopObserver), TrainingOutcome::Completed);

    assert_eq!(first.reward_history().len(), 20);
    assert_eq!(first.reward_history(), second.reward_history());
    assert_eq!(first.history(), second.history());
    assert_eq!(first.q_table(), second.q_table());
}

#[test]
fn learns_to_step_onto_adjacent_treasure() {
    let config = TrainingConfig {
        board: BoardConfig {
            rows: 2,
            cols: 1,
            treasures: vec![Cell::new(0, 0)],
            walls: vec![],
        },
        ..seeded(42, 5, 20, 50)
    };
    let mut trainer = Trainer::from_config(&config).unwrap();
    trainer.run(&mut NoopObserver);

    let q_table = trainer.q_table();
    let beside = Cell::new(1, 0);
    let toward = q_table.value(beside, Action::Up);
    for other in [Action::Down, Action::Left, Action::Right] {
        assert!(
            toward > q_table.value(beside, other),
            "up={toward} vs {other:?}={}",
            q_table.value(beside, other)
        );
    }
    assert_eq!(q_table.greedy_action(beside), Action::Up);
    assert!(trainer.history().iter().all(|s| s.solved));
}

/// Checks per-step invariants on every snapshot the trainer hands out.
#[derive(Default)]
struct InvariantChecker {
    last_collected: Vec<bool>,
    renders: usize,
    episodes: Vec<EpisodeSummary>,
}

impl TrainingObserver for InvariantChecker {
    fn render(&mut self, view: &EpisodeView<'_>) {
        self.renders += 1;
        let collected = view.state.collected();
        assert_eq!(collected.len(), view.topology.treasures().len());
        assert!(view.topology.is_in_bounds(view.state.agent()));
        // Rendering only happens while the episode is still running.
        assert!(!view.state.is_terminal());
        assert!(!collected.iter().all(|c| *c));

        if view.step == 0 {
            assert!(collected.iter().all(|c| !*c));
            assert_eq!(view.total_reward, 0);
        } else {
            for (before, after) in self.last_collected.iter().zip(collected) {
                assert!(!*before || *after, "treasure flag reverted");
            }
        }
        self.last_collected = collected.to_vec();
    }

    fn stop_requested(&mut self) -> bool {
        false
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        self.episodes.push(*summary);
    }
}

#[test]
fn episodes_respect_step_cap_and_termination() {
    let config = seeded(7, 3, 10, 120);
    let cap = config.schedule.max_steps_per_episode;
    let treasures = config.board.treasures.len() as i64;

    let mut trainer = Trainer::from_config(&config).unwrap();
    let mut checker = InvariantChecker::default();
    assert_eq!(trainer.run(&mut checker), TrainingOutcome::Completed);

    assert_eq!(checker.episodes, trainer.history());
    assert_eq!(checker.episodes.len(), 30);
    let total_steps: usize = checker.episodes.iter().map(|s| s.steps).sum();
    assert_eq!(checker.renders, total_steps);

    for summary in &checker.episodes {
        assert!(summary.steps <= cap);
        assert!(summary.steps >= 1);
        if summary.solved {
            // Every treasure paid +10 once; every other step cost 1.
            assert_eq!(
                summary.total_reward,
                10 * treasures - (summary.steps as i64 - treasures)
            );
        } else {
            assert_eq!(summary.steps, cap);
            assert!(summary.total_reward < 11 * treasures);
        }
    }
}

#[test]
fn bundled_configs_load() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../configs");

    let reference = TrainingConfig::from_path(format!("{dir}/reference.json")).unwrap();
    assert_eq!(reference, TrainingConfig::default());

    let two_cells = TrainingConfig::from_path(format!("{dir}/two_cells.json")).unwrap();
    two_cells.validate().unwrap();
    assert_eq!(two_cells.seed, Some(42));
    assert_eq!(two_cells.board.build_topology().unwrap().cells().count(), 2);
}
