use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
    crossterm::{
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Rectangle},
        *,
    },
};
use std::{
    fs::File,
    io::{self, BufWriter, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
    time::Duration,
};
use tracing_subscriber::EnvFilter;
use treasure_grid_core::{
    config::TrainingConfig,
    episode::EpisodeState,
    q_table::QTable,
    topology::GridTopology,
    training::{
        EpisodeSummary, EpisodeView, EpochSummary, Trainer, TrainingObserver, TrainingOutcome,
    },
};

#[derive(Parser, Debug)]
#[command(version, about = "Tabular Q-learning on a walled treasure grid", long_about = None)]
struct Args {
    /// Training configuration file (JSON); defaults to the built-in 10x10 board
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Episodes per epoch
    #[arg(long)]
    episodes: Option<usize>,

    /// Step cap per episode
    #[arg(long)]
    max_steps: Option<usize>,

    /// Seed for start cells and exploration
    #[arg(long)]
    seed: Option<u64>,

    /// Learning rate (beta)
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Discount factor (alpha)
    #[arg(long)]
    discount: Option<f64>,

    /// Pause after drawing each step, in milliseconds
    #[arg(long, default_value_t = 1)]
    delay_ms: u64,

    /// Train without the terminal UI
    #[arg(long)]
    headless: bool,

    /// Write the per-episode reward history as JSON
    #[arg(long, value_name = "FILE")]
    rewards_out: Option<PathBuf>,

    /// Print the Q-table after every epoch
    #[arg(long)]
    print_q_table: bool,

    /// Write logs to this file (the UI mode does not log otherwise)
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Loads the config file, if any, and applies command-line overrides.
    fn training_config(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_path(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TrainingConfig::default(),
        };
        if let Some(epochs) = self.epochs {
            config.schedule.total_epochs = epochs;
        }
        if let Some(episodes) = self.episodes {
            config.schedule.episodes_per_epoch = episodes;
        }
        if let Some(max_steps) = self.max_steps {
            config.schedule.max_steps_per_episode = max_steps;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning.learning_rate = learning_rate;
        }
        if let Some(discount) = self.discount {
            config.learning.discount = discount;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = args.training_config()?;
    init_logging(args.log_file.as_deref(), args.headless)?;

    let mut trainer =
        Trainer::from_config(&config).context("Invalid training configuration")?;

    let (outcome, epoch_dumps) = if args.headless {
        run_headless(&mut trainer, args.print_q_table)
    } else {
        run_tui(&mut trainer, &args)?
    };

    for dump in epoch_dumps {
        println!("{dump}");
    }

    match outcome {
        TrainingOutcome::Completed => {
            println!("Training complete!");
            print!("{}", trainer.q_table());
            if let Some(path) = &args.rewards_out {
                write_rewards(path, trainer.history())?;
            }
        }
        TrainingOutcome::Cancelled { epoch, episode } => {
            println!("Training stopped during epoch {epoch}, episode {episode}.");
        }
    }

    Ok(())
}

/// Installs the tracing subscriber. `RUST_LOG` overrides the default `info` level.
fn init_logging(log_file: Option<&Path>, headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        // Logging to the terminal would tear the UI, so it stays off.
        None if headless => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
        None => {}
    }
    Ok(())
}

fn write_rewards(path: &Path, history: &[EpisodeSummary]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create rewards file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), history)
        .with_context(|| format!("Failed to write rewards to {}", path.display()))?;
    tracing::info!(path = %path.display(), episodes = history.len(), "wrote reward history");
    Ok(())
}

/// Prints epoch summaries to stdout; never asks to stop.
struct ConsoleObserver {
    print_q_table: bool,
}

impl TrainingObserver for ConsoleObserver {
    fn stop_requested(&mut self) -> bool {
        false
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary, q_table: &QTable) {
        println!(
            "Epoch {}: epsilon {:.2}, mean reward {:.1}, solved {}/{}",
            summary.epoch, summary.epsilon, summary.mean_reward, summary.solved, summary.episodes
        );
        if self.print_q_table {
            println!("{q_table}");
        }
    }
}

fn run_headless(
    trainer: &mut Trainer,
    print_q_table: bool,
) -> (TrainingOutcome, Vec<String>) {
    let outcome = trainer.run(&mut ConsoleObserver { print_q_table });
    (outcome, Vec::new())
}

/// Renders every step and polls the keyboard for a quit request.
struct TuiObserver<'t> {
    terminal: &'t mut Terminal<CrosstermBackend<Stdout>>,
    delay: Duration,
    /// (episode index, total reward) points for the chart.
    rewards: Vec<(f64, f64)>,
    last_epoch: Option<EpochSummary>,
    print_q_table: bool,
    /// Q-table dumps, printed once the terminal is restored.
    epoch_dumps: Vec<String>,
    /// First terminal error; training stops once one is recorded.
    error: Option<io::Error>,
    quit: bool,
}

impl TrainingObserver for TuiObserver<'_> {
    fn render(&mut self, view: &EpisodeView<'_>) {
        if self.error.is_some() {
            return;
        }
        let status = format!(
            "Epoch {} | Episode {} | Step {} | epsilon {:.2} | reward {} | treasures {}/{}  (q/Esc quits)",
            view.epoch,
            view.episode,
            view.step,
            view.epsilon,
            view.total_reward,
            view.state.collected_count(),
            view.topology.treasures().len(),
        );
        let rewards = &self.rewards;
        if let Err(err) = self
            .terminal
            .draw(|f| ui(f, view.topology, Some(view.state), rewards, &status))
        {
            self.error = Some(err);
            return;
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }

    fn stop_requested(&mut self) -> bool {
        if !self.quit && self.error.is_none() {
            match quit_requested(Duration::ZERO) {
                Ok(quit) => self.quit = quit,
                Err(err) => self.error = Some(err),
            }
        }
        self.quit || self.error.is_some()
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        self.rewards
            .push((self.rewards.len() as f64, summary.total_reward as f64));
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary, q_table: &QTable) {
        self.last_epoch = Some(*summary);
        if self.print_q_table {
            self.epoch_dumps
                .push(format!("After epoch {}:\n{q_table}", summary.epoch));
        }
    }
}

fn run_tui(trainer: &mut Trainer, args: &Args) -> Result<(TrainingOutcome, Vec<String>)> {
    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let result = train_in_terminal(&mut terminal, trainer, args);

    // Restore the terminal state even if training failed
    restore_terminal(&mut terminal)?;
    result
}

fn train_in_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    trainer: &mut Trainer,
    args: &Args,
) -> Result<(TrainingOutcome, Vec<String>)> {
    let mut observer = TuiObserver {
        terminal,
        delay: Duration::from_millis(args.delay_ms),
        rewards: Vec::new(),
        last_epoch: None,
        print_q_table: args.print_q_table,
        epoch_dumps: Vec::new(),
        error: None,
        quit: false,
    };
    let outcome = trainer.run(&mut observer);
    if let Some(err) = observer.error.take() {
        return Err(err).context("Terminal error during training");
    }

    if outcome == TrainingOutcome::Completed {
        let status = match observer.last_epoch {
            Some(epoch) => format!(
                "Training complete: {} episodes, last epoch mean reward {:.1}, solved {}/{}  (q/Esc quits)",
                trainer.history().len(),
                epoch.mean_reward,
                epoch.solved,
                epoch.episodes
            ),
            None => "Training complete  (q/Esc quits)".to_string(),
        };
        wait_for_quit(observer.terminal, trainer.topology(), &observer.rewards, &status)?;
    }

    Ok((outcome, observer.epoch_dumps))
}

/// Keeps the final board and reward chart on screen until the user quits.
fn wait_for_quit(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    topology: &GridTopology,
    rewards: &[(f64, f64)],
    status: &str,
) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    loop {
        terminal.draw(|f| ui(f, topology, None, rewards, status))?;
        if quit_requested(tick_rate)? {
            return Ok(());
        }
    }
}

/// Polls for a key event and reports whether it asks to quit.
fn quit_requested(timeout: Duration) -> io::Result<bool> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            return Ok(matches!(key.code, KeyCode::Char('q') | KeyCode::Esc));
        }
    }
    Ok(false)
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Renders the user interface.
fn ui(
    frame: &mut Frame,
    topology: &GridTopology,
    state: Option<&EpisodeState>,
    rewards: &[(f64, f64)],
    status: &str,
) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(60), // Area for the board
            Constraint::Percentage(30), // Area for the reward chart
            Constraint::Percentage(10), // Area for status/help
        ])
        .split(frame.area());

    render_board(frame, main_layout[0], topology, state);
    render_rewards(frame, main_layout[1], rewards);

    let status_text = Paragraph::new(status.to_string())
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_text, main_layout[2]);
}

/// Draws cell outlines, walls, treasures and the agent.
///
/// Canvas y grows upwards, so board rows are flipped.
fn render_board(
    frame: &mut Frame,
    area: Rect,
    topology: &GridTopology,
    state: Option<&EpisodeState>,
) {
    let rows = topology.rows() as f64;
    let cols = topology.cols() as f64;
    let label_y = |row: usize| rows - row as f64 - 0.6;
    let label_x = |col: usize| col as f64 + 0.4;

    let canvas = Canvas::default()
        .block(Block::default().title("Treasure Grid").borders(Borders::ALL))
        .marker(Marker::Braille)
        .x_bounds([0.0, cols])
        .y_bounds([0.0, rows])
        .paint(|ctx| {
            for cell in topology.cells() {
                ctx.draw(&Rectangle {
                    x: cell.col as f64,
                    y: rows - cell.row as f64 - 1.0,
                    width: 1.0,
                    height: 1.0,
                    color: Color::DarkGray,
                });
            }
            ctx.layer();

            for segment in topology.wall_segments() {
                let (a, b) = segment.endpoints();
                ctx.draw(&CanvasLine {
                    x1: a.col as f64,
                    y1: rows - a.row as f64,
                    x2: b.col as f64,
                    y2: rows - b.row as f64,
                    color: Color::White,
                });
            }

            for (index, treasure) in topology.treasures().iter().enumerate() {
                let collected = state.is_some_and(|s| s.collected()[index]);
                let color = if collected {
                    Color::LightGreen
                } else {
                    Color::Yellow
                };
                ctx.print(
                    label_x(treasure.col),
                    label_y(treasure.row),
                    Span::styled("$", Style::default().fg(color).bold()),
                );
            }

            if let Some(state) = state {
                let agent = state.agent();
                ctx.print(
                    label_x(agent.col),
                    label_y(agent.row),
                    Span::styled("@", Style::default().fg(Color::Cyan).bold()),
                );
            }
        });

    frame.render_widget(canvas, area);
}

/// Plots the total reward of every finished episode.
fn render_rewards(frame: &mut Frame, area: Rect, rewards: &[(f64, f64)]) {
    let (low, high) = rewards
        .iter()
        .fold((0.0_f64, 0.0_f64), |(lo, hi), (_, r)| (lo.min(*r), hi.max(*r)));
    let high = high.max(low + 1.0);
    let episodes = rewards.len().max(1) as f64;

    let dataset = Dataset::default()
        .name("episode reward")
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(rewards);

    let chart = Chart::new(vec![dataset])
        .block(Block::default().title("Reward").borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("Episode")
                .bounds([0.0, episodes])
                .labels(vec![Span::raw("0"), Span::raw(rewards.len().to_string())]),
        )
        .y_axis(
            Axis::default()
                .bounds([low, high])
                .labels(vec![Span::raw(format!("{low:.0}")), Span::raw(format!("{high:.0}"))]),
        );

    frame.render_widget(chart, area);
}
