//! Application setup and command dispatch with builder pattern.

use clap::Subcommand;
use glam::Vec2;
use ndarray::{Array5, s};
use retouch_data::DatasetCursor;
use retouch_match::{MatchOptions, VisualizeOptions, match_trajectories, visualize_match};
use retouch_train::collab::sample_pool;
use retouch_train::schedule::EditRates;
use retouch_train::{
    CorrespondenceEditor, DataManager, EditAction, EditConfig, EditPipeline, EditScheduler,
};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::sim::{self, ShiftTracker, SimData, SimDenoiser, SimModel};

/// Steps between progress log lines while simulating.
const PROGRESS_INTERVAL: u64 = 100;

/// Pattern motion in pixels per frame for the trajectory demo.
const PATTERN_SPEED: f32 = 1.5;

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the edit decision for each step in a range
    Schedule {
        /// First step
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Number of steps
        #[arg(long, default_value_t = 1000)]
        steps: u64,
        /// Number of training slots
        #[arg(long, default_value_t = 10)]
        slots: usize,
        /// Also print steps without an edit
        #[arg(long)]
        all: bool,
    },
    /// Run the pipeline for a number of steps against synthetic collaborators
    Simulate {
        #[arg(long, default_value_t = 1000)]
        steps: u64,
        #[arg(long, default_value_t = 10)]
        slots: usize,
        /// Square image resolution
        #[arg(long, default_value_t = 192)]
        resolution: usize,
        /// Images to sample from; -1 uses the whole dataset
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        pool: i64,
        /// Seed for sampling and latent noise
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Write the final training images as PNGs into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Track a synthetic moving pattern and write the trajectory overlay
    Trajectories {
        /// Directory for PNG frames and GIF animations
        #[arg(short, long, default_value = "trajectories")]
        output: PathBuf,
        #[arg(long, default_value_t = 12)]
        frames: usize,
        #[arg(long, default_value_t = 128)]
        resolution: usize,
        #[arg(long, default_value_t = 8)]
        grid_size: usize,
        /// Color by displacement, saturating at this distance
        #[arg(long)]
        max_distance: Option<f32>,
    },
}

/// Builder for configuring and running the application.
pub struct AppBuilder {
    logging: LoggingConfig,
    config_path: Option<PathBuf>,
}

impl AppBuilder {
    /// Create a new AppBuilder with default settings.
    pub fn new() -> Self {
        Self {
            logging: LoggingConfig::default(),
            config_path: None,
        }
    }

    /// Configure logging.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Load the edit config from a JSON file instead of using defaults.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Run a command.
    pub fn run(self, command: Command) -> Result<(), Box<dyn Error>> {
        self.init_logging();

        let config = match &self.config_path {
            Some(path) => {
                info!("Loading edit config from {:?}", path);
                EditConfig::from_path(path)?
            }
            None => EditConfig::default(),
        };

        match command {
            Command::Schedule {
                start,
                steps,
                slots,
                all,
            } => print_schedule(&config, start, steps, slots, all),
            Command::Simulate {
                steps,
                slots,
                resolution,
                pool,
                seed,
                output,
            } => simulate(
                config,
                steps,
                slots,
                resolution,
                pool,
                seed,
                output.as_deref(),
            ),
            Command::Trajectories {
                output,
                frames,
                resolution,
                grid_size,
                max_distance,
            } => trajectories(&output, frames, resolution, grid_size, max_distance),
        }
    }

    fn init_logging(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the scheduler over a step range, marking slots as edits would.
fn print_schedule(
    config: &EditConfig,
    start: u64,
    steps: u64,
    slots: usize,
    all: bool,
) -> Result<(), Box<dyn Error>> {
    let mut scheduler = EditScheduler::new(EditRates::from(config));
    let mut cursor = DatasetCursor::new(slots)?;
    let mut updated = vec![false; slots];

    println!(
        "{:>8}  {:<10} {:<8} {:<13} {}",
        "step", "phase", "action", "only_updated", "updated"
    );
    for step in start..start + steps {
        let decision = scheduler.on_step(step, &updated)?;
        let touched = match decision.action {
            EditAction::Single => config.slow_edit_count,
            EditAction::Batched => config.fast_edit_count,
            EditAction::None => 0,
        };
        for _ in 0..touched {
            updated[cursor.advance()] = true;
        }
        if all || decision.action != EditAction::None {
            println!(
                "{:>8}  {:<10} {:<8} {:<13} {}/{}",
                step,
                format!("{:?}", decision.phase),
                format!("{:?}", decision.action),
                decision.only_sample_updated,
                updated.iter().filter(|&&u| u).count(),
                slots
            );
        }
    }
    Ok(())
}

fn simulate(
    config: EditConfig,
    steps: u64,
    slots: usize,
    resolution: usize,
    pool: i64,
    seed: u64,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let correspondence = config.correspondence.clone();
    let latent_shift =
        sim::PIXELS_PER_UNIT * sim::CAMERA_SPACING / correspondence.latent_downscale as f32;
    let tracker = ShiftTracker::new(Vec2::new(latent_shift, 0.0));
    let editor = CorrespondenceEditor::new(SimDenoiser, tracker, correspondence, seed)?;
    let data = SimData::new(slots, resolution, seed)?.with_pool(sample_pool(pool));

    let mut pipeline = EditPipeline::new(config, SimModel::default(), data, editor)?;
    for step in 0..steps {
        let out = pipeline.step(step)?;
        if step % PROGRESS_INTERVAL == 0 {
            info!(
                step,
                phase = ?out.decision.phase,
                rgb_loss = out.losses.get("rgb_loss").copied().unwrap_or_default(),
                updated = pipeline.data().training_batch().updated_count(),
                restricted = pipeline.data().only_updated(),
                "Training step"
            );
        }
    }

    let stats = pipeline.stats();
    info!(
        steps = stats.steps,
        single_edits = stats.single_edits,
        batched_edits = stats.batched_edits,
        images_edited = stats.images_edited,
        renders = pipeline.model().renders,
        releases = pipeline.model().releases,
        "Simulation complete"
    );

    if let Some(dir) = output {
        fs::create_dir_all(dir)?;
        for (slot, image) in pipeline.data().training_batch().images().iter().enumerate() {
            image.to_rgb()?.save(dir.join(format!("slot_{slot:02}.png")))?;
        }
        info!("Wrote {} training images to {:?}", slots, dir);
    }
    Ok(())
}

fn trajectories(
    output: &Path,
    frames: usize,
    resolution: usize,
    grid_size: usize,
    max_distance: Option<f32>,
) -> Result<(), Box<dyn Error>> {
    let mut sequence = Array5::<f32>::zeros((1, frames, 3, resolution, resolution));
    for t in 0..frames {
        let frame = sim::stripes(resolution, resolution, t as f32 * PATTERN_SPEED);
        sequence.slice_mut(s![0, t, .., .., ..]).assign(&frame.to_chw());
    }

    let mut tracker = ShiftTracker::new(Vec2::new(PATTERN_SPEED, 0.0));
    let options = MatchOptions::new(resolution, resolution).with_grid_size(grid_size);
    let matched = match_trajectories(&mut tracker, sequence.view(), &options)?;

    let overlay = visualize_match(
        matched.trajectories.view(),
        matched.frames.view(),
        &VisualizeOptions {
            max_distance,
            ..Default::default()
        },
    )?;
    overlay.save(output)?;
    Ok(())
}
