// ============================================================================
// main.rs — wator
// Entry point. Initializes logging, parses arguments and runs a headless batch.
// ============================================================================

mod headless;
mod report;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use headless::{run_headless, HeadlessConfig};
use wator::{ReproductionCycles, Schedule, WatorConfig};

#[derive(Parser, Debug)]
#[command(
    name = "wator",
    version,
    about = "Run the Wa-Tor predator/prey automaton on a pool of row-band workers"
)]
struct Cli {
    /// JSON configuration file; command-line flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grid width in cells.
    #[arg(long)]
    width: Option<usize>,

    /// Grid height in cells.
    #[arg(long)]
    height: Option<usize>,

    /// Number of band workers (clamped to height / 2).
    #[arg(short, long, conflicts_with = "sequential")]
    workers: Option<usize>,

    /// Update every row on the main thread instead of a worker pool.
    #[arg(long)]
    sequential: bool,

    /// Generations to run.
    #[arg(short, long, default_value_t = 1_000)]
    generations: u32,

    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Initial fraction of cells holding prey.
    #[arg(long, default_value_t = 0.3)]
    prey_density: f64,

    /// Initial fraction of cells holding predators.
    #[arg(long, default_value_t = 0.1)]
    predator_density: f64,

    /// Prey reproduction cycle in generations.
    #[arg(long)]
    prey_cycle: Option<u32>,

    /// Predator reproduction cycle in generations.
    #[arg(long)]
    predator_cycle: Option<u32>,

    /// Log progress every N generations (0 disables).
    #[arg(long, default_value_t = 100)]
    progress_interval: u32,

    /// Write a JSON run report here.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write per-generation counts as CSV here.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print the final grid to stdout.
    #[arg(long)]
    print_final: bool,
}

impl Cli {
    fn wator_config(&self) -> Result<WatorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => WatorConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if self.sequential {
            config.schedule = Schedule::Sequential;
        } else if let Some(workers) = self.workers {
            config.schedule = Schedule::Banded { workers };
        }
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }
        config.cycles = ReproductionCycles::new(
            self.prey_cycle.unwrap_or(config.cycles.prey()),
            self.predator_cycle.unwrap_or(config.cycles.predator()),
        )
        .context("invalid reproduction cycles")?;

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn headless_config(&self) -> HeadlessConfig {
        HeadlessConfig {
            generations: self.generations,
            prey_density: self.prey_density,
            predator_density: self.predator_density,
            progress_interval: self.progress_interval,
            report_path: self.report.clone(),
            csv_path: self.csv.clone(),
            print_final: self.print_final,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.wator_config()?;
    run_headless(config, &cli.headless_config())?;
    Ok(())
}
