// ============================================================================
// headless.rs — wator
// Batch runner: seeds a random population, steps for N generations, logs
// progress and exports the run report.
// ============================================================================

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use wator::{rng, Coord, Simulation, Species, StepOutcome, WatorConfig};

use crate::report::RunRecorder;

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub generations: u32,
    pub prey_density: f64,
    pub predator_density: f64,
    pub progress_interval: u32,
    pub report_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
    pub print_final: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            generations: 1_000,
            prey_density: 0.3,
            predator_density: 0.1,
            progress_interval: 100,
            report_path: None,
            csv_path: None,
            print_final: false,
        }
    }
}

/// Scatter `round(area * density)` prey, then predators, over distinct random
/// cells. The simulation is reset first: existing occupants go and the
/// generation counter restarts at 0.
pub fn populate<R: Rng + ?Sized>(
    sim: &mut Simulation,
    prey_density: f64,
    predator_density: f64,
    rng: &mut R,
) {
    let (width, height) = (sim.grid().width(), sim.grid().height());
    let area = width * height;
    let quota = |density: f64| ((area as f64 * density.clamp(0.0, 1.0)).round() as usize).min(area);

    let mut cells: Vec<Coord> = (0..height)
        .flat_map(|y| (0..width).map(move |x| Coord::new(x, y)))
        .collect();
    cells.shuffle(rng);

    sim.reset();
    let prey = quota(prey_density);
    let predators = quota(predator_density).min(area - prey);
    let species = std::iter::repeat(Species::Prey)
        .take(prey)
        .chain(std::iter::repeat(Species::Predator).take(predators));
    for (at, kind) in cells.into_iter().zip(species) {
        sim.place(at.x as isize, at.y as isize, Some(kind));
    }
    sim.recount();
}

pub fn run_headless(config: WatorConfig, headless: &HeadlessConfig) -> Result<RunRecorder> {
    let mut sim = Simulation::new(config).context("failed to start simulation")?;
    let mut seeding_rng = rng::create_rng(sim.seed());
    populate(
        &mut sim,
        headless.prey_density,
        headless.predator_density,
        &mut seeding_rng,
    );

    log::info!(
        "Headless run started: {} generations on {}x{} with {} worker(s), seed {}",
        headless.generations,
        sim.grid().width(),
        sim.grid().height(),
        sim.workers(),
        sim.seed(),
    );
    sim.stats().log(sim.generation(), None);

    let mut recorder = RunRecorder::default();
    recorder.record(&sim);

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut last_report_generation = 0u32;
    let mut last_stats = sim.stats().clone();

    for step in 0..headless.generations {
        if sim.step()? == StepOutcome::Inactive {
            log::info!("All species extinct after {} generations; stopping early", sim.generation());
            break;
        }
        recorder.record(&sim);

        let done = step + 1;
        if headless.progress_interval > 0 && done % headless.progress_interval == 0 {
            let total_elapsed = started.elapsed().as_secs_f64().max(1e-6);
            let total_rate = done as f64 / total_elapsed;

            let window_elapsed = last_report.elapsed().as_secs_f64().max(1e-6);
            let window_rate = (done - last_report_generation) as f64 / window_elapsed;

            let remaining = headless.generations.saturating_sub(done);
            let eta_min = if total_rate > 1e-6 {
                remaining as f64 / total_rate / 60.0
            } else {
                0.0
            };

            log::info!(
                "Headless progress: {}/{} | gen/s={:.0} (window {:.0}) | ETA={:.1} min",
                done,
                headless.generations,
                total_rate,
                window_rate,
                eta_min,
            );
            sim.stats().log(sim.generation(), Some(&last_stats));

            last_report = Instant::now();
            last_report_generation = done;
            last_stats = sim.stats().clone();
        }
    }

    sim.shutdown();
    let population = sim.population();
    log::info!(
        "Headless run finished at generation {}: prey={} predators={} empty={} ({:.2} s)",
        sim.generation(),
        population.prey,
        population.predators,
        population.empty,
        started.elapsed().as_secs_f64(),
    );

    if headless.print_final {
        print!("{}", sim.grid());
    }
    if let Some(path) = &headless.csv_path {
        recorder.export_csv(path)?;
    }
    if let Some(path) = &headless.report_path {
        recorder.export_json(&sim, path)?;
    }
    Ok(recorder)
}
