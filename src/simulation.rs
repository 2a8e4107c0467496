// ============================================================================
// simulation.rs — wator
// Driver-side facade: owns the grid and the engine that advances it, publishes
// per-generation statistics, and applies the extinction policy.
// ============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cell::{Cell, Species};
use crate::config::{ReproductionCycles, Schedule, WatorConfig};
use crate::error::{Result, WatorError};
use crate::grid::Grid;
use crate::stats::{AgeHistogram, Population, StatsFragment};
use crate::sync::GenerationTicket;
use crate::worker::{update_rows, WorkerPool};

enum Engine {
    /// Rows updated in order on the calling thread.
    Sequential,
    Banded(WorkerPool),
    /// Shut down, or lost a worker; every further step fails.
    Halted,
}

/// Result of one call to [`Simulation::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A generation ran; `generation` is the counter after the step.
    Advanced { generation: u32, elapsed: Duration },
    /// Everything is extinct; nothing ran.
    Inactive,
}

#[derive(Debug, Default)]
struct ExtinctionWatch {
    prey_gone: bool,
    predators_gone: bool,
}

pub struct Simulation {
    config: WatorConfig,
    grid: Arc<Grid>,
    engine: Engine,
    seed: u64,
    generation: u32,
    cycles: ReproductionCycles,
    active: bool,
    stats: StatsFragment,
    watch: ExtinctionWatch,
    last_step: Option<Duration>,
}

impl Simulation {
    /// Build an empty grid and start the configured engine.
    pub fn new(config: WatorConfig) -> Result<Self> {
        config.validate()?;
        let grid = Arc::new(Grid::new(config.width, config.height)?);
        let seed = config.resolve_seed();

        let engine = match config.schedule {
            Schedule::Sequential => Engine::Sequential,
            Schedule::Banded { .. } => Engine::Banded(WorkerPool::spawn(
                Arc::clone(&grid),
                config.effective_workers(),
                seed,
                config.shutdown_timeout(),
            )?),
        };
        log::info!(
            "simulation ready: {}x{} grid, {:?}, seed {seed}",
            config.width,
            config.height,
            config.schedule
        );

        let stats = StatsFragment::census(&grid);
        Ok(Self {
            cycles: config.cycles,
            config,
            grid,
            engine,
            seed,
            generation: 0,
            active: true,
            stats,
            watch: ExtinctionWatch::default(),
            last_step: None,
        })
    }

    /// Advance one generation. A no-op while the simulation is inactive.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if !self.active {
            log::info!(
                "simulation inactive at generation {}; step skipped",
                self.generation
            );
            return Ok(StepOutcome::Inactive);
        }

        let started = Instant::now();
        let ticket = GenerationTicket {
            generation: self.generation,
            cycles: self.cycles,
        };
        let result = match &self.engine {
            Engine::Sequential => {
                update_rows(&self.grid, 0..self.grid.height(), &ticket, self.seed);
                Ok(StatsFragment::census(&self.grid))
            }
            Engine::Banded(pool) => pool.step(ticket),
            Engine::Halted => return Err(WatorError::PoolStopped),
        };
        let stats = match result {
            Ok(stats) => stats,
            Err(err) => {
                log::error!("generation {} failed: {err}", self.generation);
                self.shutdown();
                return Err(err);
            }
        };

        let elapsed = started.elapsed();
        self.stats = stats;
        self.generation = self.generation.wrapping_add(1);
        self.last_step = Some(elapsed);
        log::debug!(
            "generation {} computed in {:.6} s",
            self.generation,
            elapsed.as_secs_f64()
        );

        self.check_extinction();
        Ok(StepOutcome::Advanced {
            generation: self.generation,
            elapsed,
        })
    }

    fn check_extinction(&mut self) {
        let p = self.stats.population;
        if p.prey == 0 && p.predators == 0 {
            self.active = false;
            log::info!(
                "all species extinct at generation {}; simulation inactive",
                self.generation
            );
            return;
        }

        if p.prey == 0 && !self.watch.prey_gone {
            log::info!("prey extinct at generation {}", self.generation);
        }
        if p.predators == 0 && !self.watch.predators_gone {
            log::info!("predators extinct at generation {}", self.generation);
        }
        self.watch.prey_gone = p.prey == 0;
        self.watch.predators_gone = p.predators == 0;
    }

    /// Stop the worker pool. Idempotent; later steps fail with `PoolStopped`.
    pub fn shutdown(&mut self) {
        if let Engine::Banded(pool) = &mut self.engine {
            pool.shutdown();
        }
        self.engine = Engine::Halted;
    }

    // ---- population editing ----

    /// Put a newborn of `species` at `(x, y)` (wrapped), or clear the cell
    /// with `None`. New entities are due in the current generation.
    pub fn place(&mut self, x: isize, y: isize, species: Option<Species>) -> Option<Cell> {
        let value = species.map(|s| Cell::spawn(s, self.generation));
        self.grid.set(x, y, value)
    }

    /// Remove every entity and restart at generation 0 with fresh counts.
    pub fn reset(&mut self) {
        self.grid.clear();
        self.generation = 0;
        self.last_step = None;
        self.recount();
        self.reactivate();
    }

    /// Recompute published statistics from the grid, e.g. after editing it.
    pub fn recount(&mut self) {
        self.stats = StatsFragment::census(&self.grid);
    }

    /// Make the simulation steppable again after total extinction.
    pub fn reactivate(&mut self) {
        self.active = true;
        self.watch = ExtinctionWatch::default();
    }

    pub fn set_cycles(&mut self, prey: u32, predator: u32) -> Result<()> {
        self.cycles = ReproductionCycles::new(prey, predator)?;
        Ok(())
    }

    // ---- accessors ----

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn population(&self) -> Population {
        self.stats.population
    }

    #[must_use]
    pub fn prey_count(&self) -> usize {
        self.stats.population.prey
    }

    #[must_use]
    pub fn predator_count(&self) -> usize {
        self.stats.population.predators
    }

    #[must_use]
    pub fn empty_count(&self) -> usize {
        self.stats.population.empty
    }

    #[must_use]
    pub fn age_histogram(&self) -> &AgeHistogram {
        &self.stats.ages
    }

    #[must_use]
    pub fn stats(&self) -> &StatsFragment {
        &self.stats
    }

    #[must_use]
    pub fn cell(&self, x: isize, y: isize) -> Option<Cell> {
        self.grid.get(x, y)
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn cycles(&self) -> ReproductionCycles {
        self.cycles
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn config(&self) -> &WatorConfig {
        &self.config
    }

    /// Bands actually in use (1 for the sequential schedule).
    #[must_use]
    pub fn workers(&self) -> usize {
        match &self.engine {
            Engine::Banded(pool) => pool.bands().len(),
            Engine::Sequential | Engine::Halted => 1,
        }
    }

    #[must_use]
    pub fn last_step_time(&self) -> Option<Duration> {
        self.last_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(schedule: Schedule) -> WatorConfig {
        WatorConfig {
            width: 8,
            height: 8,
            schedule,
            rng_seed: Some(3),
            ..WatorConfig::default()
        }
    }

    #[test]
    fn place_and_recount_update_published_counts() {
        let mut sim = Simulation::new(small(Schedule::Sequential)).expect("sim");
        assert_eq!(sim.empty_count(), 64);
        sim.place(1, 1, Some(Species::Prey));
        sim.place(-1, -1, Some(Species::Predator));
        assert_eq!(sim.prey_count(), 0, "counts only change on recount or step");
        sim.recount();
        assert_eq!(sim.population(), Population { prey: 1, predators: 1, empty: 62 });
        assert!(sim.cell(7, 7).is_some_and(|c| c.is_predator()));
        assert_eq!(sim.place(9, 9, None).map(|c| c.species()), Some(Species::Prey));
    }

    #[test]
    fn empty_world_goes_inactive() {
        let mut sim = Simulation::new(small(Schedule::Banded { workers: 2 })).expect("sim");
        assert!(matches!(sim.step(), Ok(StepOutcome::Advanced { generation: 1, .. })));
        assert!(!sim.is_active());
        assert_eq!(sim.step().expect("no-op"), StepOutcome::Inactive);
        assert_eq!(sim.generation(), 1);

        sim.place(0, 0, Some(Species::Prey));
        sim.reactivate();
        assert!(matches!(sim.step(), Ok(StepOutcome::Advanced { generation: 2, .. })));
        assert!(sim.prey_count() >= 1);
    }

    #[test]
    fn reset_restarts_the_generation_counter() {
        let mut sim = Simulation::new(small(Schedule::Banded { workers: 2 })).expect("sim");
        sim.place(2, 2, Some(Species::Predator));
        sim.recount();
        sim.step().expect("step");
        sim.step().expect("step");
        assert_eq!(sim.generation(), 2);

        sim.reset();
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.empty_count(), 64);
        assert!(sim.last_step_time().is_none());
        assert!(sim.is_active());

        sim.place(4, 4, Some(Species::Prey));
        assert!(matches!(sim.step(), Ok(StepOutcome::Advanced { generation: 1, .. })));
        assert!(sim.prey_count() >= 1);
    }

    #[test]
    fn set_cycles_validates() {
        let mut sim = Simulation::new(small(Schedule::Sequential)).expect("sim");
        assert!(sim.set_cycles(0, 1).is_err());
        assert_eq!(sim.cycles(), ReproductionCycles::default());
        sim.set_cycles(5, 7).expect("valid");
        assert_eq!((sim.cycles().prey(), sim.cycles().predator()), (5, 7));
    }

    #[test]
    fn shutdown_is_idempotent_and_final() {
        let mut sim = Simulation::new(small(Schedule::Banded { workers: 4 })).expect("sim");
        assert_eq!(sim.workers(), 4);
        sim.place(3, 3, Some(Species::Prey));
        sim.shutdown();
        sim.shutdown();
        assert!(matches!(sim.step(), Err(WatorError::PoolStopped)));
    }

    #[test]
    fn dead_worker_halts_the_simulation() {
        let mut sim = Simulation::new(small(Schedule::Banded { workers: 4 })).expect("sim");
        sim.place(3, 3, Some(Species::Prey));
        sim.cycles = ReproductionCycles::unchecked(0, 1);

        assert!(matches!(sim.step(), Err(WatorError::QuorumBroken)));
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.workers(), 1, "pool replaced by the halted engine");

        sim.cycles = ReproductionCycles::default();
        assert!(matches!(sim.step(), Err(WatorError::PoolStopped)));
        assert_eq!(sim.generation(), 0);
    }
}
