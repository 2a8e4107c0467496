// ============================================================================
// worker.rs — wator
// Row-band partitioning and the long-lived band worker threads.
// ============================================================================

use std::ops::Range;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cell;
use crate::error::{Result, WatorError};
use crate::grid::{Coord, Grid};
use crate::rng::derive_cell_rng;
use crate::stats::StatsFragment;
use crate::sync::{Coordinator, GenerationTicket, Interrupted};

/// A contiguous run of rows owned by one worker.
/// The first row is the band's border row; the rest are its interior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub index: usize,
    pub rows: Range<usize>,
}

impl Band {
    #[must_use]
    pub fn border(&self) -> Range<usize> {
        self.rows.start..self.rows.start + 1
    }

    #[must_use]
    pub fn interior(&self) -> Range<usize> {
        self.rows.start + 1..self.rows.end
    }
}

/// Split `height` rows into `bands` contiguous bands of `height / bands`
/// rows each; the last band also takes the remainder.
#[must_use]
pub fn partition(height: usize, bands: usize) -> Vec<Band> {
    let bands = bands.clamp(1, height.max(1));
    let per_band = height / bands;
    (0..bands)
        .map(|index| {
            let start = index * per_band;
            let end = if index + 1 == bands { height } else { start + per_band };
            Band {
                index,
                rows: start..end,
            }
        })
        .collect()
}

/// Update every due entity in `rows`, row-major.
pub fn update_rows(grid: &Grid, rows: Range<usize>, ticket: &GenerationTicket, seed: u64) {
    for y in rows {
        for x in 0..grid.width() {
            let at = Coord::new(x, y);
            let Some(cell) = grid.cell(at) else {
                continue;
            };
            if !cell.is_due(ticket.generation) {
                continue;
            }
            let mut rng = derive_cell_rng(seed, ticket.generation, x, y);
            cell::update(cell, grid, at, ticket.generation, ticket.cycles, &mut rng);
        }
    }
}

// ======================== Band Worker ========================

/// Keeps the coordinator's view of this thread honest when it leaves:
/// a panic breaks the quorum, every exit lowers the live count.
struct Presence<'a> {
    coordinator: &'a Coordinator,
    band: usize,
}

impl Drop for Presence<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("band worker {} panicked; breaking generation quorum", self.band);
            self.coordinator.break_quorum();
        }
        self.coordinator.worker_exited();
    }
}

struct BandWorker {
    band: Band,
    bands: usize,
    grid: Arc<Grid>,
    coordinator: Arc<Coordinator>,
    seed: u64,
}

impl BandWorker {
    fn run(self) {
        let _presence = Presence {
            coordinator: &self.coordinator,
            band: self.band.index,
        };
        log::debug!(
            "band worker {} started on rows {}..{}",
            self.band.index,
            self.band.rows.start,
            self.band.rows.end
        );

        let mut epoch = 0;
        loop {
            match self.generation(&mut epoch) {
                Ok(()) => {}
                Err(Interrupted::Stopped) => break,
                Err(Interrupted::Broken) => {
                    log::warn!("band worker {} leaving: quorum broken", self.band.index);
                    break;
                }
            }
        }
        log::debug!("band worker {} exiting", self.band.index);
    }

    /// One generation: interior, border (after the preceding band), stats
    /// (after the following band's border), then the quorum.
    fn generation(&self, epoch: &mut u64) -> std::result::Result<(), Interrupted> {
        let coordinator = &*self.coordinator;
        let ticket = coordinator.await_generation_open(epoch)?;
        let index = self.band.index;
        let last = index + 1 == self.bands;

        update_rows(&self.grid, self.band.interior(), &ticket, self.seed);
        // The last row wraps onto band 0's border row; band 0 waits on this seam.
        if last && self.bands > 1 {
            coordinator.post_seam(*epoch);
        }

        if index > 0 {
            coordinator.await_border(index - 1)?;
        } else if self.bands > 1 {
            coordinator.await_seam()?;
        }
        update_rows(&self.grid, self.band.border(), &ticket, self.seed);
        coordinator.finalize_border(index, *epoch);

        coordinator.observe_border((index + 1) % self.bands, *epoch)?;
        let fragment = StatsFragment::collect(&self.grid, self.band.rows.clone());
        coordinator.submit_stats(&fragment);

        coordinator.await_quorum(*epoch)
    }
}

// ======================== Worker Pool ========================

/// N band workers plus the coordinator they share. Dropping the pool shuts it down.
pub struct WorkerPool {
    coordinator: Arc<Coordinator>,
    bands: Vec<Band>,
    handles: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Start one worker per band, at most `height / 2` of them. If any spawn
    /// fails, the already running workers are stopped before the error is
    /// returned.
    pub fn spawn(
        grid: Arc<Grid>,
        workers: usize,
        seed: u64,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        let bands = partition(grid.height(), workers.min(grid.height() / 2).max(1));
        let coordinator = Arc::new(Coordinator::new(bands.len()));
        let mut pool = Self {
            coordinator: Arc::clone(&coordinator),
            bands: bands.clone(),
            handles: Vec::with_capacity(bands.len()),
            shutdown_timeout,
        };

        for band in bands {
            let worker = BandWorker {
                bands: pool.bands.len(),
                band,
                grid: Arc::clone(&grid),
                coordinator: Arc::clone(&coordinator),
                seed,
            };
            let name = format!("wator-band-{}", worker.band.index);
            coordinator.worker_started();
            match thread::Builder::new().name(name).spawn(move || worker.run()) {
                Ok(handle) => pool.handles.push(handle),
                Err(err) => {
                    coordinator.worker_exited();
                    pool.shutdown();
                    return Err(WatorError::Spawn(err));
                }
            }
        }

        log::info!(
            "worker pool started: {} bands over {} rows",
            pool.bands.len(),
            grid.height()
        );
        Ok(pool)
    }

    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Run one generation on the pool and return its merged statistics.
    pub fn step(&self, ticket: GenerationTicket) -> Result<StatsFragment> {
        if self.coordinator.is_stopping() {
            return Err(WatorError::PoolStopped);
        }
        if self.coordinator.is_broken() {
            return Err(WatorError::QuorumBroken);
        }
        self.coordinator.open_generation(ticket);
        self.coordinator.await_stats_ready()?;
        Ok(self.coordinator.totals())
    }

    /// Stop every worker and join those that exit within the timeout.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.coordinator.request_stop();
        if !self.coordinator.await_workers_exit(self.shutdown_timeout) {
            log::warn!(
                "worker pool did not stop within {:?}; detaching stragglers",
                self.shutdown_timeout
            );
        }

        let mut joined = 0;
        for handle in self.handles.drain(..) {
            if !handle.is_finished() {
                continue;
            }
            if handle.join().is_err() {
                log::error!("band worker terminated by panic");
            }
            joined += 1;
        }
        log::info!("worker pool stopped: {joined}/{} workers joined", self.bands.len());
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::config::ReproductionCycles;

    #[test]
    fn partition_gives_remainder_to_last_band() {
        let bands = partition(10, 3);
        let rows: Vec<_> = bands.iter().map(|b| b.rows.clone()).collect();
        assert_eq!(rows, vec![0..3, 3..6, 6..10]);
        assert_eq!(bands[2].border(), 6..7);
        assert_eq!(bands[2].interior(), 7..10);
    }

    #[test]
    fn partition_covers_every_row_once() {
        for height in 1..20 {
            for bands in 1..6 {
                let parts = partition(height, bands);
                let covered: Vec<usize> = parts.iter().flat_map(|b| b.rows.clone()).collect();
                assert_eq!(covered, (0..height).collect::<Vec<_>>(), "{height}/{bands}");
            }
        }
    }

    #[test]
    fn pool_steps_and_shuts_down() {
        let grid = Arc::new(Grid::new(6, 8).expect("grid"));
        grid.put(Coord::new(2, 2), Some(Cell::prey(0)));
        let mut pool =
            WorkerPool::spawn(Arc::clone(&grid), 4, 11, Duration::from_secs(5)).expect("pool");
        assert_eq!(pool.bands().len(), 4);

        let ticket = GenerationTicket {
            generation: 0,
            cycles: ReproductionCycles::new(1, 1).expect("cycles"),
        };
        let stats = pool.step(ticket).expect("step");
        assert_eq!(stats.population.prey, 2);
        assert_eq!(stats.population.cells(), 48);

        pool.shutdown();
        pool.shutdown();
        assert!(matches!(pool.step(ticket), Err(WatorError::PoolStopped)));
    }

    #[test]
    fn panicking_worker_breaks_the_quorum() {
        let grid = Arc::new(Grid::new(6, 8).expect("grid"));
        // Row 2 is band 1's border row.
        grid.put(Coord::new(2, 2), Some(Cell::prey(0)));
        let mut pool =
            WorkerPool::spawn(Arc::clone(&grid), 4, 11, Duration::from_secs(5)).expect("pool");

        // A zero prey period makes band 1 panic on `generation % 0`.
        let ticket = GenerationTicket {
            generation: 0,
            cycles: ReproductionCycles::unchecked(0, 1),
        };
        assert!(matches!(pool.step(ticket), Err(WatorError::QuorumBroken)));
        assert!(pool.coordinator.is_broken());

        let healthy = GenerationTicket {
            generation: 1,
            cycles: ReproductionCycles::default(),
        };
        assert!(matches!(pool.step(healthy), Err(WatorError::QuorumBroken)));

        pool.shutdown();
        assert!(pool.coordinator.await_workers_exit(Duration::ZERO));
    }
}
