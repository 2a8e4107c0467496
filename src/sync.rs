// ============================================================================
// sync.rs — wator
// Coordination between the driver and the band workers: generation gate,
// border handoffs, the per-generation quorum barrier, the stats ready-latch
// and the shared statistics accumulator.
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::ReproductionCycles;
use crate::error::{Result, WatorError};
use crate::stats::{AgeHistogram, Population, StatsFragment};

/// What a worker needs to run one generation, published when the gate opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    pub generation: u32,
    pub cycles: ReproductionCycles,
}

/// Why a worker stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// Shutdown was requested.
    Stopped,
    /// Another worker left mid-generation.
    Broken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait<'a, T>(cv: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

// ======================== Halt flags ========================

#[derive(Debug, Default)]
struct Halt {
    stopping: AtomicBool,
    broken: AtomicBool,
}

impl Halt {
    fn check(&self) -> std::result::Result<(), Interrupted> {
        if self.stopping.load(Ordering::Acquire) {
            Err(Interrupted::Stopped)
        } else if self.broken.load(Ordering::Acquire) {
            Err(Interrupted::Broken)
        } else {
            Ok(())
        }
    }
}

// ======================== Border handoff ========================

#[derive(Debug, Default)]
struct HandoffState {
    /// Binary unit: posted once per generation, consumed by one waiter.
    unit: bool,
    /// Epoch of the most recent post; observers compare against it.
    posted_epoch: u64,
}

/// A one-shot signal between two bands within a generation.
#[derive(Debug, Default)]
struct Handoff {
    state: Mutex<HandoffState>,
    ready: Condvar,
}

impl Handoff {
    fn post(&self, epoch: u64) {
        let mut state = lock(&self.state);
        state.unit = true;
        state.posted_epoch = epoch;
        self.ready.notify_all();
    }

    fn drain(&self) {
        lock(&self.state).unit = false;
    }

    /// Block until the unit is available, then consume it.
    fn take(&self, halt: &Halt) -> std::result::Result<(), Interrupted> {
        let mut state = lock(&self.state);
        while !state.unit {
            halt.check()?;
            state = wait(&self.ready, state);
        }
        state.unit = false;
        Ok(())
    }

    /// Block until a post for `epoch` (or later) happened, without consuming it.
    fn observe(&self, epoch: u64, halt: &Halt) -> std::result::Result<(), Interrupted> {
        let mut state = lock(&self.state);
        while state.posted_epoch < epoch {
            halt.check()?;
            state = wait(&self.ready, state);
        }
        Ok(())
    }

    fn wake(&self) {
        drop(lock(&self.state));
        self.ready.notify_all();
    }
}

// ======================== Coordinator ========================

#[derive(Debug, Default)]
struct Gate {
    open: bool,
    epoch: u64,
    ticket: Option<GenerationTicket>,
}

#[derive(Debug, Default)]
struct Quorum {
    arrived: usize,
    round: u64,
}

#[derive(Debug, Default)]
struct Ledger {
    totals: StatsFragment,
    pending: usize,
}

/// Shared state through which the driver and N band workers agree on when a
/// generation starts, in which order bands touch their border rows, and when
/// the generation's statistics are complete.
#[derive(Debug)]
pub struct Coordinator {
    workers: usize,
    gate: Mutex<Gate>,
    gate_cv: Condvar,
    borders: Vec<Handoff>,
    seam: Handoff,
    quorum: Mutex<Quorum>,
    quorum_cv: Condvar,
    ledger: Mutex<Ledger>,
    ledger_cv: Condvar,
    live: Mutex<usize>,
    live_cv: Condvar,
    halt: Halt,
}

impl Coordinator {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            gate: Mutex::new(Gate::default()),
            gate_cv: Condvar::new(),
            borders: (0..workers).map(|_| Handoff::default()).collect(),
            seam: Handoff::default(),
            quorum: Mutex::new(Quorum::default()),
            quorum_cv: Condvar::new(),
            ledger: Mutex::new(Ledger::default()),
            ledger_cv: Condvar::new(),
            live: Mutex::new(0),
            live_cv: Condvar::new(),
            halt: Halt::default(),
        }
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    // ---- driver side ----

    /// Reset the accumulator and handoffs, then open the gate for `ticket`.
    /// Returns the epoch of the opened generation.
    pub fn open_generation(&self, ticket: GenerationTicket) -> u64 {
        {
            let mut ledger = lock(&self.ledger);
            ledger.totals = StatsFragment::default();
            ledger.pending = self.workers;
        }
        for border in &self.borders {
            border.drain();
        }
        self.seam.drain();

        let mut gate = lock(&self.gate);
        gate.epoch += 1;
        gate.open = true;
        gate.ticket = Some(ticket);
        self.gate_cv.notify_all();
        gate.epoch
    }

    /// Block until every band submitted its statistics for the open generation.
    pub fn await_stats_ready(&self) -> Result<()> {
        let mut ledger = lock(&self.ledger);
        loop {
            if ledger.pending == 0 {
                return Ok(());
            }
            match self.halt.check() {
                Err(Interrupted::Broken) => return Err(WatorError::QuorumBroken),
                Err(Interrupted::Stopped) => return Err(WatorError::PoolStopped),
                Ok(()) => {}
            }
            ledger = wait(&self.ledger_cv, ledger);
        }
    }

    /// The accumulated totals of the last completed generation.
    #[must_use]
    pub fn totals(&self) -> StatsFragment {
        lock(&self.ledger).totals.clone()
    }

    #[must_use]
    pub fn current_stats(&self) -> Population {
        lock(&self.ledger).totals.population
    }

    #[must_use]
    pub fn current_age_histogram(&self) -> AgeHistogram {
        lock(&self.ledger).totals.ages.clone()
    }

    // ---- worker side ----

    /// Block until a generation newer than `last_epoch` is open; records its epoch.
    pub fn await_generation_open(
        &self,
        last_epoch: &mut u64,
    ) -> std::result::Result<GenerationTicket, Interrupted> {
        let mut gate = lock(&self.gate);
        loop {
            self.halt.check()?;
            if gate.open && gate.epoch > *last_epoch {
                if let Some(ticket) = gate.ticket {
                    *last_epoch = gate.epoch;
                    return Ok(ticket);
                }
            }
            gate = wait(&self.gate_cv, gate);
        }
    }

    /// Band `band` has finished its border row for `epoch`.
    pub fn finalize_border(&self, band: usize, epoch: u64) {
        self.borders[band].post(epoch);
    }

    /// Wait for band `band`'s finalize and consume it.
    pub fn await_border(&self, band: usize) -> std::result::Result<(), Interrupted> {
        self.borders[band].take(&self.halt)
    }

    /// Wait until band `band` has finalized its border for `epoch`, leaving the unit in place.
    pub fn observe_border(&self, band: usize, epoch: u64) -> std::result::Result<(), Interrupted> {
        self.borders[band].observe(epoch, &self.halt)
    }

    /// The last band has finished its interior rows, including the row that
    /// wraps onto band 0's border row.
    pub fn post_seam(&self, epoch: u64) {
        self.seam.post(epoch);
    }

    pub fn await_seam(&self) -> std::result::Result<(), Interrupted> {
        self.seam.take(&self.halt)
    }

    /// Merge a band's fragment into the accumulator and count down the ready-latch.
    pub fn submit_stats(&self, fragment: &StatsFragment) {
        let mut ledger = lock(&self.ledger);
        ledger.totals.merge(fragment);
        ledger.pending = ledger.pending.saturating_sub(1);
        if ledger.pending == 0 {
            self.ledger_cv.notify_all();
        }
    }

    /// Reusable barrier for exactly `workers` arrivals. The releasing arrival
    /// closes the gate, unless the driver has already opened a newer epoch.
    pub fn await_quorum(&self, epoch: u64) -> std::result::Result<(), Interrupted> {
        let mut quorum = lock(&self.quorum);
        self.halt.check()?;
        let round = quorum.round;
        quorum.arrived += 1;
        if quorum.arrived == self.workers {
            quorum.arrived = 0;
            quorum.round = quorum.round.wrapping_add(1);
            self.quorum_cv.notify_all();
            drop(quorum);
            self.close_gate(epoch);
            return Ok(());
        }
        while quorum.round == round {
            self.halt.check()?;
            quorum = wait(&self.quorum_cv, quorum);
        }
        Ok(())
    }

    fn close_gate(&self, epoch: u64) {
        let mut gate = lock(&self.gate);
        if gate.epoch == epoch {
            gate.open = false;
        }
    }

    // ---- lifecycle ----

    pub fn worker_started(&self) {
        *lock(&self.live) += 1;
    }

    pub fn worker_exited(&self) {
        let mut live = lock(&self.live);
        *live = live.saturating_sub(1);
        self.live_cv.notify_all();
    }

    /// Wait up to `timeout` for every worker to exit. Returns whether they all did.
    pub fn await_workers_exit(&self, timeout: Duration) -> bool {
        let live = lock(&self.live);
        let (live, _) = self
            .live_cv
            .wait_timeout_while(live, timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *live == 0
    }

    /// Ask every worker to exit and wake anyone blocked.
    pub fn request_stop(&self) {
        self.halt.stopping.store(true, Ordering::Release);
        self.wake_all();
    }

    /// A worker left mid-generation: fail the current and every later generation.
    pub fn break_quorum(&self) {
        self.halt.broken.store(true, Ordering::Release);
        self.wake_all();
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.halt.broken.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.halt.stopping.load(Ordering::Acquire)
    }

    fn wake_all(&self) {
        drop(lock(&self.gate));
        self.gate_cv.notify_all();
        drop(lock(&self.quorum));
        self.quorum_cv.notify_all();
        drop(lock(&self.ledger));
        self.ledger_cv.notify_all();
        for border in &self.borders {
            border.wake();
        }
        self.seam.wake();
    }
}
