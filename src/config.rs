// ============================================================================
// config.rs — wator
// Simulation parameters: grid size, scheduling, reproduction cycles, seeding.
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatorError};

pub const DEFAULT_WIDTH: usize = 80;
pub const DEFAULT_HEIGHT: usize = 40;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_PREY_CYCLE: u32 = 2;
pub const DEFAULT_PREDATOR_CYCLE: u32 = 3;
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 1_000;

/// Reproduction periods: a species breeds in generations where
/// `generation % cycle == 0`. Both periods are at least 1 for every value
/// of this type, including deserialized ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CyclesFile")]
pub struct ReproductionCycles {
    prey: u32,
    predator: u32,
}

impl Default for ReproductionCycles {
    fn default() -> Self {
        Self {
            prey: DEFAULT_PREY_CYCLE,
            predator: DEFAULT_PREDATOR_CYCLE,
        }
    }
}

impl ReproductionCycles {
    pub fn new(prey: u32, predator: u32) -> Result<Self> {
        if prey == 0 {
            return Err(WatorError::InvalidConfig("prey cycle must be at least 1"));
        }
        if predator == 0 {
            return Err(WatorError::InvalidConfig("predator cycle must be at least 1"));
        }
        Ok(Self { prey, predator })
    }

    /// Skips validation so tests can hand a worker a cycle that panics it.
    #[cfg(test)]
    pub(crate) const fn unchecked(prey: u32, predator: u32) -> Self {
        Self { prey, predator }
    }

    #[must_use]
    pub const fn prey(&self) -> u32 {
        self.prey
    }

    #[must_use]
    pub const fn predator(&self) -> u32 {
        self.predator
    }
}

/// On-disk shape of [`ReproductionCycles`]; missing periods take the defaults.
#[derive(Deserialize)]
#[serde(default)]
struct CyclesFile {
    prey: u32,
    predator: u32,
}

impl Default for CyclesFile {
    fn default() -> Self {
        Self {
            prey: DEFAULT_PREY_CYCLE,
            predator: DEFAULT_PREDATOR_CYCLE,
        }
    }
}

impl TryFrom<CyclesFile> for ReproductionCycles {
    type Error = WatorError;

    fn try_from(file: CyclesFile) -> Result<Self> {
        Self::new(file.prey, file.predator)
    }
}

/// How a generation is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// The calling thread updates every row in order.
    Sequential,
    /// A pool of long-lived band workers, one per horizontal row band.
    Banded { workers: usize },
}

impl Default for Schedule {
    fn default() -> Self {
        Self::Banded {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Top-level configuration for a [`crate::Simulation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatorConfig {
    pub width: usize,
    pub height: usize,
    pub schedule: Schedule,
    pub cycles: ReproductionCycles,
    /// Optional RNG seed; `None` draws a fresh one at start-up.
    pub rng_seed: Option<u64>,
    /// How long shutdown waits for workers before detaching them.
    pub shutdown_timeout_ms: u64,
}

impl Default for WatorConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            schedule: Schedule::default(),
            cycles: ReproductionCycles::default(),
            rng_seed: None,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl WatorConfig {
    /// Validates the configuration, returning an error if it is inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.width < 1 || self.height < 1 {
            return Err(WatorError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if let Schedule::Banded { workers: 0 } = self.schedule {
            return Err(WatorError::InvalidConfig("banded schedule needs at least one worker"));
        }
        Ok(())
    }

    /// The configured seed, or a fresh random one.
    #[must_use]
    pub fn resolve_seed(&self) -> u64 {
        self.rng_seed.unwrap_or_else(rand::random)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Number of bands a pool would actually run for this grid:
    /// `max(1, min(requested, height / 2))`, so every band owns at least two
    /// rows whenever there is more than one.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        match self.schedule {
            Schedule::Sequential => 1,
            Schedule::Banded { workers } => workers.min(self.height / 2).max(1),
        }
    }
}
