//! Wa-Tor predator/prey automaton on a toroidal grid, stepped by a pool of
//! long-lived row-band worker threads.
//!
//! Each generation the driver opens a gate; every band updates its interior
//! rows, then its border row once the band above has finished, then reports
//! statistics for its rows. The driver reads the merged totals once all bands
//! have reported.

pub mod cell;
pub mod config;
pub mod error;
pub mod grid;
pub mod rng;
pub mod simulation;
pub mod stats;
pub mod sync;
pub mod worker;

pub use cell::{Cell, Entity, Species, FEEDING_GAIN, PREDATOR_START_ENERGY};
pub use config::{ReproductionCycles, Schedule, WatorConfig};
pub use error::{Result, WatorError};
pub use grid::{Coord, Grid};
pub use simulation::{Simulation, StepOutcome};
pub use stats::{AgeBucket, AgeHistogram, Population, StatsFragment};
