// ============================================================================
// stats.rs — wator
// Population counts and age histograms. Bands collect a fragment over their
// own rows; fragments merge by addition into the per-generation totals.
// ============================================================================

use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;

use crate::cell::Species;
use crate::grid::Grid;

// ======================== Population ========================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Population {
    pub prey: usize,
    pub predators: usize,
    pub empty: usize,
}

impl Population {
    /// Number of cells covered by this count.
    #[must_use]
    pub const fn cells(&self) -> usize {
        self.prey + self.predators + self.empty
    }

    #[must_use]
    pub const fn occupied(&self) -> usize {
        self.prey + self.predators
    }

    #[must_use]
    pub const fn of(&self, species: Species) -> usize {
        match species {
            Species::Prey => self.prey,
            Species::Predator => self.predators,
        }
    }

    fn merge(&mut self, other: &Population) {
        self.prey += other.prey;
        self.predators += other.predators;
        self.empty += other.empty;
    }
}

// ======================== Age Histogram ========================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgeBucket {
    pub prey: usize,
    pub predators: usize,
}

/// Per-age counts of prey and predators, ordered by age.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AgeHistogram(BTreeMap<u32, AgeBucket>);

impl AgeHistogram {
    pub fn record(&mut self, age: u32, species: Species) {
        let bucket = self.0.entry(age).or_default();
        match species {
            Species::Prey => bucket.prey += 1,
            Species::Predator => bucket.predators += 1,
        }
    }

    pub fn merge(&mut self, other: &AgeHistogram) {
        for (&age, add) in &other.0 {
            let bucket = self.0.entry(age).or_default();
            bucket.prey += add.prey;
            bucket.predators += add.predators;
        }
    }

    #[must_use]
    pub fn get(&self, age: u32) -> AgeBucket {
        self.0.get(&age).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, AgeBucket)> + '_ {
        self.0.iter().map(|(&age, &bucket)| (age, bucket))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest age with at least one entity.
    #[must_use]
    pub fn oldest(&self) -> Option<u32> {
        self.0.keys().next_back().copied()
    }

    /// Mean age of one species, or `None` when it has no members.
    #[must_use]
    pub fn mean_age(&self, species: Species) -> Option<f64> {
        let (count, total) = self.iter().fold((0usize, 0u64), |(n, sum), (age, bucket)| {
            let k = match species {
                Species::Prey => bucket.prey,
                Species::Predator => bucket.predators,
            };
            (n + k, sum + u64::from(age) * k as u64)
        });
        (count > 0).then(|| total as f64 / count as f64)
    }
}

// ======================== Fragments ========================

/// Statistics over some set of rows. A full-grid fragment is a generation's totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsFragment {
    pub population: Population,
    pub ages: AgeHistogram,
    /// Sum of predator energy, for mean-energy reporting.
    pub predator_energy: i64,
}

impl StatsFragment {
    /// Scan `rows` of `grid`, one row lock at a time.
    #[must_use]
    pub fn collect(grid: &Grid, rows: Range<usize>) -> Self {
        let mut fragment = Self::default();
        for y in rows {
            for cell in grid.row_snapshot(y) {
                match cell {
                    None => fragment.population.empty += 1,
                    Some(c) => {
                        match c.species() {
                            Species::Prey => fragment.population.prey += 1,
                            Species::Predator => fragment.population.predators += 1,
                        }
                        fragment.predator_energy += i64::from(c.energy().unwrap_or(0));
                        fragment.ages.record(c.age, c.species());
                    }
                }
            }
        }
        fragment
    }

    /// Whole-grid census.
    #[must_use]
    pub fn census(grid: &Grid) -> Self {
        Self::collect(grid, 0..grid.height())
    }

    pub fn merge(&mut self, other: &StatsFragment) {
        self.population.merge(&other.population);
        self.ages.merge(&other.ages);
        self.predator_energy += other.predator_energy;
    }

    #[must_use]
    pub fn mean_predator_energy(&self) -> f64 {
        if self.population.predators == 0 {
            0.0
        } else {
            self.predator_energy as f64 / self.population.predators as f64
        }
    }

    /// Log a summary at INFO level, with deltas against an earlier snapshot.
    pub fn log(&self, generation: u32, prev: Option<&StatsFragment>) {
        let p = &self.population;
        let cells = p.cells().max(1) as f64;
        log::info!("══════════════ Generation {} ══════════════", generation);

        if let Some(prev) = prev {
            log::info!(
                "TRENDS: Δprey={:+} | Δpredators={:+}",
                p.prey as i64 - prev.population.prey as i64,
                p.predators as i64 - prev.population.predators as i64,
            );
        }

        log::info!(
            "POPULATION: prey={} ({:.1}%) | predators={} ({:.1}%) | empty={}",
            p.prey,
            p.prey as f64 / cells * 100.0,
            p.predators,
            p.predators as f64 / cells * 100.0,
            p.empty,
        );
        log::info!(
            "AGES: prey_mean={:.2} | predator_mean={:.2} | oldest={}",
            self.ages.mean_age(Species::Prey).unwrap_or(0.0),
            self.ages.mean_age(Species::Predator).unwrap_or(0.0),
            self.ages.oldest().unwrap_or(0),
        );
        log::info!("ENERGY: predator_mean={:.2}", self.mean_predator_energy());
    }
}
