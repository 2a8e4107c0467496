// ============================================================================
// cell.rs — wator
// Prey and predator entities and the per-generation rules that move, feed,
// breed and starve them. Every write goes through the grid's conditional
// operations so two bands racing over a shared row never duplicate an entity.
// ============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ReproductionCycles;
use crate::grid::{pick_biased, Coord, Grid};

/// Energy a predator is born with.
pub const PREDATOR_START_ENERGY: i32 = 2;
/// Energy a predator gains from one meal.
pub const FEEDING_GAIN: i32 = 2;

/// Species tag used for placement and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Prey,
    Predator,
}

/// What occupies a cell, with the state only that kind carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Prey,
    Predator { energy: i32 },
}

/// An occupied cell.
///
/// `due_generation` is the generation at which this entity may next act;
/// a pass over the grid only updates cells whose value equals its own
/// generation, so entities that move ahead of the scan (or are born during
/// it) are never updated twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub entity: Entity,
    pub age: u32,
    pub due_generation: u32,
}

impl Cell {
    #[must_use]
    pub const fn prey(due_generation: u32) -> Self {
        Self {
            entity: Entity::Prey,
            age: 0,
            due_generation,
        }
    }

    #[must_use]
    pub const fn predator(due_generation: u32) -> Self {
        Self {
            entity: Entity::Predator {
                energy: PREDATOR_START_ENERGY,
            },
            age: 0,
            due_generation,
        }
    }

    /// A newborn of `species`.
    #[must_use]
    pub const fn spawn(species: Species, due_generation: u32) -> Self {
        match species {
            Species::Prey => Self::prey(due_generation),
            Species::Predator => Self::predator(due_generation),
        }
    }

    /// Same cell with a different predator energy. No effect on prey.
    #[must_use]
    pub const fn with_energy(mut self, value: i32) -> Self {
        if let Entity::Predator { .. } = self.entity {
            self.entity = Entity::Predator { energy: value };
        }
        self
    }

    #[must_use]
    pub const fn with_age(mut self, age: u32) -> Self {
        self.age = age;
        self
    }

    #[must_use]
    pub const fn species(&self) -> Species {
        match self.entity {
            Entity::Prey => Species::Prey,
            Entity::Predator { .. } => Species::Predator,
        }
    }

    #[must_use]
    pub const fn is_prey(&self) -> bool {
        matches!(self.entity, Entity::Prey)
    }

    #[must_use]
    pub const fn is_predator(&self) -> bool {
        matches!(self.entity, Entity::Predator { .. })
    }

    #[must_use]
    pub const fn energy(&self) -> Option<i32> {
        match self.entity {
            Entity::Prey => None,
            Entity::Predator { energy } => Some(energy),
        }
    }

    #[must_use]
    pub const fn is_due(&self, generation: u32) -> bool {
        self.due_generation == generation
    }

    fn add_energy(&mut self, delta: i32) {
        if let Entity::Predator { energy } = &mut self.entity {
            *energy += delta;
        }
    }

    /// True while this is still the not-yet-settled copy written by `generation`'s pass.
    fn is_pending(&self, species: Species, generation: u32) -> bool {
        self.species() == species && self.due_generation == generation
    }
}

/// Run one generation's rule for the entity found at `at`.
///
/// After the species rule, a surviving entity ages by one and becomes due at
/// `generation + 1`. The settled value is only written if the slot still holds
/// this entity's pending copy; a prey eaten after moving simply vanishes.
pub fn update<R: Rng + ?Sized>(
    cell: Cell,
    grid: &Grid,
    at: Coord,
    generation: u32,
    cycles: ReproductionCycles,
    rng: &mut R,
) {
    let mut me = cell;
    let settled_at = match me.entity {
        Entity::Prey => prey_turn(&me, grid, at, generation, cycles.prey(), rng),
        Entity::Predator { .. } => predator_turn(&mut me, grid, at, generation, cycles.predator(), rng),
    };
    let Some(here) = settled_at else {
        return;
    };

    let species = me.species();
    me.age = me.age.saturating_add(1);
    me.due_generation = generation.wrapping_add(1);
    grid.replace_if(here, |c| c.is_pending(species, generation), Some(me));
}

fn vacate(grid: &Grid, at: Coord, species: Species, generation: u32) {
    grid.replace_if(at, |c| c.is_pending(species, generation), None);
}

/// Relocate the pending copy of `me` from `from` to `to` if `to` is still free.
fn relocate(grid: &Grid, me: &Cell, from: Coord, to: Coord, generation: u32) -> bool {
    if !grid.try_occupy(to, *me) {
        return false;
    }
    vacate(grid, from, me.species(), generation);
    true
}

fn prey_turn<R: Rng + ?Sized>(
    me: &Cell,
    grid: &Grid,
    at: Coord,
    generation: u32,
    cycle: u32,
    rng: &mut R,
) -> Option<Coord> {
    let mut here = at;

    if let Some(target) = pick_biased(rng, &grid.free_neighbors(here)) {
        if relocate(grid, me, here, target, generation) {
            here = target;
        }
    }

    let free = grid.free_neighbors(here);
    if !free.is_empty() && generation % cycle == 0 {
        if let Some(target) = pick_biased(rng, &free) {
            grid.try_occupy(target, Cell::prey(generation.wrapping_add(1)));
        }
    }

    Some(here)
}

fn predator_turn<R: Rng + ?Sized>(
    me: &mut Cell,
    grid: &Grid,
    at: Coord,
    generation: u32,
    cycle: u32,
    rng: &mut R,
) -> Option<Coord> {
    let mut here = at;
    let mut fed = false;

    // First neighbor that still holds prey at the moment of the swap wins.
    for target in grid.prey_neighbors(here) {
        if grid.replace_if(target, Cell::is_prey, Some(*me)).is_some() {
            vacate(grid, here, Species::Predator, generation);
            me.add_energy(FEEDING_GAIN);
            here = target;
            fed = true;
            break;
        }
    }

    if !fed {
        if let Some(target) = pick_biased(rng, &grid.free_neighbors(here)) {
            if relocate(grid, me, here, target, generation) {
                here = target;
            }
        }
    }

    let free = grid.free_neighbors(here);
    if !free.is_empty() && generation % cycle == 0 {
        if let Some(target) = pick_biased(rng, &free) {
            if grid.try_occupy(target, Cell::predator(generation.wrapping_add(1))) {
                me.add_energy(-1);
            }
        }
    }

    if !fed {
        me.add_energy(-1);
    }

    if me.energy().unwrap_or(0) < 1 {
        vacate(grid, here, Species::Predator, generation);
        return None;
    }
    Some(here)
}
