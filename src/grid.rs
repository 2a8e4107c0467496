// ============================================================================
// grid.rs — wator
// Toroidal cell matrix shared by every band worker. Each row sits behind its
// own lock, so single-cell reads and writes are atomic while bands touching
// different rows never contend.
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Entity};
use crate::error::{Result, WatorError};

/// Neighborhood offsets in scan order: North, East, South, West.
pub const NEIGHBOR_OFFSETS: [(isize, isize); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// A wrapped grid coordinate (always in range for the grid that produced it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

type Row = Vec<Option<Cell>>;

pub struct Grid {
    width: usize,
    height: usize,
    rows: Vec<Mutex<Row>>,
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Grid {
    /// Create an empty `width × height` grid.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width < 1 || height < 1 {
            return Err(WatorError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            rows: (0..height).map(|_| Mutex::new(vec![None; width])).collect(),
        })
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub const fn area(&self) -> usize {
        self.width * self.height
    }

    /// Wrap signed coordinates onto the torus.
    #[must_use]
    pub fn wrap(&self, x: isize, y: isize) -> Coord {
        Coord::new(
            x.rem_euclid(self.width as isize) as usize,
            y.rem_euclid(self.height as isize) as usize,
        )
    }

    /// Read the cell at `(x, y)`, wrapping toroidally.
    #[must_use]
    pub fn get(&self, x: isize, y: isize) -> Option<Cell> {
        self.cell(self.wrap(x, y))
    }

    /// Write the cell at `(x, y)`, wrapping toroidally, returning the previous occupant.
    pub fn set(&self, x: isize, y: isize, value: Option<Cell>) -> Option<Cell> {
        self.put(self.wrap(x, y), value)
    }

    /// Read an already wrapped coordinate.
    #[must_use]
    pub fn cell(&self, at: Coord) -> Option<Cell> {
        self.row(at.y)[at.x]
    }

    /// Write an already wrapped coordinate, returning the previous occupant.
    pub fn put(&self, at: Coord, value: Option<Cell>) -> Option<Cell> {
        std::mem::replace(&mut self.row(at.y)[at.x], value)
    }

    /// Occupy `at` with `cell` only if it is vacant. Returns whether the write happened.
    pub fn try_occupy(&self, at: Coord, cell: Cell) -> bool {
        let mut row = self.row(at.y);
        let slot = &mut row[at.x];
        if slot.is_some() {
            return false;
        }
        *slot = Some(cell);
        true
    }

    /// Swap in `value` only if the current occupant satisfies `accept`.
    /// Returns the displaced occupant on success.
    pub fn replace_if<F>(&self, at: Coord, accept: F, value: Option<Cell>) -> Option<Cell>
    where
        F: FnOnce(&Cell) -> bool,
    {
        let mut row = self.row(at.y);
        let slot = &mut row[at.x];
        if slot.as_ref().is_some_and(accept) {
            std::mem::replace(slot, value)
        } else {
            None
        }
    }

    /// The four wrapped neighbors of `at` in N, E, S, W order.
    #[must_use]
    pub fn neighbors(&self, at: Coord) -> [Coord; 4] {
        NEIGHBOR_OFFSETS.map(|(dx, dy)| self.wrap(at.x as isize + dx, at.y as isize + dy))
    }

    fn neighbors_where<F>(&self, at: Coord, keep: F) -> Vec<Coord>
    where
        F: Fn(Option<&Cell>) -> bool,
    {
        self.neighbors(at)
            .into_iter()
            .filter(|&n| keep(self.cell(n).as_ref()))
            .collect()
    }

    /// Vacant neighbors of `at`, N/E/S/W order.
    #[must_use]
    pub fn free_neighbors(&self, at: Coord) -> Vec<Coord> {
        self.neighbors_where(at, |c| c.is_none())
    }

    /// Neighbors of `at` currently holding prey.
    #[must_use]
    pub fn prey_neighbors(&self, at: Coord) -> Vec<Coord> {
        self.neighbors_where(at, |c| c.is_some_and(Cell::is_prey))
    }

    /// Neighbors of `at` currently holding predators.
    #[must_use]
    pub fn predator_neighbors(&self, at: Coord) -> Vec<Coord> {
        self.neighbors_where(at, |c| c.is_some_and(Cell::is_predator))
    }

    /// Copy of one row, taken under a single lock acquisition.
    #[must_use]
    pub fn row_snapshot(&self, y: usize) -> Vec<Option<Cell>> {
        self.row(y % self.height).clone()
    }

    /// Row-major copy of the whole grid (rows are locked one at a time).
    #[must_use]
    pub fn snapshot(&self) -> Vec<Option<Cell>> {
        let mut cells = Vec::with_capacity(self.area());
        for y in 0..self.height {
            cells.extend_from_slice(&self.row(y));
        }
        cells
    }

    /// Remove every entity.
    pub fn clear(&self) {
        for y in 0..self.height {
            self.row(y).fill(None);
        }
    }

    fn row(&self, y: usize) -> MutexGuard<'_, Row> {
        self.rows[y].lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pick one candidate, skewed toward the front of the list:
/// `index = round(u1 * u2 * 2n) mod n`.
pub fn pick_biased<T: Copy, R: Rng + ?Sized>(rng: &mut R, candidates: &[T]) -> Option<T> {
    let n = candidates.len();
    if n == 0 {
        return None;
    }
    let u1: f64 = rng.gen();
    let u2: f64 = rng.gen();
    let index = (u1 * u2 * 2.0 * n as f64).round() as usize % n;
    Some(candidates[index])
}

// ======================== Text form ========================

const EMPTY_GLYPH: char = '.';
const PREY_GLYPH: char = 'f';
const PREDATOR_GLYPH: char = 'S';
const WEAK_PREDATOR_GLYPH: char = 's';

fn glyph(cell: Option<&Cell>) -> char {
    match cell.map(|c| c.entity) {
        None => EMPTY_GLYPH,
        Some(Entity::Prey) => PREY_GLYPH,
        Some(Entity::Predator { energy }) if energy >= 2 => PREDATOR_GLYPH,
        Some(Entity::Predator { .. }) => WEAK_PREDATOR_GLYPH,
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            let row = self.row_snapshot(y);
            let line: String = row.iter().map(Option::as_ref).map(glyph).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl FromStr for Grid {
    type Err = WatorError;

    /// Parse the glyphs produced by `Display`. Every entity starts due at generation 0.
    fn from_str(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let height = lines.len();
        let width = lines.first().map_or(0, |line| line.chars().count());
        let grid = Self::new(width, height)?;

        for (y, line) in lines.iter().enumerate() {
            if line.chars().count() != width {
                return Err(WatorError::GridParse(format!(
                    "row {y} has {} cells, expected {width}",
                    line.chars().count()
                )));
            }
            for (x, ch) in line.chars().enumerate() {
                let cell = match ch {
                    EMPTY_GLYPH => None,
                    PREY_GLYPH => Some(Cell::prey(0)),
                    PREDATOR_GLYPH => Some(Cell::predator(0)),
                    WEAK_PREDATOR_GLYPH => Some(Cell::predator(0).with_energy(1)),
                    other => {
                        return Err(WatorError::GridParse(format!(
                            "unknown glyph {other:?} at ({x}, {y})"
                        )))
                    }
                };
                grid.put(Coord::new(x, y), cell);
            }
        }
        Ok(grid)
    }
}
