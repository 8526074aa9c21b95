//! Sparse Conway universe on a fixed-size torus.
//!
//! Storage is the live-cell set, so huge mostly-dead boards cost what
//! their populations cost. Every write wraps into the torus, which
//! keeps stamp offsets and far-off pointer positions in range without
//! the callers thinking about it.

use std::collections::{HashMap, HashSet};

use lifeview_core::{CellGrid, SparseRead};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_RNG_SEED: u64 = 0x51DE_CA57_0B5E_55ED;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub width: u32,
    pub height: u32,
    /// Seed for the reseed commands. `None` falls back to a fixed seed
    /// so runs stay reproducible unless asked otherwise.
    pub rng_seed: Option<u64>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            rng_seed: None,
        }
    }
}

pub struct SparseUniverse {
    width: u32,
    height: u32,
    alive: HashSet<(i64, i64)>,
    generation: u64,
    rng: SmallRng,
}

impl SparseUniverse {
    pub fn new(config: UniverseConfig) -> Self {
        Self {
            width: config.width.max(1),
            height: config.height.max(1),
            alive: HashSet::new(),
            generation: 0,
            rng: SmallRng::seed_from_u64(config.rng_seed.unwrap_or(DEFAULT_RNG_SEED)),
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.alive.len()
    }

    pub fn is_alive(&self, row: i64, col: i64) -> bool {
        self.alive.contains(&self.wrap(row, col))
    }

    /// Flip one cell and report whether it is now alive.
    pub fn toggle_cell(&mut self, row: i64, col: i64) -> bool {
        let cell = self.wrap(row, col);
        if self.alive.remove(&cell) {
            false
        } else {
            self.alive.insert(cell);
            true
        }
    }

    pub fn clear(&mut self) {
        self.alive.clear();
        self.generation = 0;
        debug!("universe cleared");
    }

    /// Kill everything and revive each cell with probability `density`.
    /// A non-finite density seeds nothing.
    pub fn seed_random(&mut self, density: f64) {
        let density = if density.is_finite() {
            density.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.alive.clear();
        self.generation = 0;
        for row in 0..i64::from(self.height) {
            for col in 0..i64::from(self.width) {
                if self.rng.random_bool(density) {
                    self.alive.insert((row, col));
                }
            }
        }
        debug!(live = self.alive.len(), density, "universe reseeded");
    }

    /// The checkerboard-and-sevenths starter pattern: a cell is born
    /// when its row-major index divides by 2 or by 7.
    pub fn seed_fancy(&mut self) {
        self.alive.clear();
        self.generation = 0;
        let width = i64::from(self.width);
        for row in 0..i64::from(self.height) {
            for col in 0..width {
                let index = row * width + col;
                if index % 2 == 0 || index % 7 == 0 {
                    self.alive.insert((row, col));
                }
            }
        }
        debug!(live = self.alive.len(), "universe reseeded with starter pattern");
    }

    fn wrap(&self, row: i64, col: i64) -> (i64, i64) {
        (
            row.rem_euclid(i64::from(self.height)),
            col.rem_euclid(i64::from(self.width)),
        )
    }
}

impl Default for SparseUniverse {
    fn default() -> Self {
        Self::new(UniverseConfig::default())
    }
}

impl CellGrid for SparseUniverse {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_alive(&mut self, row: i64, col: i64) {
        let cell = self.wrap(row, col);
        self.alive.insert(cell);
    }

    fn set_dead(&mut self, row: i64, col: i64) {
        let cell = self.wrap(row, col);
        self.alive.remove(&cell);
    }

    /// One B3/S23 step. Only live cells and their neighbors can change,
    /// so the pass walks that candidate set instead of the whole board.
    fn tick(&mut self) {
        let mut neighbor_counts: HashMap<(i64, i64), u8> =
            HashMap::with_capacity(self.alive.len() * 4);
        for &(row, col) in &self.alive {
            for dr in -1..=1 {
                for dc in -1..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let neighbor = self.wrap(row + dr, col + dc);
                    *neighbor_counts.entry(neighbor).or_insert(0) += 1;
                }
            }
        }

        let mut next = HashSet::with_capacity(self.alive.len());
        for (cell, count) in neighbor_counts {
            if count == 3 || (count == 2 && self.alive.contains(&cell)) {
                next.insert(cell);
            }
        }
        self.alive = next;
        self.generation += 1;
    }
}

impl SparseRead for SparseUniverse {
    fn live_cells(&self) -> Vec<(i64, i64)> {
        let mut cells: Vec<_> = self.alive.iter().copied().collect();
        cells.sort_unstable();
        cells
    }
}
