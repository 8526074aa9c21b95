//! Named cell patterns and the registry they live in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::CellGrid;

#[derive(Debug, Error)]
pub enum StampError {
    #[error("unknown stamp pattern '{name}'")]
    UnknownStamp { name: String },
}

/// An ordered set of `(row_offset, col_offset)` pairs relative to an
/// anchor cell. Immutable once registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampPattern {
    name: String,
    offsets: Vec<(i64, i64)>,
}

impl StampPattern {
    pub fn new(name: impl Into<String>, offsets: Vec<(i64, i64)>) -> Self {
        Self {
            name: name.into(),
            offsets,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn offsets(&self) -> &[(i64, i64)] {
        &self.offsets
    }
}

/// How stamp offsets are mapped onto grid coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementPolicy {
    /// Floor-modulo the anchored coordinate against the grid
    /// dimensions, so negative offsets wrap to the far edge. For
    /// bounded grids.
    Wrap,
    /// Write the anchored coordinate as-is. For unbounded pannable
    /// grids, where range handling belongs to the automaton.
    #[default]
    Free,
}

impl PlacementPolicy {
    /// Set every cell of `pattern` alive around `(anchor_row, anchor_col)`.
    pub fn apply<G: CellGrid + ?Sized>(
        self,
        grid: &mut G,
        pattern: &StampPattern,
        anchor_row: i64,
        anchor_col: i64,
    ) {
        match self {
            Self::Wrap => {
                let height = i64::from(grid.height().max(1));
                let width = i64::from(grid.width().max(1));
                for &(dr, dc) in pattern.offsets() {
                    let row = (anchor_row + dr).rem_euclid(height);
                    let col = (anchor_col + dc).rem_euclid(width);
                    grid.set_alive(row, col);
                }
            }
            Self::Free => {
                for &(dr, dc) in pattern.offsets() {
                    grid.set_alive(anchor_row + dr, anchor_col + dc);
                }
            }
        }
    }
}

/// Fixed name-to-pattern registry.
pub struct StampLibrary {
    patterns: BTreeMap<String, StampPattern>,
}

impl Default for StampLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StampLibrary {
    /// Registry preloaded with the builtin patterns: `glider`,
    /// `square`, and `pulsar`.
    pub fn builtin() -> Self {
        let mut library = Self {
            patterns: BTreeMap::new(),
        };
        library.register(StampPattern::new(
            "glider",
            vec![(-1, 0), (0, 1), (1, -1), (1, 0), (1, 1)],
        ));
        library.register(StampPattern::new(
            "square",
            vec![(0, 0), (0, 1), (1, 0), (1, 1)],
        ));
        library.register(StampPattern::new("pulsar", pulsar_offsets()));
        library
    }

    pub fn register(&mut self, pattern: StampPattern) {
        self.patterns.insert(pattern.name().to_owned(), pattern);
    }

    pub fn get(&self, name: &str) -> Option<&StampPattern> {
        self.patterns.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// The period-3 pulsar: 48 cells in a 13x13 bounding box with 4-fold
/// symmetry. Arms sit at distances {2,3,4} along offsets {1,6} in each
/// quadrant, mirrored across both axes.
fn pulsar_offsets() -> Vec<(i64, i64)> {
    let mut offsets = Vec::with_capacity(48);
    for &a in &[2i64, 3, 4] {
        for &b in &[1i64, 6] {
            for &(sr, sc) in &[(1i64, 1i64), (1, -1), (-1, 1), (-1, -1)] {
                offsets.push((sr * a, sc * b));
                offsets.push((sr * b, sc * a));
            }
        }
    }
    offsets
}
