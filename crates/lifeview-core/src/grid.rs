//! Contract for the cellular automaton driven by the viewer.
//!
//! The automaton itself lives outside this crate. The controller only
//! needs point mutations, a generation step, and one of two read
//! capabilities: a dense row-major byte buffer or a sparse list of live
//! coordinates. Front ends pick whichever their automaton provides.

/// Narrow operation set every automaton collaborator exposes.
///
/// Coordinates are signed so pannable front ends can address cells far
/// outside the seeded region. Bounded implementations define their own
/// wrap or clamp behavior for out-of-range writes; unbounded ones
/// accept any coordinate.
pub trait CellGrid {
    /// Grid width in cells. Advisory for unbounded implementations.
    fn width(&self) -> u32;

    /// Grid height in cells. Advisory for unbounded implementations.
    fn height(&self) -> u32;

    /// Set a cell alive. Idempotent.
    fn set_alive(&mut self, row: i64, col: i64);

    /// Set a cell dead. Idempotent.
    fn set_dead(&mut self, row: i64, col: i64);

    /// Advance exactly one generation under the automaton's own rule.
    fn tick(&mut self);
}

/// Dense read capability: one byte per cell, row-major, nonzero = alive.
///
/// The buffer length is `width() * height()` and indexing follows
/// `row * width + col` for in-range coordinates.
pub trait DenseRead: CellGrid {
    fn cell_buffer(&self) -> &[u8];
}

/// Sparse read capability: the coordinates of every live cell.
///
/// Order is unspecified. The list is rebuilt per call, matching how
/// sparse automatons hand their paint set to a renderer.
pub trait SparseRead: CellGrid {
    fn live_cells(&self) -> Vec<(i64, i64)>;
}
