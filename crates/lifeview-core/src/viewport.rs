//! Pan/zoom coordinate math between screen pixels and grid cells.
//!
//! The viewport owns the pan offset and the zoom level (expressed as a
//! visible-cell count) and nothing else. It never touches the automaton
//! or a drawing surface, so every transform here is testable with plain
//! numbers.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tuning constant for the wheel response. A delta passes through
/// `ceil(K * tanh(K * delta))`, so one wheel event can never change the
/// visible-cell count by more than `K` rounded up.
const ZOOM_RESPONSE: f64 = 4.0;

/// Lower bound for the derived cell edge in backing-store pixels.
const MIN_CELL_PX: f64 = 1.0;

/// Initial viewport settings. Surface dimensions are backing-store
/// pixels; the scale factors compensate for hosts whose CSS size
/// differs from the backing store (1.0 when they match).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub surface_width: u32,
    pub surface_height: u32,
    pub visible_cells: u32,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        // 64 cells at a 5px edge plus 1px gridlines, the classic layout.
        Self {
            surface_width: 385,
            surface_height: 385,
            visible_cells: 64,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

/// Screen position captured when a drag begins, together with the pan
/// offset at that instant. Every subsequent drag move repositions the
/// pan absolutely from this anchor, so rounding never accumulates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragAnchor {
    pub screen_x: f64,
    pub screen_y: f64,
    pub pan_x: i64,
    pub pan_y: i64,
}

#[derive(Clone, Debug)]
pub struct Viewport {
    surface_w: u32,
    surface_h: u32,
    scale_x: f64,
    scale_y: f64,
    visible_cells: u32,
    pan_x: i64,
    pan_y: i64,
    cell_px: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl Viewport {
    pub fn new(config: ViewportConfig) -> Self {
        let mut viewport = Self {
            surface_w: config.surface_width.max(1),
            surface_h: config.surface_height.max(1),
            scale_x: sanitize_scale(config.scale_x),
            scale_y: sanitize_scale(config.scale_y),
            visible_cells: config.visible_cells.max(1),
            pan_x: 0,
            pan_y: 0,
            cell_px: MIN_CELL_PX,
        };
        viewport.rederive_cell_px();
        viewport
    }

    #[inline]
    pub fn pan(&self) -> (i64, i64) {
        (self.pan_x, self.pan_y)
    }

    /// Edge length of one cell in backing-store pixels. Always positive.
    #[inline]
    pub fn cell_px(&self) -> f64 {
        self.cell_px
    }

    /// Distance between the origins of adjacent cells: the cell edge
    /// plus the one-pixel grid line.
    #[inline]
    pub fn stride(&self) -> f64 {
        self.cell_px + 1.0
    }

    #[inline]
    pub fn visible_cells(&self) -> u32 {
        self.visible_cells
    }

    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_w = width.max(1);
        self.surface_h = height.max(1);
        self.rederive_cell_px();
    }

    /// Update the CSS-to-backing-store compensation factors. Non-finite
    /// or non-positive values are ignored.
    pub fn set_surface_scale(&mut self, scale_x: f64, scale_y: f64) {
        if scale_x.is_finite() && scale_x > 0.0 {
            self.scale_x = scale_x;
        }
        if scale_y.is_finite() && scale_y > 0.0 {
            self.scale_y = scale_y;
        }
    }

    /// Map a screen-space pointer position to the grid cell under it.
    ///
    /// `row = floor((screen_y * scale_y + pan_y) / (cell_px + 1))`, and
    /// likewise for the column. No bounds clamping: the pannable grid is
    /// conceptually unbounded, so far-off positions yield far-off cells.
    pub fn screen_to_cell(&self, screen_x: f64, screen_y: f64) -> (i64, i64) {
        let stride = self.stride();
        let row = ((screen_y * self.scale_y + self.pan_y as f64) / stride).floor() as i64;
        let col = ((screen_x * self.scale_x + self.pan_x as f64) / stride).floor() as i64;
        (row, col)
    }

    /// Like [`screen_to_cell`], but clamped into `[0, dim - 1]` for
    /// bounded grids: far-off positions land on the nearest edge cell.
    ///
    /// [`screen_to_cell`]: Self::screen_to_cell
    pub fn screen_to_cell_clamped(
        &self,
        screen_x: f64,
        screen_y: f64,
        rows: u32,
        cols: u32,
    ) -> (i64, i64) {
        let (row, col) = self.screen_to_cell(screen_x, screen_y);
        (
            row.clamp(0, i64::from(rows.max(1)) - 1),
            col.clamp(0, i64::from(cols.max(1)) - 1),
        )
    }

    /// Backing-store origin of a cell's fill rectangle:
    /// `x = col * (cell_px + 1) + 1 - pan_x`, and likewise for y. The
    /// rectangle extends `cell_px` pixels right and down from here.
    pub fn cell_origin(&self, row: i64, col: i64) -> (f64, f64) {
        let stride = self.stride();
        let x = col as f64 * stride + 1.0 - self.pan_x as f64;
        let y = row as f64 * stride + 1.0 - self.pan_y as f64;
        (x, y)
    }

    /// Adjust the visible-cell count from a wheel delta.
    ///
    /// The response is saturating and sub-linear: huge deltas move the
    /// count by at most `ceil(ZOOM_RESPONSE)` per event, and the count
    /// never drops below one cell. Returns whether anything changed.
    pub fn apply_zoom_delta(&mut self, wheel_delta_y: f64) -> bool {
        let delta = (ZOOM_RESPONSE * (ZOOM_RESPONSE * wheel_delta_y).tanh()).ceil();
        if delta == 0.0 || !delta.is_finite() {
            return false;
        }

        let current = i64::from(self.visible_cells);
        let next = (current + delta as i64).max(1);
        if next == current {
            return false;
        }
        if current + (delta as i64) < 1 {
            debug!(requested = current + delta as i64, "zoom clamped to one visible cell");
        }
        self.visible_cells = next as u32;
        self.rederive_cell_px();
        true
    }

    /// Capture the anchor for a starting drag at the given screen
    /// position.
    pub fn capture_anchor(&self, screen_x: f64, screen_y: f64) -> DragAnchor {
        DragAnchor {
            screen_x,
            screen_y,
            pan_x: self.pan_x,
            pan_y: self.pan_y,
        }
    }

    /// Reposition the pan for a drag in progress: anchor minus current
    /// pointer, applied on top of the pan captured with the anchor.
    /// Absolute each time, so repeated moves from one anchor cannot
    /// drift.
    pub fn drag_to(&mut self, anchor: &DragAnchor, screen_x: f64, screen_y: f64) {
        let dx = (anchor.screen_x - screen_x) * self.scale_x;
        let dy = (anchor.screen_y - screen_y) * self.scale_y;
        self.pan_x = anchor.pan_x + dx.round() as i64;
        self.pan_y = anchor.pan_y + dy.round() as i64;
    }

    /// Derive the cell edge from the surface's fixed dimension and the
    /// visible-cell count. The count divides the surface height into
    /// strides of `cell_px + 1`; the edge is floored so it stays
    /// positive at extreme zoom-out.
    fn rederive_cell_px(&mut self) {
        let stride = f64::from(self.surface_h) / f64::from(self.visible_cells.max(1));
        self.cell_px = (stride - 1.0).max(MIN_CELL_PX);
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}
