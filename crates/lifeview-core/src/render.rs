//! Drawing contract between the viewport and a raster surface.
//!
//! The driver never owns a surface. Hosts implement [`Surface`] over
//! whatever they raster to (a canvas context, a terminal cell buffer, a
//! plain pixel vec in tests) and the driver issues clear/fill/stroke
//! calls against it.

use serde::{Deserialize, Serialize};

use crate::grid::{DenseRead, SparseRead};
use crate::viewport::Viewport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Colors and toggles for the cell raster.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    pub grid_color: Rgb,
    pub dead_color: Rgb,
    pub alive_color: Rgb,
    pub grid_lines: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            grid_color: Rgb::new(0xCC, 0xCC, 0xCC),
            dead_color: Rgb::new(0xFF, 0xFF, 0xFF),
            alive_color: Rgb::new(0x00, 0x00, 0x00),
            grid_lines: true,
        }
    }
}

/// Raster operations a host surface provides. Coordinates are
/// backing-store pixels; implementations clip however suits them.
pub trait Surface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Rgb);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgb);
    fn stroke_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgb);
}

/// Which off-surface cells the redraw may skip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CullPolicy {
    /// The behavior observed in the reference viewer: skip when the
    /// rect origin exceeds the right or bottom edge. Cells pushed past
    /// the top or left by a negative pan are still submitted.
    Permissive,
    /// Full outside test on both axes and both sides. Never submits an
    /// invisible cell, never skips a visible one.
    #[default]
    Exact,
}

impl CullPolicy {
    fn skips(self, x: f64, y: f64, edge: f64, surface_w: f64, surface_h: f64) -> bool {
        match self {
            Self::Permissive => x > surface_w || y > surface_h,
            Self::Exact => {
                x + edge <= 0.0 || y + edge <= 0.0 || x >= surface_w || y >= surface_h
            }
        }
    }
}

/// Issues the draw calls for one frame: background, grid lines, then
/// every live cell as a `cell_px` square at its viewport position.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderDriver {
    pub style: RenderStyle,
    pub cull: CullPolicy,
}

impl RenderDriver {
    pub fn new(style: RenderStyle, cull: CullPolicy) -> Self {
        Self { style, cull }
    }

    /// Redraw from a dense row-major cell buffer.
    pub fn render_dense<S: Surface, G: DenseRead>(
        &self,
        surface: &mut S,
        viewport: &Viewport,
        grid: &G,
    ) {
        self.begin_frame(surface, viewport);
        let width = grid.width() as usize;
        let buffer = grid.cell_buffer();
        for (index, &cell) in buffer.iter().enumerate() {
            if cell == 0 {
                continue;
            }
            let row = (index / width.max(1)) as i64;
            let col = (index % width.max(1)) as i64;
            self.fill_cell(surface, viewport, row, col);
        }
    }

    /// Redraw from a sparse live-cell list.
    pub fn render_sparse<S: Surface, G: SparseRead>(
        &self,
        surface: &mut S,
        viewport: &Viewport,
        grid: &G,
    ) {
        self.begin_frame(surface, viewport);
        for (row, col) in grid.live_cells() {
            self.fill_cell(surface, viewport, row, col);
        }
    }

    fn begin_frame<S: Surface>(&self, surface: &mut S, viewport: &Viewport) {
        surface.clear(self.style.dead_color);
        if self.style.grid_lines {
            self.draw_grid_lines(surface, viewport);
        }
    }

    fn fill_cell<S: Surface>(&self, surface: &mut S, viewport: &Viewport, row: i64, col: i64) {
        let (x, y) = viewport.cell_origin(row, col);
        let edge = viewport.cell_px();
        let (surface_w, surface_h) = surface.size();
        if self
            .cull
            .skips(x, y, edge, f64::from(surface_w), f64::from(surface_h))
        {
            return;
        }
        surface.fill_rect(x, y, edge, edge, self.style.alive_color);
    }

    /// One-pixel separators between cells, covering the index range the
    /// current pan brings into view.
    fn draw_grid_lines<S: Surface>(&self, surface: &mut S, viewport: &Viewport) {
        let (surface_w, surface_h) = surface.size();
        let width = f64::from(surface_w);
        let height = f64::from(surface_h);
        let stride = viewport.stride();
        let (pan_x, pan_y) = viewport.pan();

        let first_col = (pan_x as f64 / stride).floor() as i64;
        let cols = (width / stride).ceil() as i64 + 1;
        for col in first_col..=first_col + cols {
            let x = col as f64 * stride + 1.0 - pan_x as f64;
            surface.stroke_line(x, 0.0, x, height, self.style.grid_color);
        }

        let first_row = (pan_y as f64 / stride).floor() as i64;
        let rows = (height / stride).ceil() as i64 + 1;
        for row in first_row..=first_row + rows {
            let y = row as f64 * stride + 1.0 - pan_y as f64;
            surface.stroke_line(0.0, y, width, y, self.style.grid_color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellGrid;
    use crate::viewport::ViewportConfig;

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Clear(Rgb),
        Rect { x: f64, y: f64, w: f64, h: f64 },
        Line,
    }

    struct RecordingSurface {
        size: (u32, u32),
        ops: Vec<Op>,
    }

    impl RecordingSurface {
        fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                ops: Vec::new(),
            }
        }

        fn rects(&self) -> Vec<(f64, f64)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Rect { x, y, .. } => Some((*x, *y)),
                    _ => None,
                })
                .collect()
        }
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            self.size
        }
        fn clear(&mut self, color: Rgb) {
            self.ops.push(Op::Clear(color));
        }
        fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, _color: Rgb) {
            self.ops.push(Op::Rect { x, y, w, h });
        }
        fn stroke_line(&mut self, _x0: f64, _y0: f64, _x1: f64, _y1: f64, _color: Rgb) {
            self.ops.push(Op::Line);
        }
    }

    struct DenseFixture {
        width: u32,
        height: u32,
        buffer: Vec<u8>,
    }

    impl DenseFixture {
        fn new(width: u32, height: u32, live: &[(i64, i64)]) -> Self {
            let mut fixture = Self {
                width,
                height,
                buffer: vec![0; (width * height) as usize],
            };
            for &(row, col) in live {
                fixture.set_alive(row, col);
            }
            fixture
        }
    }

    impl CellGrid for DenseFixture {
        fn width(&self) -> u32 {
            self.width
        }
        fn height(&self) -> u32 {
            self.height
        }
        fn set_alive(&mut self, row: i64, col: i64) {
            let index = row * i64::from(self.width) + col;
            self.buffer[index as usize] = 1;
        }
        fn set_dead(&mut self, row: i64, col: i64) {
            let index = row * i64::from(self.width) + col;
            self.buffer[index as usize] = 0;
        }
        fn tick(&mut self) {}
    }

    impl DenseRead for DenseFixture {
        fn cell_buffer(&self) -> &[u8] {
            &self.buffer
        }
    }

    struct SparseFixture {
        live: Vec<(i64, i64)>,
    }

    impl CellGrid for SparseFixture {
        fn width(&self) -> u32 {
            64
        }
        fn height(&self) -> u32 {
            64
        }
        fn set_alive(&mut self, row: i64, col: i64) {
            self.live.push((row, col));
        }
        fn set_dead(&mut self, _row: i64, _col: i64) {}
        fn tick(&mut self) {}
    }

    impl SparseRead for SparseFixture {
        fn live_cells(&self) -> Vec<(i64, i64)> {
            self.live.clone()
        }
    }

    fn viewport_with_pan(pan_x: i64, pan_y: i64) -> Viewport {
        let mut viewport = Viewport::new(ViewportConfig {
            surface_width: 384,
            surface_height: 384,
            visible_cells: 64,
            scale_x: 1.0,
            scale_y: 1.0,
        });
        if pan_x != 0 || pan_y != 0 {
            let anchor = viewport.capture_anchor(0.0, 0.0);
            viewport.drag_to(&anchor, -(pan_x as f64), -(pan_y as f64));
        }
        viewport
    }

    fn plain_driver(cull: CullPolicy) -> RenderDriver {
        let style = RenderStyle {
            grid_lines: false,
            ..RenderStyle::default()
        };
        RenderDriver::new(style, cull)
    }

    #[test]
    fn frame_starts_with_dead_color_clear() {
        let driver = RenderDriver::default();
        let mut surface = RecordingSurface::new(384, 384);
        let grid = DenseFixture::new(4, 4, &[]);
        driver.render_dense(&mut surface, &viewport_with_pan(0, 0), &grid);

        assert_eq!(surface.ops[0], Op::Clear(Rgb::new(0xFF, 0xFF, 0xFF)));
        // Grid lines follow the clear and precede any cell fill.
        assert!(matches!(surface.ops[1], Op::Line));
    }

    #[test]
    fn live_cell_rect_uses_stride_plus_border_offset() {
        let driver = plain_driver(CullPolicy::Exact);
        let mut surface = RecordingSurface::new(384, 384);
        let grid = DenseFixture::new(8, 8, &[(2, 3)]);
        driver.render_dense(&mut surface, &viewport_with_pan(0, 0), &grid);

        // col 3 -> 3 * 6 + 1 = 19, row 2 -> 2 * 6 + 1 = 13, 5px square.
        assert_eq!(
            surface.ops.last(),
            Some(&Op::Rect {
                x: 19.0,
                y: 13.0,
                w: 5.0,
                h: 5.0
            })
        );
    }

    #[test]
    fn pan_shifts_cell_rects() {
        let driver = plain_driver(CullPolicy::Exact);
        let mut surface = RecordingSurface::new(384, 384);
        let grid = DenseFixture::new(8, 8, &[(2, 3)]);
        driver.render_dense(&mut surface, &viewport_with_pan(4, 9), &grid);

        assert_eq!(surface.rects(), vec![(15.0, 4.0)]);
    }

    #[test]
    fn dense_and_sparse_paths_submit_identical_rects() {
        let live = [(0, 0), (3, 5), (7, 7)];
        let driver = plain_driver(CullPolicy::Exact);
        let viewport = viewport_with_pan(0, 0);

        let mut dense_surface = RecordingSurface::new(384, 384);
        driver.render_dense(
            &mut dense_surface,
            &viewport,
            &DenseFixture::new(8, 8, &live),
        );

        let mut sparse_surface = RecordingSurface::new(384, 384);
        driver.render_sparse(
            &mut sparse_surface,
            &viewport,
            &SparseFixture {
                live: live.to_vec(),
            },
        );

        let mut dense_rects = dense_surface.rects();
        let mut sparse_rects = sparse_surface.rects();
        dense_rects.sort_by(|a, b| a.partial_cmp(b).unwrap());
        sparse_rects.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(dense_rects, sparse_rects);
    }

    #[test]
    fn culling_policies_agree_past_the_far_edge() {
        // Column 100 starts at x = 601, past a 384px surface.
        let grid = SparseFixture {
            live: vec![(0, 100)],
        };
        let viewport = viewport_with_pan(0, 0);

        for cull in [CullPolicy::Permissive, CullPolicy::Exact] {
            let mut surface = RecordingSurface::new(384, 384);
            plain_driver(cull).render_sparse(&mut surface, &viewport, &grid);
            assert!(
                surface.rects().is_empty(),
                "{cull:?} should cull past the far edge"
            );
        }
    }

    #[test]
    fn culling_policies_diverge_on_negative_side() {
        // Pan pushes cell (0, 0) to (-99, -99), fully off the surface.
        let grid = SparseFixture { live: vec![(0, 0)] };
        let viewport = viewport_with_pan(100, 100);

        let mut permissive_surface = RecordingSurface::new(384, 384);
        plain_driver(CullPolicy::Permissive).render_sparse(
            &mut permissive_surface,
            &viewport,
            &grid,
        );
        // The one-sided check misses the negative side and submits it.
        assert_eq!(permissive_surface.rects(), vec![(-99.0, -99.0)]);

        let mut exact_surface = RecordingSurface::new(384, 384);
        plain_driver(CullPolicy::Exact).render_sparse(&mut exact_surface, &viewport, &grid);
        assert!(exact_surface.rects().is_empty());
    }

    #[test]
    fn no_policy_skips_a_visible_cell() {
        let live: Vec<(i64, i64)> = (0..8).flat_map(|r| (0..8).map(move |c| (r, c))).collect();
        let viewport = viewport_with_pan(0, 0);

        for cull in [CullPolicy::Permissive, CullPolicy::Exact] {
            let mut surface = RecordingSurface::new(384, 384);
            plain_driver(cull).render_sparse(
                &mut surface,
                &viewport,
                &SparseFixture { live: live.clone() },
            );
            assert_eq!(surface.rects().len(), live.len(), "{cull:?} dropped a cell");
        }

        // A cell straddling the left edge is visible and must survive
        // the exact test too.
        let viewport = viewport_with_pan(3, 0);
        let mut surface = RecordingSurface::new(384, 384);
        plain_driver(CullPolicy::Exact).render_sparse(
            &mut surface,
            &viewport,
            &SparseFixture { live: vec![(0, 0)] },
        );
        assert_eq!(surface.rects(), vec![(-2.0, 1.0)]);
    }

    #[test]
    fn grid_lines_cover_the_panned_view() {
        let driver = RenderDriver::default();
        let mut surface = RecordingSurface::new(384, 384);
        let grid = DenseFixture::new(4, 4, &[]);
        driver.render_dense(&mut surface, &viewport_with_pan(13, 0), &grid);

        let lines = surface
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Line))
            .count();
        // 384px / 6px stride needs 65 boundaries per axis; one extra
        // line each side covers partial cells at the pan edges.
        assert!(lines >= 130, "expected full line coverage, got {lines}");
    }
}
