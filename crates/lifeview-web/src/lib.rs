#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use lifeview_core::{
    CellGrid, ControllerConfig, CullPolicy, DenseRead, FrameBody, FrameHandle, FramePump,
    FrameScheduler, FrameVerdict, InteractionController, Modifiers, Pacing, PlacementPolicy,
    PointerButton, Reaction, RenderDriver, RenderStyle, Rgb, Surface, Viewport, ViewportConfig,
};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use slotmap::SlotMap;
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

const MAX_UNIVERSE_CELLS: u64 = 4_194_304;

#[wasm_bindgen]
pub struct ViewerHandle {
    inner: Rc<RefCell<Viewer>>,
}

/// Dense torus universe backing the browser build. Cells live in one
/// `Vec<u8>` of zeros and ones so the host can view them directly in
/// wasm memory.
struct DenseUniverse {
    width: u32,
    height: u32,
    cells: Vec<u8>,
    scratch: Vec<u8>,
    generation: u64,
}

impl DenseUniverse {
    fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let len = (width * height) as usize;
        Self {
            width,
            height,
            cells: vec![0; len],
            scratch: vec![0; len],
            generation: 0,
        }
    }

    fn index(&self, row: i64, col: i64) -> usize {
        let row = row.rem_euclid(i64::from(self.height));
        let col = col.rem_euclid(i64::from(self.width));
        (row * i64::from(self.width) + col) as usize
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn live_count(&self) -> u32 {
        self.cells.iter().map(|cell| u32::from(*cell)).sum()
    }

    fn is_alive(&self, row: i64, col: i64) -> bool {
        self.cells[self.index(row, col)] == 1
    }

    fn toggle_cell(&mut self, row: i64, col: i64) -> bool {
        let index = self.index(row, col);
        self.cells[index] ^= 1;
        self.cells[index] == 1
    }

    fn clear(&mut self) {
        self.cells.fill(0);
        self.generation = 0;
    }

    /// Deterministic starter population: every even index plus every
    /// multiple of seven.
    fn seed_starter(&mut self) {
        for (index, cell) in self.cells.iter_mut().enumerate() {
            *cell = u8::from(index % 2 == 0 || index % 7 == 0);
        }
    }
}

impl CellGrid for DenseUniverse {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_alive(&mut self, row: i64, col: i64) {
        let index = self.index(row, col);
        self.cells[index] = 1;
    }

    fn set_dead(&mut self, row: i64, col: i64) {
        let index = self.index(row, col);
        self.cells[index] = 0;
    }

    fn tick(&mut self) {
        let width = i64::from(self.width);
        let height = i64::from(self.height);
        for row in 0..height {
            for col in 0..width {
                let mut neighbors = 0u8;
                for delta_row in [-1i64, 0, 1] {
                    for delta_col in [-1i64, 0, 1] {
                        if delta_row == 0 && delta_col == 0 {
                            continue;
                        }
                        neighbors += self.cells[self.index(row + delta_row, col + delta_col)];
                    }
                }
                let index = (row * width + col) as usize;
                let alive = self.cells[index] == 1;
                self.scratch[index] =
                    u8::from(matches!((alive, neighbors), (true, 2) | (true, 3) | (false, 3)));
            }
        }
        std::mem::swap(&mut self.cells, &mut self.scratch);
        self.generation += 1;
    }
}

impl DenseRead for DenseUniverse {
    fn cell_buffer(&self) -> &[u8] {
        &self.cells
    }
}

/// Pump that records wake intents for the JS host to schedule.
///
/// `Animation` asks for a `requestAnimationFrame` callback; `Delay`
/// asks for a `setTimeout`. Either way the host answers by calling
/// `ViewerHandle::onFrame` with its clock.
#[derive(Default)]
struct CallbackPump {
    pending: SlotMap<FrameHandle, FrameWait>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum FrameWait {
    Animation,
    Delay(f64),
}

impl CallbackPump {
    fn take(&mut self) -> Option<FrameHandle> {
        let handle = self.pending.keys().next()?;
        self.pending.remove(handle);
        Some(handle)
    }

    fn next_wait_ms(&self) -> Option<f64> {
        self.pending
            .values()
            .map(|wait| match wait {
                FrameWait::Animation => 0.0,
                FrameWait::Delay(ms) => *ms,
            })
            .fold(None, |acc, ms| {
                Some(acc.map_or(ms, |current: f64| current.min(ms)))
            })
    }
}

impl FramePump for CallbackPump {
    fn request_frame(&mut self) -> FrameHandle {
        self.pending.insert(FrameWait::Animation)
    }

    fn request_delay(&mut self, delay: std::time::Duration) -> FrameHandle {
        self.pending
            .insert(FrameWait::Delay(delay.as_secs_f64() * 1000.0))
    }

    fn cancel(&mut self, handle: FrameHandle) {
        self.pending.remove(handle);
    }
}

/// Raster target over a 2D canvas context. Coordinates arrive in
/// surface pixels; the host applies no further transform.
struct Canvas2dSurface {
    ctx: CanvasRenderingContext2d,
    width: u32,
    height: u32,
}

impl Canvas2dSurface {
    fn new(ctx: CanvasRenderingContext2d, width: u32, height: u32) -> Self {
        Self { ctx, width, height }
    }
}

fn css_color(color: Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", color.r, color.g, color.b)
}

impl Surface for Canvas2dSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgb) {
        self.ctx.set_fill_style_str(&css_color(color));
        self.ctx
            .fill_rect(0.0, 0.0, f64::from(self.width), f64::from(self.height));
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgb) {
        self.ctx.set_fill_style_str(&css_color(color));
        self.ctx.fill_rect(x, y, width, height);
    }

    fn stroke_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgb) {
        self.ctx.set_stroke_style_str(&css_color(color));
        self.ctx.set_line_width(1.0);
        self.ctx.begin_path();
        self.ctx.move_to(x0, y0);
        self.ctx.line_to(x1, y1);
        self.ctx.stroke();
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
struct ViewerOptions {
    width: u32,
    height: u32,
    viewport: ViewportConfig,
    style: RenderStyle,
    target_fps: Option<f64>,
    autoplay: bool,
    placement_wrap: bool,
    starter: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            viewport: ViewportConfig::default(),
            style: RenderStyle::default(),
            target_fps: None,
            autoplay: true,
            placement_wrap: false,
            starter: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateReportDto {
    latest: u32,
    mean: u32,
    min: u32,
    max: u32,
}

struct Viewer {
    universe: DenseUniverse,
    viewport: Viewport,
    controller: InteractionController,
    driver: RenderDriver,
    scheduler: FrameScheduler,
    pump: CallbackPump,
    surface: Option<Canvas2dSurface>,
}

struct FramePass<'a> {
    universe: &'a mut DenseUniverse,
    viewport: &'a Viewport,
    driver: &'a RenderDriver,
    surface: &'a mut Option<Canvas2dSurface>,
}

impl FrameBody for FramePass<'_> {
    fn tick(&mut self) {
        self.universe.tick();
    }

    fn draw(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            self.driver.render_dense(surface, self.viewport, self.universe);
        }
    }
}

impl Viewer {
    fn new(options: ViewerOptions) -> Self {
        let mut universe = DenseUniverse::new(options.width, options.height);
        if options.starter {
            universe.seed_starter();
        }

        let controller = InteractionController::new(ControllerConfig {
            placement: if options.placement_wrap {
                PlacementPolicy::Wrap
            } else {
                PlacementPolicy::Free
            },
            ..ControllerConfig::default()
        });

        let pacing = options
            .target_fps
            .map_or(Pacing::EveryFrame, |fps| Pacing::TargetRate { fps });

        let mut pump = CallbackPump::default();
        let mut scheduler = FrameScheduler::start(&mut pump, pacing, 0.0);
        if !options.autoplay {
            scheduler.pause(&mut pump);
        }

        Self {
            universe,
            viewport: Viewport::new(options.viewport),
            controller,
            driver: RenderDriver::new(options.style, CullPolicy::default()),
            scheduler,
            pump,
            surface: None,
        }
    }

    fn render(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            self.driver
                .render_dense(surface, &self.viewport, &self.universe);
        }
    }

    fn after(&mut self, reaction: Reaction) -> bool {
        if reaction.redraw_needed() {
            self.render();
            true
        } else {
            false
        }
    }

    fn on_frame(&mut self, now_ms: f64) -> bool {
        if self.pump.take().is_none() {
            return false;
        }
        let mut pass = FramePass {
            universe: &mut self.universe,
            viewport: &self.viewport,
            driver: &self.driver,
            surface: &mut self.surface,
        };
        self.scheduler.on_wake(&mut self.pump, now_ms, &mut pass) == FrameVerdict::Admitted
    }
}

#[wasm_bindgen]
impl ViewerHandle {
    /// Bind (or rebind) the canvas context the viewer rasters into.
    /// `width` and `height` are backing-store pixels; `dpr` maps the
    /// host's CSS-pixel pointer coordinates onto them.
    #[wasm_bindgen(js_name = attachCanvas)]
    pub fn attach_canvas(&self, ctx: CanvasRenderingContext2d, width: u32, height: u32, dpr: f64) {
        let mut viewer = self.inner.borrow_mut();
        viewer.surface = Some(Canvas2dSurface::new(ctx, width, height));
        viewer.viewport.set_surface_size(width, height);
        viewer.viewport.set_surface_scale(dpr, dpr);
        viewer.render();
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&self, x: f64, y: f64, secondary: bool, ctrl: bool, shift: bool) -> bool {
        let mut viewer = self.inner.borrow_mut();
        let button = if secondary {
            PointerButton::Secondary
        } else {
            PointerButton::Primary
        };
        let mods = Modifiers { ctrl, shift };
        let Viewer {
            universe,
            viewport,
            controller,
            ..
        } = &mut *viewer;
        let reaction = controller.pointer_down(universe, viewport, x, y, button, mods);
        viewer.after(reaction)
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&self, x: f64, y: f64, ctrl: bool, shift: bool) -> bool {
        let mut viewer = self.inner.borrow_mut();
        let Viewer {
            universe,
            viewport,
            controller,
            ..
        } = &mut *viewer;
        let reaction = controller.pointer_move(universe, viewport, x, y, Modifiers { ctrl, shift });
        viewer.after(reaction)
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&self, x: f64, y: f64, secondary: bool) -> bool {
        let mut viewer = self.inner.borrow_mut();
        let button = if secondary {
            PointerButton::Secondary
        } else {
            PointerButton::Primary
        };
        let Viewer {
            universe,
            viewport,
            controller,
            ..
        } = &mut *viewer;
        let reaction = controller.pointer_up(universe, viewport, x, y, button);
        viewer.after(reaction)
    }

    /// Grid cell under a pointer position as `[row, col]`, clamped into
    /// the universe bounds. For hover readouts and cursor highlights.
    #[wasm_bindgen(js_name = hoveredCell)]
    pub fn hovered_cell(&self, x: f64, y: f64) -> Vec<i32> {
        let viewer = self.inner.borrow();
        let (row, col) = viewer.viewport.screen_to_cell_clamped(
            x,
            y,
            viewer.universe.height(),
            viewer.universe.width(),
        );
        vec![row as i32, col as i32]
    }

    pub fn wheel(&self, delta_y: f64) -> bool {
        let mut viewer = self.inner.borrow_mut();
        let Viewer {
            viewport,
            controller,
            ..
        } = &mut *viewer;
        let reaction = controller.wheel(viewport, delta_y);
        viewer.after(reaction)
    }

    /// Run one scheduled frame. `now_ms` is the host clock, usually
    /// `performance.now()`. Returns whether the canvas was repainted.
    #[wasm_bindgen(js_name = onFrame)]
    pub fn on_frame(&self, now_ms: f64) -> bool {
        self.inner.borrow_mut().on_frame(now_ms)
    }

    /// How the host should schedule the next `onFrame` call: `0` asks
    /// for an animation frame, a positive value for a timeout of that
    /// many milliseconds, and `undefined` for nothing (paused).
    #[wasm_bindgen(js_name = desiredWaitMs)]
    pub fn desired_wait_ms(&self) -> Option<f64> {
        self.inner.borrow().pump.next_wait_ms()
    }

    pub fn play(&self) -> bool {
        let mut viewer = self.inner.borrow_mut();
        let Viewer {
            scheduler, pump, ..
        } = &mut *viewer;
        scheduler.play(pump)
    }

    pub fn pause(&self) -> bool {
        let mut viewer = self.inner.borrow_mut();
        let Viewer {
            scheduler, pump, ..
        } = &mut *viewer;
        scheduler.pause(pump)
    }

    pub fn toggle(&self) {
        let mut viewer = self.inner.borrow_mut();
        let Viewer {
            scheduler, pump, ..
        } = &mut *viewer;
        scheduler.toggle(pump);
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.inner.borrow().scheduler.is_running()
    }

    #[wasm_bindgen(js_name = playbackGlyph)]
    pub fn playback_glyph(&self) -> String {
        self.inner.borrow().scheduler.playback_glyph().to_string()
    }

    /// Retarget the frame cadence; `undefined` returns to one tick per
    /// animation frame.
    #[wasm_bindgen(js_name = setTargetFps)]
    pub fn set_target_fps(&self, fps: Option<f64>) {
        let mut viewer = self.inner.borrow_mut();
        let pacing = fps.map_or(Pacing::EveryFrame, |fps| Pacing::TargetRate { fps });
        let Viewer {
            scheduler, pump, ..
        } = &mut *viewer;
        scheduler.set_pacing(pump, pacing);
    }

    /// Frame-rate summary over the trailing window, or `undefined`
    /// before any frame has been admitted.
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        let viewer = self.inner.borrow();
        let report = viewer.scheduler.stats().report().map(|report| RateReportDto {
            latest: report.latest,
            mean: report.mean,
            min: report.min,
            max: report.max,
        });
        to_value(&report).map_err(js_error)
    }

    #[wasm_bindgen(js_name = selectStamp)]
    pub fn select_stamp(&self, name: String) {
        self.inner.borrow_mut().controller.select_stamp(name);
    }

    #[wasm_bindgen(js_name = stampNames)]
    pub fn stamp_names(&self) -> Vec<String> {
        self.inner
            .borrow()
            .controller
            .library()
            .names()
            .map(str::to_owned)
            .collect()
    }

    #[wasm_bindgen(js_name = setPlacementWrap)]
    pub fn set_placement_wrap(&self, wrap: bool) {
        let placement = if wrap {
            PlacementPolicy::Wrap
        } else {
            PlacementPolicy::Free
        };
        self.inner.borrow_mut().controller.set_placement(placement);
    }

    #[wasm_bindgen(js_name = setCell)]
    pub fn set_cell(&self, row: i32, col: i32, alive: bool) {
        let mut viewer = self.inner.borrow_mut();
        if alive {
            viewer.universe.set_alive(i64::from(row), i64::from(col));
        } else {
            viewer.universe.set_dead(i64::from(row), i64::from(col));
        }
        viewer.render();
    }

    #[wasm_bindgen(js_name = toggleCell)]
    pub fn toggle_cell(&self, row: i32, col: i32) -> bool {
        let mut viewer = self.inner.borrow_mut();
        let alive = viewer.universe.toggle_cell(i64::from(row), i64::from(col));
        viewer.render();
        alive
    }

    #[wasm_bindgen(js_name = cellAt)]
    pub fn cell_at(&self, row: i32, col: i32) -> bool {
        self.inner
            .borrow()
            .universe
            .is_alive(i64::from(row), i64::from(col))
    }

    pub fn clear(&self) {
        let mut viewer = self.inner.borrow_mut();
        viewer.universe.clear();
        viewer.render();
    }

    #[wasm_bindgen(js_name = seedStarter)]
    pub fn seed_starter(&self) {
        let mut viewer = self.inner.borrow_mut();
        viewer.universe.seed_starter();
        viewer.render();
    }

    /// Repaint from current state without advancing a generation.
    pub fn render(&self) {
        self.inner.borrow_mut().render();
    }

    pub fn generation(&self) -> f64 {
        self.inner.borrow().universe.generation() as f64
    }

    #[wasm_bindgen(js_name = liveCells)]
    pub fn live_cells(&self) -> u32 {
        self.inner.borrow().universe.live_count()
    }

    pub fn width(&self) -> u32 {
        self.inner.borrow().universe.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.borrow().universe.height()
    }

    #[wasm_bindgen(js_name = panX)]
    pub fn pan_x(&self) -> f64 {
        self.inner.borrow().viewport.pan().0 as f64
    }

    #[wasm_bindgen(js_name = panY)]
    pub fn pan_y(&self) -> f64 {
        self.inner.borrow().viewport.pan().1 as f64
    }

    #[wasm_bindgen(js_name = cellEdge)]
    pub fn cell_edge(&self) -> f64 {
        self.inner.borrow().viewport.cell_px()
    }

    #[wasm_bindgen(js_name = visibleCells)]
    pub fn visible_cells(&self) -> u32 {
        self.inner.borrow().viewport.visible_cells()
    }

    /// Raw pointer into the cell buffer, one byte per cell in row-major
    /// order. Valid only until the next tick, clear, or reseed; re-read
    /// it after every frame.
    #[wasm_bindgen(js_name = cellsPtr)]
    pub fn cells_ptr(&self) -> *const u8 {
        self.inner.borrow().universe.cell_buffer().as_ptr()
    }

    #[wasm_bindgen(js_name = cellsLen)]
    pub fn cells_len(&self) -> u32 {
        self.inner.borrow().universe.width() * self.inner.borrow().universe.height()
    }
}

#[wasm_bindgen]
pub fn init_viewer(options: JsValue) -> Result<ViewerHandle, JsValue> {
    let options = if options.is_null() || options.is_undefined() {
        ViewerOptions::default()
    } else {
        from_value::<ViewerOptions>(options).map_err(js_error)?
    };

    if u64::from(options.width) * u64::from(options.height) > MAX_UNIVERSE_CELLS {
        return Err(js_error(
            "universe must stay at or below 4,194,304 cells for browser builds",
        ));
    }

    Ok(ViewerHandle {
        inner: Rc::new(RefCell::new(Viewer::new(options))),
    })
}

#[wasm_bindgen]
pub fn version() -> String {
    format!("lifeview-web {}", env!("CARGO_PKG_VERSION"))
}

#[wasm_bindgen]
pub fn default_viewer_options() -> Result<JsValue, JsValue> {
    to_value(&ViewerOptions::default()).map_err(js_error)
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsError::new(&err.to_string()).into()
}
