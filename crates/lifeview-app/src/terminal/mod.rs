use std::{
    collections::VecDeque,
    fs,
    io::{self, Stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use lifeview_core::{
    CellGrid, CullPolicy, FrameBody, FrameHandle, FramePump, FrameScheduler, FrameVerdict,
    InteractionController, Modifiers, Pacing, PlacementPolicy, PointerButton, Reaction,
    RenderDriver, Rgb, Surface, Viewport,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use serde::Serialize;
use slotmap::SlotMap;
use supports_color::{ColorLevel, Stream, on_cached};
use tracing::info;

use crate::{
    frontend::{Frontend, FrontendContext},
    universe::SparseUniverse,
};

const DEFAULT_TARGET_FPS: f64 = 8.0;
const MIN_TARGET_FPS: f64 = 1.0;
const MAX_TARGET_FPS: f64 = 60.0;
const FPS_STEP: f64 = 2.0;
const UI_TICK_MILLIS: u64 = 50;
const DEFAULT_HEADLESS_FRAMES: usize = 12;
const MAX_HEADLESS_FRAMES: usize = 360;
const HEADLESS_STEP: Duration = Duration::from_millis(150);
const EVENT_LOG_CAPACITY: usize = 16;
const WHEEL_NOTCH: f64 = 1.0;
const RESEED_DENSITY: f64 = 0.3;
const SIDEBAR_WIDTH: u16 = 36;

pub struct TerminalFrontend {
    frame_interval: Duration,
}

impl Default for TerminalFrontend {
    fn default() -> Self {
        Self {
            // Cadence for every-frame pacing, standing in for vsync.
            frame_interval: Duration::from_secs_f64(1.0 / 60.0),
        }
    }
}

impl Frontend for TerminalFrontend {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn run(&self, ctx: FrontendContext) -> Result<()> {
        if std::env::var_os("LIFEVIEW_TERMINAL_HEADLESS").is_some() {
            let report = self.run_headless(ctx)?;
            info!(
                target = "lifeview::terminal",
                frames = report.frames,
                generations = report.generations,
                live_cells = report.live_cells,
                visible_cells = report.visible_cells,
                running = report.running,
                rate_mean = report.rate_mean,
                "Terminal headless run completed"
            );
            return Ok(());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
        terminal.hide_cursor().ok();

        let result = run_event_loop(self, &mut terminal, ctx);

        terminal.show_cursor().ok();
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        if let Err(err) = execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)
        {
            tracing::error!(?err, "failed to leave alternate screen");
        }

        result
    }
}

impl TerminalFrontend {
    fn run_headless(&self, ctx: FrontendContext) -> Result<HeadlessReport> {
        let backend = ratatui::backend::TestBackend::new(100, 32);
        let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
        let mut app = TerminalApp::new(self, ctx);
        let frames = self.headless_frame_budget();

        let start = Instant::now();
        for index in 1..=frames {
            let now = start + HEADLESS_STEP * index as u32;
            app.run_due_frame(now);
            terminal.draw(|frame| app.draw(frame))?;
        }

        let report = HeadlessReport::collect(&app, frames);
        if let Some(path) = report_path_from_env() {
            report.write_json(&path).with_context(|| {
                format!("failed to write headless report to {}", path.display())
            })?;
        }

        Ok(report)
    }

    fn headless_frame_budget(&self) -> usize {
        std::env::var("LIFEVIEW_TERMINAL_HEADLESS_FRAMES")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(MAX_HEADLESS_FRAMES))
            .unwrap_or(DEFAULT_HEADLESS_FRAMES)
    }
}

fn report_path_from_env() -> Option<PathBuf> {
    std::env::var_os("LIFEVIEW_TERMINAL_HEADLESS_REPORT").map(PathBuf::from)
}

fn run_event_loop(
    frontend: &TerminalFrontend,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ctx: FrontendContext,
) -> Result<()> {
    let mut app = TerminalApp::new(frontend, ctx);

    loop {
        let now = Instant::now();
        app.run_due_frame(now);

        if app.take_dirty() {
            terminal.draw(|frame| app.draw(frame))?;
        }

        if event::poll(app.poll_timeout(now)).unwrap_or(false) {
            match event::read()? {
                Event::Key(key) => {
                    if app.handle_key(key)? {
                        break;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                Event::Resize(_, _) => app.mark_dirty(),
                _ => {}
            }
        }
    }

    Ok(())
}

/// Written summary of a headless run, for smoke tests and CI probes.
#[derive(Debug, Serialize)]
struct HeadlessReport {
    frames: usize,
    generations: u64,
    live_cells: usize,
    visible_cells: u32,
    running: bool,
    rate_latest: Option<u32>,
    rate_mean: Option<u32>,
    rate_min: Option<u32>,
    rate_max: Option<u32>,
}

impl HeadlessReport {
    fn collect(app: &TerminalApp, frames: usize) -> Self {
        let report = app.scheduler.stats().report();
        Self {
            frames,
            generations: app.universe.generation(),
            live_cells: app.universe.live_count(),
            visible_cells: app.viewport.visible_cells(),
            running: app.scheduler.is_running(),
            rate_latest: report.map(|r| r.latest),
            rate_mean: report.map(|r| r.mean),
            rate_min: report.map(|r| r.min),
            rate_max: report.map(|r| r.max),
        }
    }

    fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(self)?;
        fs::write(path, body)?;
        Ok(())
    }
}

/// Host-side frame timer. Handles map to wall-clock deadlines; the
/// event loop polls them due instead of sleeping.
struct TerminalPump {
    deadlines: SlotMap<FrameHandle, Instant>,
    frame_interval: Duration,
}

impl TerminalPump {
    fn new(frame_interval: Duration) -> Self {
        Self {
            deadlines: SlotMap::with_key(),
            frame_interval,
        }
    }

    fn take_due(&mut self, now: Instant) -> Option<FrameHandle> {
        let due = self
            .deadlines
            .iter()
            .find(|(_, deadline)| **deadline <= now)
            .map(|(handle, _)| handle)?;
        self.deadlines.remove(due);
        Some(due)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().copied().min()
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        self.deadlines.len()
    }
}

impl FramePump for TerminalPump {
    fn request_frame(&mut self) -> FrameHandle {
        self.deadlines.insert(Instant::now() + self.frame_interval)
    }

    fn request_delay(&mut self, delay: Duration) -> FrameHandle {
        self.deadlines.insert(Instant::now() + delay)
    }

    fn cancel(&mut self, handle: FrameHandle) {
        self.deadlines.remove(handle);
    }
}

/// One scheduled frame: advance the universe, then raster it.
struct ViewerFrame<'a> {
    universe: &'a mut SparseUniverse,
    viewport: &'a Viewport,
    driver: &'a RenderDriver,
    surface: &'a mut TextSurface,
}

impl FrameBody for ViewerFrame<'_> {
    fn tick(&mut self) {
        self.universe.tick();
    }

    fn draw(&mut self) {
        self.driver
            .render_sparse(self.surface, self.viewport, self.universe);
    }
}

struct TerminalApp {
    universe: SparseUniverse,
    viewport: Viewport,
    controller: InteractionController,
    driver: RenderDriver,
    surface: TextSurface,
    scheduler: FrameScheduler,
    pump: TerminalPump,
    started_at: Instant,
    palette: Palette,
    event_log: VecDeque<EventEntry>,
    stamp_names: Vec<String>,
    help_visible: bool,
    dirty: bool,
    canvas_area: Rect,
}

impl TerminalApp {
    fn new(frontend: &TerminalFrontend, ctx: FrontendContext) -> Self {
        let palette = Palette::detect();
        let controller = InteractionController::new(ctx.controller);
        let stamp_names: Vec<String> = controller.library().names().map(str::to_owned).collect();

        let mut pump = TerminalPump::new(frontend.frame_interval);
        let scheduler = FrameScheduler::start(
            &mut pump,
            Pacing::TargetRate {
                fps: DEFAULT_TARGET_FPS,
            },
            0.0,
        );

        Self {
            universe: ctx.universe,
            viewport: Viewport::new(ctx.viewport),
            controller,
            driver: RenderDriver::new(ctx.style, CullPolicy::default()),
            surface: TextSurface::new(palette),
            scheduler,
            pump,
            started_at: Instant::now(),
            palette,
            event_log: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
            stamp_names,
            help_visible: false,
            dirty: true,
            canvas_area: Rect::default(),
        }
    }

    fn run_due_frame(&mut self, now: Instant) {
        if self.pump.take_due(now).is_none() {
            return;
        }
        let now_ms = now.saturating_duration_since(self.started_at).as_secs_f64() * 1000.0;
        let mut body = ViewerFrame {
            universe: &mut self.universe,
            viewport: &self.viewport,
            driver: &self.driver,
            surface: &mut self.surface,
        };
        if self.scheduler.on_wake(&mut self.pump, now_ms, &mut body) == FrameVerdict::Admitted {
            self.dirty = true;
        }
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        let ui_tick = Duration::from_millis(UI_TICK_MILLIS);
        match self.pump.next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(now).min(ui_tick),
            None => ui_tick,
        }
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn render_to_surface(&mut self) {
        self.driver
            .render_sparse(&mut self.surface, &self.viewport, &self.universe);
    }

    fn react(&mut self, reaction: Reaction) {
        if reaction.redraw_needed() {
            self.render_to_surface();
            self.dirty = true;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _)
            | (KeyCode::Char('q'), _)
            | (KeyCode::Char('Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            (KeyCode::Char(' '), _) => {
                self.scheduler.toggle(&mut self.pump);
                self.push_event(
                    EventKind::Playback,
                    if self.scheduler.is_running() {
                        "Playback resumed"
                    } else {
                        "Playback paused"
                    },
                );
                self.dirty = true;
            }
            (KeyCode::Char('+') | KeyCode::Char('='), _) => {
                self.adjust_target_rate(FPS_STEP);
            }
            (KeyCode::Char('-') | KeyCode::Char('_'), _) => {
                self.adjust_target_rate(-FPS_STEP);
            }
            (KeyCode::Tab, _) => {
                self.cycle_stamp();
            }
            (KeyCode::Char('w'), _) => {
                let placement = match self.controller.placement() {
                    PlacementPolicy::Wrap => PlacementPolicy::Free,
                    PlacementPolicy::Free => PlacementPolicy::Wrap,
                };
                self.controller.set_placement(placement);
                self.push_event(
                    EventKind::Edit,
                    format!("Stamp placement: {}", placement_label(placement)),
                );
                self.dirty = true;
            }
            (KeyCode::Char('c'), _) => {
                self.universe.clear();
                self.push_event(EventKind::Edit, "Universe cleared");
                self.render_to_surface();
                self.dirty = true;
            }
            (KeyCode::Char('r'), _) => {
                self.universe.seed_random(RESEED_DENSITY);
                self.push_event(
                    EventKind::Edit,
                    format!("Random reseed, {} live", self.universe.live_count()),
                );
                self.render_to_surface();
                self.dirty = true;
            }
            (KeyCode::Char('f'), _) => {
                self.universe.seed_fancy();
                self.push_event(
                    EventKind::Edit,
                    format!("Starter pattern, {} live", self.universe.live_count()),
                );
                self.render_to_surface();
                self.dirty = true;
            }
            (KeyCode::Char('x'), _) => {
                self.driver.cull = match self.driver.cull {
                    CullPolicy::Permissive => CullPolicy::Exact,
                    CullPolicy::Exact => CullPolicy::Permissive,
                };
                self.push_event(
                    EventKind::View,
                    format!("Culling: {}", cull_label(self.driver.cull)),
                );
                self.render_to_surface();
                self.dirty = true;
            }
            (KeyCode::Char('g'), _) => {
                self.driver.style.grid_lines = !self.driver.style.grid_lines;
                self.push_event(
                    EventKind::View,
                    if self.driver.style.grid_lines {
                        "Grid lines on"
                    } else {
                        "Grid lines off"
                    },
                );
                self.render_to_surface();
                self.dirty = true;
            }
            (KeyCode::Char('?') | KeyCode::Char('h'), _) => {
                self.help_visible = !self.help_visible;
                self.dirty = true;
            }
            _ => {}
        }

        Ok(false)
    }

    fn adjust_target_rate(&mut self, delta: f64) {
        let fps = match self.scheduler.pacing() {
            Pacing::TargetRate { fps } => fps,
            Pacing::EveryFrame => DEFAULT_TARGET_FPS,
        };
        let fps = (fps + delta).clamp(MIN_TARGET_FPS, MAX_TARGET_FPS);
        self.scheduler
            .set_pacing(&mut self.pump, Pacing::TargetRate { fps });
        self.push_event(EventKind::Playback, format!("Target rate {fps:.0} fps"));
        self.dirty = true;
    }

    fn cycle_stamp(&mut self) {
        if self.stamp_names.is_empty() {
            return;
        }
        let current = self
            .stamp_names
            .iter()
            .position(|name| name == self.controller.selected_stamp())
            .unwrap_or(0);
        let next = self.stamp_names[(current + 1) % self.stamp_names.len()].clone();
        self.push_event(EventKind::Edit, format!("Stamp: {next}"));
        self.controller.select_stamp(next);
        self.dirty = true;
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.canvas_area.width == 0 || self.canvas_area.height == 0 {
            return;
        }
        let (x, y) = self.canvas_position(mouse.column, mouse.row);
        let mods = pointer_modifiers(mouse.modifiers);

        let reaction = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if self.canvas_contains(mouse) => self
                .controller
                .pointer_down(
                    &mut self.universe,
                    &mut self.viewport,
                    x,
                    y,
                    PointerButton::Primary,
                    mods,
                ),
            MouseEventKind::Down(MouseButton::Right) if self.canvas_contains(mouse) => self
                .controller
                .pointer_down(
                    &mut self.universe,
                    &mut self.viewport,
                    x,
                    y,
                    PointerButton::Secondary,
                    mods,
                ),
            MouseEventKind::Drag(_) | MouseEventKind::Moved => {
                self.controller
                    .pointer_move(&mut self.universe, &mut self.viewport, x, y, mods)
            }
            MouseEventKind::Up(MouseButton::Left) => self.controller.pointer_up(
                &mut self.universe,
                &mut self.viewport,
                x,
                y,
                PointerButton::Primary,
            ),
            MouseEventKind::Up(MouseButton::Right) => self.controller.pointer_up(
                &mut self.universe,
                &mut self.viewport,
                x,
                y,
                PointerButton::Secondary,
            ),
            MouseEventKind::ScrollUp => self.controller.wheel(&mut self.viewport, -WHEEL_NOTCH),
            MouseEventKind::ScrollDown => self.controller.wheel(&mut self.viewport, WHEEL_NOTCH),
            _ => Reaction::Quiet,
        };
        self.react(reaction);
    }

    fn canvas_position(&self, column: u16, row: u16) -> (f64, f64) {
        let x = i32::from(column) - i32::from(self.canvas_area.x);
        let y = i32::from(row) - i32::from(self.canvas_area.y);
        (f64::from(x), f64::from(y))
    }

    fn canvas_contains(&self, mouse: MouseEvent) -> bool {
        let area = self.canvas_area;
        mouse.column >= area.x
            && mouse.column < area.x + area.width
            && mouse.row >= area.y
            && mouse.row < area.y + area.height
    }

    fn push_event(&mut self, kind: EventKind, message: impl Into<String>) {
        if self.event_log.len() >= EVENT_LOG_CAPACITY {
            self.event_log.pop_front();
        }
        self.event_log.push_back(EventEntry {
            generation: self.universe.generation(),
            kind,
            message: message.into(),
        });
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(frame.area());

        self.draw_header(frame, outer[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(SIDEBAR_WIDTH)])
            .split(outer[1]);

        self.draw_canvas(frame, body[0]);

        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(6),
                Constraint::Length(9),
                Constraint::Min(3),
            ])
            .split(body[1]);

        self.draw_frame_rates(frame, sidebar[0]);
        self.draw_view_stats(frame, sidebar[1]);
        self.draw_events(frame, sidebar[2]);

        if self.help_visible {
            self.draw_help(frame);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let playback = if self.scheduler.is_running() {
            Span::styled(
                format!(" {} RUNNING ", self.scheduler.playback_glyph()),
                self.palette.running_style(),
            )
        } else {
            Span::styled(
                format!(" {} PAUSED ", self.scheduler.playback_glyph()),
                self.palette.paused_style(),
            )
        };

        let pacing = match self.scheduler.pacing() {
            Pacing::EveryFrame => String::from(" every frame "),
            Pacing::TargetRate { fps } => format!(" {fps:.0} fps "),
        };

        let status = format!(
            "Gen {:>6}  Live {:>5}  View {:>3} cells  Cell {:>4.1}px",
            self.universe.generation(),
            self.universe.live_count(),
            self.viewport.visible_cells(),
            self.viewport.cell_px(),
        );

        let mut line = Line::from(vec![Span::styled(status, self.palette.header_style())]);
        line.spans.push(Span::raw("  "));
        line.spans.push(playback);
        line.spans
            .push(Span::styled(pacing, self.palette.accent_style()));
        line.spans.push(Span::raw("  "));
        line.spans.push(Span::styled(
            format!(
                "Stamp {} ({})",
                self.controller.selected_stamp(),
                placement_label(self.controller.placement())
            ),
            self.palette.accent_style(),
        ));

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .title(self.palette.title("Life Viewer"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_canvas(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let title = format!(
            "Universe {}×{}",
            self.universe.width(),
            self.universe.height()
        );
        let block = Block::default()
            .title(self.palette.title(title))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.width < 2 || inner.height < 2 {
            return;
        }

        if inner != self.canvas_area {
            self.canvas_area = inner;
            self.viewport
                .set_surface_size(u32::from(inner.width), u32::from(inner.height));
            self.surface
                .resize(u32::from(inner.width), u32::from(inner.height));
            self.render_to_surface();
        }

        let mut lines = Vec::with_capacity(self.surface.height() as usize);
        for row in self.surface.rows() {
            let mut spans = Vec::with_capacity(row.len());
            for cell in row {
                spans.push(Span::styled(
                    cell.ch.to_string(),
                    Style::default().fg(cell.fg),
                ));
            }
            lines.push(Line::from(spans));
        }
        frame.render_widget(Paragraph::new(Text::from(lines)), inner);
    }

    fn draw_frame_rates(&self, frame: &mut Frame<'_>, area: Rect) {
        let lines = match self.scheduler.stats().report() {
            Some(report) => vec![
                Line::raw(format!("latest          = {:>4} fps", report.latest)),
                Line::raw(format!("avg of last 100 = {:>4} fps", report.mean)),
                Line::raw(format!("min of last 100 = {:>4} fps", report.min)),
                Line::raw(format!("max of last 100 = {:>4} fps", report.max)),
            ],
            None => vec![Line::raw("Waiting for frames...")],
        };

        let paragraph = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .title(self.palette.title("Frame Rate"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_view_stats(&self, frame: &mut Frame<'_>, area: Rect) {
        let (pan_x, pan_y) = self.viewport.pan();
        let lines = vec![
            Line::from(vec![
                Span::styled("Mode ", self.palette.header_style()),
                Span::raw(self.controller.mode().label()),
            ]),
            Line::from(vec![
                Span::styled("Pan ", self.palette.header_style()),
                Span::raw(format!("({pan_x}, {pan_y})")),
            ]),
            Line::from(vec![
                Span::styled("Zoom ", self.palette.header_style()),
                Span::raw(format!("{} visible cells", self.viewport.visible_cells())),
            ]),
            Line::from(vec![
                Span::styled("Cull ", self.palette.header_style()),
                Span::raw(cull_label(self.driver.cull)),
            ]),
            Line::from(vec![
                Span::styled("Grid ", self.palette.header_style()),
                Span::raw(if self.driver.style.grid_lines {
                    "lines on"
                } else {
                    "lines off"
                }),
            ]),
            Line::from(vec![
                Span::styled("Stamps ", self.palette.header_style()),
                Span::raw(self.stamp_names.join(", ")),
            ]),
        ];

        let paragraph = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .title(self.palette.title("Viewport"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_events(&self, frame: &mut Frame<'_>, area: Rect) {
        let events: Vec<ListItem> = self
            .event_log
            .iter()
            .rev()
            .map(|entry| {
                let style = self.palette.event_style(entry.kind);
                let text = format!("[g{:>6}] {}", entry.generation, entry.message);
                ListItem::new(Span::styled(text, style))
            })
            .collect();
        let block = Block::default()
            .title(self.palette.title("Recent Events"))
            .borders(Borders::ALL);
        frame.render_widget(List::new(events).block(block), area);
    }

    fn draw_help(&self, frame: &mut Frame<'_>) {
        let size = frame.area();
        let help_width = (f32::from(size.width) * 0.6).round() as u16;
        let help_height = 14;
        let help_x = size.x + (size.width.saturating_sub(help_width)) / 2;
        let help_y = size.y + (size.height.saturating_sub(help_height)) / 2;
        let area = Rect::new(help_x, help_y, help_width, help_height);

        let help_lines = vec![
            Line::from(vec![Span::styled(
                "Controls",
                self.palette.header_style().add_modifier(Modifier::BOLD),
            )]),
            Line::raw(" q       Quit"),
            Line::raw(" space   Toggle play/pause"),
            Line::raw(" + / -   Adjust target frame rate"),
            Line::raw(" tab     Cycle stamp selection"),
            Line::raw(" w       Toggle stamp wrap placement"),
            Line::raw(" c       Clear the universe"),
            Line::raw(" r       Reseed randomly"),
            Line::raw(" f       Reseed with the starter pattern"),
            Line::raw(" x       Toggle culling policy"),
            Line::raw(" g       Toggle grid lines"),
            Line::raw(" mouse   Paint / erase; ctrl stamps, shift drags"),
            Line::raw(" wheel   Zoom"),
        ];

        let paragraph = Paragraph::new(help_lines).block(
            Block::default()
                .title(self.palette.title("Help"))
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Black).fg(Color::White)),
        );
        frame.render_widget(paragraph, area);
    }
}

fn pointer_modifiers(key_modifiers: KeyModifiers) -> Modifiers {
    Modifiers {
        ctrl: key_modifiers.contains(KeyModifiers::CONTROL),
        shift: key_modifiers.contains(KeyModifiers::SHIFT),
    }
}

fn placement_label(placement: PlacementPolicy) -> &'static str {
    match placement {
        PlacementPolicy::Wrap => "wrap",
        PlacementPolicy::Free => "free",
    }
}

fn cull_label(cull: CullPolicy) -> &'static str {
    match cull {
        CullPolicy::Permissive => "permissive",
        CullPolicy::Exact => "exact",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    Playback,
    Edit,
    View,
}

#[derive(Clone, Debug)]
struct EventEntry {
    generation: u64,
    kind: EventKind,
    message: String,
}

#[derive(Clone, Copy, Debug)]
struct TextCell {
    ch: char,
    fg: Color,
}

impl TextCell {
    const BLANK: Self = Self {
        ch: ' ',
        fg: Color::Reset,
    };
}

/// Character-cell raster target. One terminal cell is one surface
/// pixel, so the derived cell edge sits at the one-pixel floor and the
/// viewport shows a window the size of the canvas.
struct TextSurface {
    width: u32,
    height: u32,
    cells: Vec<TextCell>,
    palette: Palette,
}

impl TextSurface {
    fn new(palette: Palette) -> Self {
        Self {
            width: 0,
            height: 0,
            cells: Vec::new(),
            palette,
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells
            .resize((width * height) as usize, TextCell::BLANK);
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn rows(&self) -> impl Iterator<Item = &[TextCell]> {
        self.cells.chunks(self.width.max(1) as usize)
    }

    #[cfg(test)]
    fn cell(&self, x: u32, y: u32) -> TextCell {
        self.cells[(y * self.width + x) as usize]
    }
}

impl Surface for TextSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, _color: Rgb) {
        self.cells.fill(TextCell::BLANK);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgb) {
        let x0 = x.floor().max(0.0) as i64;
        let y0 = y.floor().max(0.0) as i64;
        let x1 = ((x + width).ceil() as i64).min(i64::from(self.width));
        let y1 = ((y + height).ceil() as i64).min(i64::from(self.height));
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let fg = self.palette.cell_color(color);
        for row in y0..y1 {
            for col in x0..x1 {
                self.cells[(row * i64::from(self.width) + col) as usize] = TextCell { ch: '█', fg };
            }
        }
    }

    /// Axis-aligned one-cell-wide strokes only; grid lines never need
    /// more. Fills are never overwritten, a line shows through gaps.
    fn stroke_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgb) {
        let fg = self.palette.cell_color(color);
        let vertical = (x1 - x0).abs() < f64::EPSILON;
        if vertical {
            let col = x0.round() as i64;
            if col < 0 || col >= i64::from(self.width) {
                return;
            }
            let from = y0.min(y1).floor().max(0.0) as i64;
            let to = (y0.max(y1).ceil() as i64).min(i64::from(self.height));
            for row in from..to {
                let index = (row * i64::from(self.width) + col) as usize;
                if self.cells[index].ch == ' ' {
                    self.cells[index] = TextCell { ch: '·', fg };
                }
            }
        } else {
            let row = y0.round() as i64;
            if row < 0 || row >= i64::from(self.height) {
                return;
            }
            let from = x0.min(x1).floor().max(0.0) as i64;
            let to = (x0.max(x1).ceil() as i64).min(i64::from(self.width));
            for col in from..to {
                let index = (row * i64::from(self.width) + col) as usize;
                if self.cells[index].ch == ' ' {
                    self.cells[index] = TextCell { ch: '·', fg };
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
struct Palette {
    level: Option<ColorLevel>,
}

impl Palette {
    fn detect() -> Self {
        Self {
            level: on_cached(Stream::Stdout),
        }
    }

    fn header_style(&self) -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    fn accent_style(&self) -> Style {
        Style::default().fg(Color::LightMagenta)
    }

    fn paused_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    fn running_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD)
    }

    fn title<T: Into<String>>(&self, title: T) -> Span<'static> {
        Span::styled(title.into(), self.header_style())
    }

    fn event_style(&self, kind: EventKind) -> Style {
        let color = match kind {
            EventKind::Playback => Color::Green,
            EventKind::Edit => Color::Yellow,
            EventKind::View => Color::Cyan,
        };
        Style::default().fg(color)
    }

    /// Map a raster color onto what the terminal can show: truecolor
    /// when available, otherwise a coarse 8-color bucket.
    fn cell_color(&self, color: Rgb) -> Color {
        let rich = self
            .level
            .is_some_and(|level| level.has_16m || level.has_256);
        if rich {
            return Color::Rgb(color.r, color.g, color.b);
        }
        match (color.r > 127, color.g > 127, color.b > 127) {
            (true, true, true) => Color::White,
            (true, true, false) => Color::Yellow,
            (true, false, true) => Color::Magenta,
            (false, true, true) => Color::Cyan,
            (true, false, false) => Color::Red,
            (false, true, false) => Color::Green,
            (false, false, true) => Color::Blue,
            (false, false, false) => Color::DarkGray,
        }
    }
}
