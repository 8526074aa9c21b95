//! Pointer-driven interaction state machine.
//!
//! Exactly one mode is active at a time. A pointer-down while any mode
//! other than `Idle` is active is ignored outright rather than queued,
//! and the down-event guards are evaluated in a fixed priority:
//! ctrl applies the selected stamp, shift starts a drag, an unmodified
//! primary press paints, a secondary press erases.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::grid::CellGrid;
use crate::stamp::{PlacementPolicy, StampError, StampLibrary};
use crate::viewport::{DragAnchor, Viewport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// Modifier keys held at the instant an event fired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
    };
    pub const SHIFT: Self = Self {
        ctrl: false,
        shift: true,
    };
}

/// The exclusive interaction mode. Dragging carries its anchor so the
/// anchor cannot outlive the mode that needs it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InteractionMode {
    Idle,
    Painting,
    Erasing,
    Dragging(DragAnchor),
}

impl InteractionMode {
    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Short label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Painting => "painting",
            Self::Erasing => "erasing",
            Self::Dragging(_) => "dragging",
        }
    }
}

/// What the host should do after an event was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum Reaction {
    Quiet,
    Redraw,
}

impl Reaction {
    #[inline]
    pub fn redraw_needed(self) -> bool {
        matches!(self, Self::Redraw)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub placement: PlacementPolicy,
    pub initial_stamp: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            placement: PlacementPolicy::default(),
            initial_stamp: "glider".to_owned(),
        }
    }
}

/// Routes raw pointer and wheel events into viewport and automaton
/// mutations.
pub struct InteractionController {
    mode: InteractionMode,
    library: StampLibrary,
    selected: String,
    placement: PlacementPolicy,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl InteractionController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            mode: InteractionMode::Idle,
            library: StampLibrary::builtin(),
            selected: config.initial_stamp,
            placement: config.placement,
        }
    }

    #[inline]
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    #[inline]
    pub fn library(&self) -> &StampLibrary {
        &self.library
    }

    /// Name the stamp applied on the next ctrl-press. Not validated
    /// here; an unregistered name surfaces as a skipped application.
    pub fn select_stamp(&mut self, name: impl Into<String>) {
        self.selected = name.into();
    }

    #[inline]
    pub fn selected_stamp(&self) -> &str {
        &self.selected
    }

    #[inline]
    pub fn placement(&self) -> PlacementPolicy {
        self.placement
    }

    pub fn set_placement(&mut self, placement: PlacementPolicy) {
        self.placement = placement;
    }

    pub fn pointer_down<G: CellGrid>(
        &mut self,
        grid: &mut G,
        viewport: &mut Viewport,
        screen_x: f64,
        screen_y: f64,
        button: PointerButton,
        mods: Modifiers,
    ) -> Reaction {
        if !self.mode.is_idle() {
            debug!(mode = self.mode.label(), "pointer down ignored while busy");
            return Reaction::Quiet;
        }

        let (row, col) = viewport.screen_to_cell(screen_x, screen_y);
        match button {
            PointerButton::Primary if mods.ctrl => match self.apply_selected_stamp(grid, row, col)
            {
                Ok(()) => Reaction::Redraw,
                Err(err) => {
                    warn!(%err, "stamp application skipped");
                    Reaction::Quiet
                }
            },
            PointerButton::Primary if mods.shift => {
                self.mode = InteractionMode::Dragging(viewport.capture_anchor(screen_x, screen_y));
                Reaction::Quiet
            }
            PointerButton::Primary => {
                self.mode = InteractionMode::Painting;
                grid.set_alive(row, col);
                Reaction::Redraw
            }
            PointerButton::Secondary => {
                self.mode = InteractionMode::Erasing;
                grid.set_dead(row, col);
                Reaction::Redraw
            }
        }
    }

    pub fn pointer_move<G: CellGrid>(
        &mut self,
        grid: &mut G,
        viewport: &mut Viewport,
        screen_x: f64,
        screen_y: f64,
        mods: Modifiers,
    ) -> Reaction {
        match self.mode {
            InteractionMode::Painting => {
                let (row, col) = viewport.screen_to_cell(screen_x, screen_y);
                grid.set_alive(row, col);
                Reaction::Redraw
            }
            InteractionMode::Erasing => {
                let (row, col) = viewport.screen_to_cell(screen_x, screen_y);
                grid.set_dead(row, col);
                Reaction::Redraw
            }
            InteractionMode::Dragging(anchor) => {
                // The shift guard is re-checked on every move, not just
                // at drag start. A release mid-drag abandons the stale
                // anchor instead of panning from it.
                if mods.shift {
                    viewport.drag_to(&anchor, screen_x, screen_y);
                    Reaction::Redraw
                } else {
                    debug!("drag anchor went stale, leaving drag mode");
                    self.mode = InteractionMode::Idle;
                    Reaction::Quiet
                }
            }
            InteractionMode::Idle => Reaction::Quiet,
        }
    }

    pub fn pointer_up<G: CellGrid>(
        &mut self,
        grid: &mut G,
        viewport: &mut Viewport,
        screen_x: f64,
        screen_y: f64,
        button: PointerButton,
    ) -> Reaction {
        match (self.mode, button) {
            (InteractionMode::Painting, PointerButton::Primary) => {
                let (row, col) = viewport.screen_to_cell(screen_x, screen_y);
                grid.set_alive(row, col);
                self.mode = InteractionMode::Idle;
                Reaction::Redraw
            }
            (InteractionMode::Erasing, PointerButton::Secondary) => {
                let (row, col) = viewport.screen_to_cell(screen_x, screen_y);
                grid.set_dead(row, col);
                self.mode = InteractionMode::Idle;
                Reaction::Redraw
            }
            (InteractionMode::Dragging(_), PointerButton::Primary) => {
                self.mode = InteractionMode::Idle;
                Reaction::Quiet
            }
            // An up for the other button leaves the mode alone.
            _ => Reaction::Quiet,
        }
    }

    /// Wheel input zooms the viewport in every mode.
    pub fn wheel(&mut self, viewport: &mut Viewport, wheel_delta_y: f64) -> Reaction {
        if viewport.apply_zoom_delta(wheel_delta_y) {
            debug!(
                mode = self.mode.label(),
                visible_cells = viewport.visible_cells(),
                "wheel zoom applied"
            );
            Reaction::Redraw
        } else {
            Reaction::Quiet
        }
    }

    fn apply_selected_stamp<G: CellGrid>(
        &mut self,
        grid: &mut G,
        anchor_row: i64,
        anchor_col: i64,
    ) -> Result<(), StampError> {
        let pattern = self
            .library
            .get(&self.selected)
            .ok_or_else(|| StampError::UnknownStamp {
                name: self.selected.clone(),
            })?;
        self.placement.apply(grid, pattern, anchor_row, anchor_col);
        debug!(
            stamp = pattern.name(),
            anchor_row, anchor_col, "stamp applied"
        );
        Ok(())
    }
}
