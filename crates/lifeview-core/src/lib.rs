//! Host-independent controller logic for an interactive cellular
//! automaton viewer: coordinate transforms, pointer interaction,
//! playback scheduling, and draw-call generation. Hosts supply the
//! automaton, the raster surface, and the frame pump.

pub mod grid;
pub mod interact;
pub mod render;
pub mod schedule;
pub mod stamp;
pub mod viewport;

pub use grid::{CellGrid, DenseRead, SparseRead};
pub use interact::{
    ControllerConfig, InteractionController, InteractionMode, Modifiers, PointerButton, Reaction,
};
pub use render::{CullPolicy, RenderDriver, RenderStyle, Rgb, Surface};
pub use schedule::{
    FrameBody, FrameHandle, FramePump, FrameScheduler, FrameStats, FrameVerdict, ManualPump,
    Pacing, RateReport, WakeKind,
};
pub use stamp::{PlacementPolicy, StampError, StampLibrary, StampPattern};
pub use viewport::{DragAnchor, Viewport, ViewportConfig};
