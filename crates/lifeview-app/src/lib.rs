//! Shared plumbing for the Life viewer's interactive front ends.

pub mod terminal;
pub mod universe;

pub mod frontend {
    use anyhow::Result;
    use lifeview_core::{ControllerConfig, RenderStyle, ViewportConfig};

    use crate::universe::SparseUniverse;

    /// Everything a front end needs to host a viewing session.
    pub struct FrontendContext {
        pub universe: SparseUniverse,
        pub viewport: ViewportConfig,
        pub controller: ControllerConfig,
        pub style: RenderStyle,
    }

    pub trait Frontend {
        /// Stable identifier describing the front end (e.g., "terminal").
        fn name(&self) -> &'static str;

        /// Launch the front end; blocks until the viewing session completes.
        fn run(&self, ctx: FrontendContext) -> Result<()>;
    }
}

pub use frontend::{Frontend, FrontendContext};
pub use terminal::TerminalFrontend;
pub use universe::{SparseUniverse, UniverseConfig};
