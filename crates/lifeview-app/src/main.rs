use anyhow::Result;
use lifeview_app::{Frontend, FrontendContext, SparseUniverse, TerminalFrontend, UniverseConfig};
use lifeview_core::{CellGrid, ControllerConfig, RenderStyle, ViewportConfig};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let ctx = bootstrap_session();
    let frontend = TerminalFrontend::default();
    info!(
        frontend = frontend.name(),
        live_cells = ctx.universe.live_count(),
        "Starting Life viewer"
    );
    frontend.run(ctx)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Reseed determinism knob; unset or unparsable falls back to the
/// universe's fixed default seed.
fn seed_from_env() -> Option<u64> {
    std::env::var("LIFEVIEW_SEED")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
}

fn bootstrap_session() -> FrontendContext {
    let mut universe = SparseUniverse::new(UniverseConfig {
        rng_seed: seed_from_env(),
        ..UniverseConfig::default()
    });
    universe.seed_fancy();

    let (width, height) = (universe.width(), universe.height());
    FrontendContext {
        universe,
        viewport: ViewportConfig {
            visible_cells: width.max(height),
            ..ViewportConfig::default()
        },
        controller: ControllerConfig::default(),
        style: RenderStyle::default(),
    }
}
