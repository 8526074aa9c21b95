use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use lifeview_core::{
    CellGrid, CullPolicy, InteractionController, Modifiers, PointerButton, RenderDriver,
    RenderStyle, Rgb, SparseRead, Surface, Viewport, ViewportConfig,
};
use std::collections::HashSet;
use std::hint::black_box;
use std::time::Duration;

struct BenchGrid {
    alive: HashSet<(i64, i64)>,
}

impl CellGrid for BenchGrid {
    fn width(&self) -> u32 {
        256
    }
    fn height(&self) -> u32 {
        256
    }
    fn set_alive(&mut self, row: i64, col: i64) {
        self.alive.insert((row, col));
    }
    fn set_dead(&mut self, row: i64, col: i64) {
        self.alive.remove(&(row, col));
    }
    fn tick(&mut self) {}
}

impl SparseRead for BenchGrid {
    fn live_cells(&self) -> Vec<(i64, i64)> {
        self.alive.iter().copied().collect()
    }
}

struct NullSurface;

impl Surface for NullSurface {
    fn size(&self) -> (u32, u32) {
        (1024, 1024)
    }
    fn clear(&mut self, _color: Rgb) {}
    fn fill_rect(&mut self, x: f64, _y: f64, _width: f64, _height: f64, _color: Rgb) {
        black_box(x);
    }
    fn stroke_line(&mut self, x0: f64, _y0: f64, _x1: f64, _y1: f64, _color: Rgb) {
        black_box(x0);
    }
}

fn bench_viewer(c: &mut Criterion) {
    let mut group = c.benchmark_group("viewer");
    // Allow env overrides for slower machines and CI tuning.
    let samples: usize = std::env::var("LV_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);
    let warm: u64 = std::env::var("LV_BENCH_WARMUP_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(2);
    let measure: u64 = std::env::var("LV_BENCH_MEASURE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(warm));
    group.measurement_time(Duration::from_secs(measure));

    let events: usize = std::env::var("LV_BENCH_EVENTS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(10_000);

    let viewport = Viewport::new(ViewportConfig {
        surface_width: 1024,
        surface_height: 1024,
        visible_cells: 128,
        scale_x: 1.25,
        scale_y: 1.25,
    });

    group.bench_function(format!("screen_to_cell_{events}"), |b| {
        b.iter(|| {
            let mut acc = 0i64;
            for i in 0..events {
                let x = (i % 1024) as f64 + 0.5;
                let y = ((i * 7) % 1024) as f64 + 0.5;
                let (row, col) = viewport.screen_to_cell(black_box(x), black_box(y));
                acc = acc.wrapping_add(row ^ col);
            }
            black_box(acc)
        });
    });

    group.bench_function(format!("paint_stroke_{events}"), |b| {
        b.iter_batched(
            || {
                let controller = InteractionController::default();
                let grid = BenchGrid {
                    alive: HashSet::new(),
                };
                let viewport = Viewport::new(ViewportConfig::default());
                (controller, grid, viewport)
            },
            |(mut controller, mut grid, mut viewport)| {
                let _ = controller.pointer_down(
                    &mut grid,
                    &mut viewport,
                    0.5,
                    0.5,
                    PointerButton::Primary,
                    Modifiers::NONE,
                );
                for i in 0..events {
                    let x = (i % 384) as f64;
                    let _ = controller.pointer_move(
                        &mut grid,
                        &mut viewport,
                        black_box(x),
                        0.5,
                        Modifiers::NONE,
                    );
                }
                let _ =
                    controller.pointer_up(&mut grid, &mut viewport, 0.5, 0.5, PointerButton::Primary);
                grid
            },
            BatchSize::LargeInput,
        );
    });

    for cull in [CullPolicy::Permissive, CullPolicy::Exact] {
        let driver = RenderDriver::new(RenderStyle::default(), cull);
        let grid = BenchGrid {
            alive: (0..256)
                .flat_map(|r| (0..256).filter(move |c| (r + c) % 3 == 0).map(move |c| (r, c)))
                .collect(),
        };
        group.bench_function(format!("render_sparse_{cull:?}"), |b| {
            let mut surface = NullSurface;
            b.iter(|| {
                driver.render_sparse(&mut surface, black_box(&viewport), &grid);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_viewer);
criterion_main!(benches);
