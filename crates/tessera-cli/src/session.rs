//! Headless renderer session: edit a generated map while scrolling a view
//! across it, and report how much buffer traffic each frame caused.

use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tessera_atlas::{AtlasResource, TileSource};
use tessera_config::Config;
use tessera_render::{DrawOutcome, HeadlessContext, TerrainRenderer, TextureHandle, VisibleRegion};
use tessera_terrain::{
    GridTerrain, LandscapeType, MapParams, TerrainProvider, VISIBLE_MAX, generate_map,
};
use tracing::{debug, info};

/// View size in grid points.
const VIEW_WIDTH: u32 = 48;
const VIEW_HEIGHT: u32 = 32;

#[derive(Default)]
struct Totals {
    rebuilds: usize,
    cells_patched: usize,
    shade_writes: usize,
    skipped: usize,
}

impl Totals {
    fn add(&mut self, outcome: &DrawOutcome) {
        self.rebuilds += usize::from(outcome.rebuilt);
        self.cells_patched += outcome.cells_patched;
        self.shade_writes += outcome.shade_writes;
        self.skipped += usize::from(!outcome.drawn);
    }
}

/// Apply one random edit: a height bump, a landscape swap, or a revealed patch.
fn random_edit(terrain: &GridTerrain, rng: &mut impl Rng) {
    let x = rng.gen_range(0..terrain.width());
    let y = rng.gen_range(0..terrain.height());
    match rng.gen_range(0..3) {
        0 => {
            let delta: f32 = rng.gen_range(-4.0..=4.0);
            terrain.set_height(x, y, terrain.get(x, y).height + delta);
        }
        1 => {
            let landscape = LandscapeType::ALL[rng.gen_range(0..LandscapeType::ALL.len())];
            terrain.set_landscape(x, y, landscape);
        }
        _ => {
            let size = rng.gen_range(1..=6);
            terrain.set_region_visibility(x, y, size, size, VISIBLE_MAX);
        }
    }
}

pub fn run(
    config: &Config,
    source: Arc<dyn TileSource>,
    frames: u32,
    edits_per_frame: u32,
) -> Result<(), String> {
    let params = MapParams {
        width: config.map.width,
        height: config.map.height,
        seed: config.map.seed,
        fog_of_war: config.map.fog_of_war,
        ..MapParams::default()
    };
    let started = Instant::now();
    let terrain = Arc::new(generate_map(&params));
    info!(
        "Generated {}x{} map (seed {}) in {:.1?}",
        params.width,
        params.height,
        params.seed,
        started.elapsed()
    );

    let atlas = AtlasResource::<TextureHandle>::new(source, config.tiles.landscape_file);
    let provider: Arc<dyn TerrainProvider> = Arc::clone(&terrain) as Arc<dyn TerrainProvider>;
    let mut renderer = TerrainRenderer::new(provider, atlas, &config.render);
    let mut gpu = HeadlessContext::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
    let mut totals = Totals::default();

    let span_x = params.width.saturating_sub(VIEW_WIDTH).max(1);
    let span_y = params.height.saturating_sub(VIEW_HEIGHT).max(1);
    let started = Instant::now();

    for frame in 0..frames {
        for _ in 0..edits_per_frame {
            random_edit(&terrain, &mut rng);
        }

        let region = VisibleRegion::new(
            (frame % span_x) as i32,
            ((frame / 2) % span_y) as i32,
            VIEW_WIDTH,
            VIEW_HEIGHT,
        );
        let outcome = renderer.draw(&mut gpu, region);
        debug!("Frame {frame}: {outcome:?}");
        totals.add(&outcome);
    }

    let elapsed = started.elapsed();
    info!(
        "{} frames in {:.1?}: {} rebuilds, {} cells patched, {} shade writes, {} skipped draws",
        frames, elapsed, totals.rebuilds, totals.cells_patched, totals.shade_writes, totals.skipped
    );
    info!(
        "GPU traffic: {} writes, {} bytes, {} atlas uploads",
        gpu.write_count(),
        gpu.bytes_written(),
        gpu.texture_uploads()
    );

    renderer.release(&mut gpu);
    if totals.skipped == frames as usize && frames > 0 {
        return Err("No frame was drawn, check the tile source".to_string());
    }
    Ok(())
}
