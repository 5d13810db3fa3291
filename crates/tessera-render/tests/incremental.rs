//! End-to-end behaviour of the terrain renderer against the headless context.

use std::sync::Arc;

use tessera_atlas::{AtlasResource, BorderTable, MemoryTileSource, TILE_COUNT, TileSource};
use tessera_config::{RenderConfig, ShadeEncoding, UpdateStrategy};
use tessera_mesh::{MeshLayout, build_geometry, build_shade};
use tessera_render::{
    BufferFault, GpuContext, HeadlessContext, TerrainRenderer, TextureHandle, VisibleRegion,
};
use tessera_terrain::{GridTerrain, LandscapeType, TerrainProvider, TerrainSample};

const FILE_ID: u32 = 7;
const MAP_SIZE: u32 = 33;

fn terrain() -> Arc<GridTerrain> {
    let terrain = GridTerrain::from_fn(MAP_SIZE, MAP_SIZE, |x, y| {
        let landscape = match (x / 8 + y / 8) % 3 {
            0 => LandscapeType::Grass,
            1 => LandscapeType::Sand,
            _ => LandscapeType::Desert,
        };
        TerrainSample {
            landscape,
            height: ((x * 3 + y * 5) % 7) as f32,
            visibility: 100,
        }
    });
    terrain.set_fog_enabled(true);
    Arc::new(terrain)
}

fn source() -> Arc<dyn TileSource> {
    Arc::new(MemoryTileSource::solid_file(FILE_ID, TILE_COUNT))
}

fn config(strategy: UpdateStrategy) -> RenderConfig {
    RenderConfig {
        update_strategy: strategy,
        shade_encoding: ShadeEncoding::Float,
        preload_atlas: false,
    }
}

fn renderer(terrain: &Arc<GridTerrain>, strategy: UpdateStrategy) -> TerrainRenderer {
    let atlas = AtlasResource::<TextureHandle>::new(source(), FILE_ID);
    let provider: Arc<dyn TerrainProvider> = terrain.clone();
    TerrainRenderer::new(provider, atlas, &config(strategy))
}

fn layout() -> MeshLayout {
    MeshLayout::new(MAP_SIZE, MAP_SIZE)
}

fn everything() -> VisibleRegion {
    VisibleRegion::whole_map(&layout())
}

/// Buffer contents the renderer should converge to for the current terrain.
fn assert_buffers_match(gpu: &HeadlessContext, renderer: &TerrainRenderer, terrain: &GridTerrain) {
    let (geometry, shade) = renderer.buffers().expect("buffers built");
    let vertices = build_geometry(terrain, BorderTable::global(), &layout());
    let expected_geometry: &[u8] = bytemuck::cast_slice(&vertices);
    assert_eq!(gpu.buffer_bytes(geometry).unwrap(), expected_geometry);

    let expected_shade = build_shade(
        terrain,
        &layout(),
        terrain.fog_enabled(),
        renderer.shade_encoding(),
    );
    assert_eq!(gpu.buffer_bytes(shade).unwrap(), expected_shade.as_slice());
}

#[test]
fn test_first_draw_builds_everything() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();

    let outcome = renderer.draw(&mut gpu, everything());
    assert!(outcome.rebuilt);
    assert!(outcome.drawn);
    assert_eq!(gpu.live_buffers(), 2);
    assert_eq!(gpu.texture_uploads(), 1);
    assert_eq!(gpu.draws().len(), 1);
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_second_draw_without_changes_writes_nothing() {
    for strategy in [UpdateStrategy::Async, UpdateStrategy::Sync] {
        let terrain = terrain();
        let mut renderer = renderer(&terrain, strategy);
        let mut gpu = HeadlessContext::new();

        renderer.draw(&mut gpu, everything());
        gpu.reset_counters();

        let outcome = renderer.draw(&mut gpu, everything());
        assert!(!outcome.rebuilt);
        assert_eq!(outcome.cells_patched, 0);
        assert_eq!(outcome.shade_writes, 0);
        assert!(outcome.drawn);
        assert_eq!(gpu.write_count(), 0, "{strategy:?}");
        assert_eq!(gpu.texture_uploads(), 0);
    }
}

#[test]
fn test_terrain_change_patches_four_cells() {
    for strategy in [UpdateStrategy::Async, UpdateStrategy::Sync] {
        let terrain = terrain();
        let mut renderer = renderer(&terrain, strategy);
        let mut gpu = HeadlessContext::new();
        renderer.draw(&mut gpu, everything());

        terrain.set_height(5, 5, 20.0);
        assert_eq!(renderer.tracker().dirty_cells(), 4);

        let outcome = renderer.draw(&mut gpu, everything());
        assert!(!outcome.rebuilt);
        assert_eq!(outcome.cells_patched, 4);
        assert!(outcome.shade_writes > 0);
        assert_eq!(renderer.tracker().dirty_cells(), 0);
        assert_buffers_match(&gpu, &renderer, &terrain);
    }
}

#[test]
fn test_geometry_outside_view_is_still_patched() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    terrain.set_landscape(28, 28, LandscapeType::Water1);
    let corner = VisibleRegion::new(0, 0, 4, 4);
    let outcome = renderer.draw(&mut gpu, corner);
    assert_eq!(outcome.cells_patched, 4);
    assert_eq!(outcome.shade_writes, 0);
    assert!(renderer.tracker().shade().pending() > 0);
}

#[test]
fn test_async_keeps_spans_outside_view_pending() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    terrain.set_visibility(20, 24, 30);
    let top = VisibleRegion::new(0, 0, 32, 10);
    let outcome = renderer.draw(&mut gpu, top);
    assert_eq!(outcome.shade_writes, 0);
    assert_eq!(renderer.tracker().shade().pending(), 3 * 3);

    let outcome = renderer.draw(&mut gpu, everything());
    assert_eq!(outcome.shade_writes, 3);
    assert_eq!(renderer.tracker().shade().pending(), 0);
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_region_visibility_is_issued_per_row() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Sync);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    terrain.set_region_visibility(10, 10, 4, 3, 0);
    renderer.draw(&mut gpu, everything());
    assert_eq!(renderer.tracker().shade().pending(), 0);
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_buffer_fault_triggers_rebuild_on_next_draw() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    terrain.set_height(12, 12, 3.5);
    gpu.fail_next_write(BufferFault::InvalidHandle);
    let outcome = renderer.draw(&mut gpu, everything());
    assert!(!outcome.drawn);
    assert!(renderer.buffers().is_none());
    assert_eq!(gpu.live_buffers(), 0);

    let outcome = renderer.draw(&mut gpu, everything());
    assert!(outcome.rebuilt);
    assert!(outcome.drawn);
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_context_loss_rebuilds_buffers_and_atlas() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Sync);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    gpu.lose_context();
    gpu.reset_counters();
    let outcome = renderer.draw(&mut gpu, everything());
    assert!(outcome.rebuilt);
    assert!(outcome.drawn);
    assert_eq!(gpu.texture_uploads(), 1);
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_allocation_failure_skips_frame() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();

    gpu.fail_next_allocation(BufferFault::Allocation("out of memory".into()));
    let outcome = renderer.draw(&mut gpu, everything());
    assert!(!outcome.drawn);
    assert_eq!(gpu.live_buffers(), 0);

    assert!(renderer.draw(&mut gpu, everything()).drawn);
}

#[test]
fn test_missing_atlas_skips_draw() {
    let terrain = terrain();
    let atlas = AtlasResource::<TextureHandle>::new(Arc::new(MemoryTileSource::new()), FILE_ID);
    let provider: Arc<dyn TerrainProvider> = terrain.clone();
    let mut renderer = TerrainRenderer::new(provider, atlas, &config(UpdateStrategy::Async));
    let mut gpu = HeadlessContext::new();

    let outcome = renderer.draw(&mut gpu, everything());
    assert!(outcome.rebuilt);
    assert!(!outcome.drawn);
    assert!(gpu.draws().is_empty());
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_shade_encoding_switch_rebuilds() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    renderer.set_shade_encoding(ShadeEncoding::PackedRgba8);
    let outcome = renderer.draw(&mut gpu, everything());
    assert!(outcome.rebuilt);
    assert_eq!(renderer.shade_encoding(), ShadeEncoding::PackedRgba8);
    assert_buffers_match(&gpu, &renderer, &terrain);

    renderer.set_shade_encoding(ShadeEncoding::PackedRgba8);
    assert!(!renderer.draw(&mut gpu, everything()).rebuilt);
}

#[test]
fn test_fog_toggle_reshades() {
    let terrain = terrain();
    terrain.set_visibility(16, 16, 0);
    let mut renderer = renderer(&terrain, UpdateStrategy::Sync);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    terrain.set_fog_enabled(!terrain.fog_enabled());
    let outcome = renderer.draw(&mut gpu, everything());
    assert!(outcome.rebuilt);
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_invalidate_atlas_reuploads() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    renderer.invalidate_atlas();
    gpu.reset_counters();
    let outcome = renderer.draw(&mut gpu, everything());
    assert!(!outcome.rebuilt);
    assert!(outcome.drawn);
    assert_eq!(gpu.texture_uploads(), 1);
    assert_eq!(gpu.live_textures(), 1);
}

#[test]
fn test_notifications_from_another_thread() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    let workers: Vec<_> = (0..4u32)
        .map(|i| {
            let terrain = Arc::clone(&terrain);
            std::thread::spawn(move || {
                for step in 0..16u32 {
                    let x = 2 + (i * 7 + step * 3) % 28;
                    let y = 2 + (i * 5 + step * 11) % 28;
                    terrain.set_height(x, y, (step % 4) as f32);
                    terrain.set_visibility(x, y, ((step * 13) % 100) as u8);
                    if step % 5 == 0 {
                        terrain.set_landscape(x, y, LandscapeType::Mud);
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let outcome = renderer.draw(&mut gpu, everything());
    assert!(!outcome.rebuilt);
    assert!(outcome.cells_patched > 0);
    assert_buffers_match(&gpu, &renderer, &terrain);
}

#[test]
fn test_release_frees_buffers() {
    let terrain = terrain();
    let mut renderer = renderer(&terrain, UpdateStrategy::Async);
    let mut gpu = HeadlessContext::new();
    renderer.draw(&mut gpu, everything());

    renderer.release(&mut gpu);
    assert_eq!(gpu.live_buffers(), 0);
    assert!(renderer.buffers().is_none());
    assert!(gpu.is_texture_valid(gpu.draws()[0].texture));
}
