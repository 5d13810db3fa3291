//! Incremental terrain renderer.
//!
//! Keeps a geometry buffer and a shade buffer resident on the GPU and patches
//! them from pending change marks before each draw. Whenever a buffer handle
//! is missing or rejected, both buffers are rebuilt from scratch on the next
//! draw.

use std::sync::Arc;

use tessera_atlas::{BorderTable, SharedAtlas};
use tessera_config::{RenderConfig, ShadeEncoding, UpdateStrategy};
use tessera_mesh::{GEOMETRY_BYTES_PER_CELL, MeshLayout, VertexKind, build_geometry, emit_cell};
use tessera_terrain::TerrainProvider;

use crate::gpu::{AtlasUpload, BufferFault, BufferHandle, GpuContext, TextureHandle};
use crate::region::VisibleRegion;
use crate::shade_cache::shade_strategy;
use crate::tracker::ChangeTracker;

/// What one [`TerrainRenderer::draw`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawOutcome {
    /// Both buffers were rebuilt from scratch.
    pub rebuilt: bool,
    /// Cells whose geometry was regenerated.
    pub cells_patched: usize,
    /// Shade buffer writes issued by the update strategy.
    pub shade_writes: usize,
    /// The draw call was issued.
    pub drawn: bool,
}

#[derive(Clone, Copy)]
struct MeshBuffers {
    geometry: BufferHandle,
    shade: BufferHandle,
}

/// Draws one terrain provider's mesh through a [`GpuContext`].
pub struct TerrainRenderer {
    tracker: Arc<ChangeTracker>,
    atlas: SharedAtlas<TextureHandle>,
    borders: &'static BorderTable,
    buffers: Option<MeshBuffers>,
    force_rebuild: bool,
}

impl TerrainRenderer {
    /// Create a renderer and register it as `terrain`'s listener.
    pub fn new(
        terrain: Arc<dyn TerrainProvider>,
        atlas: SharedAtlas<TextureHandle>,
        config: &RenderConfig,
    ) -> Self {
        let layout = MeshLayout::new(terrain.width(), terrain.height());
        let shade = shade_strategy(config.update_strategy, layout);
        let tracker = Arc::new(ChangeTracker::new(
            Arc::clone(&terrain),
            shade,
            config.shade_encoding,
        ));

        let listener = Arc::downgrade(&tracker);
        terrain.set_listener(listener);

        if config.preload_atlas {
            atlas.preload_in_background();
        }

        log::info!(
            "Terrain renderer for {}x{} map ({:?} shading, {:?} encoding)",
            layout.map_width,
            layout.map_height,
            config.update_strategy,
            config.shade_encoding
        );

        Self {
            tracker,
            atlas,
            borders: BorderTable::global(),
            buffers: None,
            force_rebuild: false,
        }
    }

    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    pub fn layout(&self) -> MeshLayout {
        self.tracker.layout()
    }

    pub fn update_strategy(&self) -> UpdateStrategy {
        self.tracker.shade().kind()
    }

    pub fn shade_encoding(&self) -> ShadeEncoding {
        self.tracker.encoding()
    }

    /// Current `(geometry, shade)` buffer handles, if built.
    pub fn buffers(&self) -> Option<(BufferHandle, BufferHandle)> {
        self.buffers.map(|b| (b.geometry, b.shade))
    }

    /// Rebuild the atlas from its tile source before the next draw.
    pub fn invalidate_atlas(&self) {
        self.atlas.invalidate();
    }

    /// Switch the shade encoding. Takes effect as a full rebuild on the next draw.
    pub fn set_shade_encoding(&mut self, encoding: ShadeEncoding) {
        if encoding == self.tracker.encoding() {
            return;
        }
        log::debug!("Shade encoding changed to {encoding:?}");
        self.tracker.set_encoding(encoding);
        self.force_rebuild = true;
    }

    /// Bring the buffers up to date and draw the visible part of the mesh.
    ///
    /// Never fails: buffer faults are logged and repaired on the next draw,
    /// and a missing atlas skips the draw call.
    pub fn draw(&mut self, gpu: &mut dyn GpuContext, region: VisibleRegion) -> DrawOutcome {
        let mut outcome = DrawOutcome::default();
        let layout = self.layout();
        if layout.cell_count() == 0 {
            return outcome;
        }

        if self.tracker.refresh_fog() {
            log::debug!("Fog of war toggled, reshading terrain");
            self.force_rebuild = true;
        }

        let buffers = match self.update(gpu, &region, &mut outcome) {
            Ok(buffers) => buffers,
            Err(fault) => {
                self.recover(gpu, &fault);
                return outcome;
            }
        };

        let Some(texture) = self.atlas.texture(&mut AtlasUpload(&mut *gpu)) else {
            log::error!("Terrain atlas unavailable, skipping terrain draw");
            return outcome;
        };

        let span = region.draw_span(&layout);
        match gpu.draw_triangles(texture, buffers.geometry, buffers.shade, span) {
            Ok(()) => outcome.drawn = true,
            Err(fault) => self.recover(gpu, &fault),
        }
        outcome
    }

    /// Release both buffers. The next draw rebuilds them.
    pub fn release(&mut self, gpu: &mut dyn GpuContext) {
        if let Some(buffers) = self.buffers.take() {
            gpu.release_buffer(buffers.geometry);
            gpu.release_buffer(buffers.shade);
        }
    }

    fn recover(&mut self, gpu: &mut dyn GpuContext, fault: &BufferFault) {
        log::warn!("Terrain buffer fault, rebuilding on next draw: {fault}");
        self.release(gpu);
    }

    fn update(
        &mut self,
        gpu: &mut dyn GpuContext,
        region: &VisibleRegion,
        outcome: &mut DrawOutcome,
    ) -> Result<MeshBuffers, BufferFault> {
        let layout = self.layout();
        let current = self.buffers.filter(|b| {
            !self.force_rebuild && gpu.is_buffer_valid(b.geometry) && gpu.is_buffer_valid(b.shade)
        });

        let Some(buffers) = current else {
            let buffers = self.rebuild(gpu)?;
            outcome.rebuilt = true;
            return Ok(buffers);
        };

        let terrain = self.tracker.terrain();
        for (x, y) in self.tracker.take_dirty_cells() {
            let cell = emit_cell(terrain, self.borders, x, y);
            gpu.write_buffer(
                buffers.geometry,
                layout.geometry_offset(x, y),
                bytemuck::cast_slice(&cell),
            )?;
            outcome.cells_patched += 1;
        }

        let rows = region.rows(&layout);
        outcome.shade_writes = self.tracker.shade().flush(
            &self.tracker.shade_params(),
            &rows,
            gpu,
            buffers.shade,
        )?;
        Ok(buffers)
    }

    fn rebuild(&mut self, gpu: &mut dyn GpuContext) -> Result<MeshBuffers, BufferFault> {
        self.release(gpu);
        let layout = self.layout();
        let vertex_count = layout.vertex_count();

        let geometry = gpu.allocate_buffer(vertex_count, VertexKind::Geometry, "terrain-geometry")?;
        let encoding = self.tracker.encoding();
        let shade = match gpu.allocate_buffer(
            vertex_count,
            VertexKind::Shade(encoding),
            "terrain-shade",
        ) {
            Ok(shade) => shade,
            Err(fault) => {
                gpu.release_buffer(geometry);
                return Err(fault);
            }
        };
        let buffers = MeshBuffers { geometry, shade };
        self.buffers = Some(buffers);

        // Marks made before this point are covered by the full build.
        self.tracker.clear_dirty_cells();
        let terrain = self.tracker.terrain();
        let vertices = build_geometry(terrain, self.borders, &layout);
        let geometry_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let row_bytes = layout.buffer_width() as usize * GEOMETRY_BYTES_PER_CELL;
        for (y, row) in geometry_bytes.chunks(row_bytes).enumerate() {
            gpu.write_buffer(geometry, (y * row_bytes) as u64, row)?;
        }

        let shade_bytes = self.tracker.shade().rebuild(&self.tracker.shade_params());
        gpu.write_buffer(shade, 0, &shade_bytes)?;

        self.force_rebuild = false;
        log::debug!(
            "Rebuilt terrain buffers ({} cells, {:?} shade)",
            layout.cell_count(),
            encoding
        );
        Ok(buffers)
    }
}
