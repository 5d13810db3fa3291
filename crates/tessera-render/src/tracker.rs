//! Turns terrain notifications into pending mesh updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tessera_config::ShadeEncoding;
use tessera_mesh::{DirtyCells, MeshLayout, expand_line};
use tessera_terrain::{TerrainListener, TerrainProvider};

use crate::shade_cache::{ShadeParams, ShadeStrategy};

/// Listener the renderer registers with its terrain provider.
///
/// Notifications may come from any thread. Geometry marks sit behind their
/// own mutex, shade changes go to the strategy. No GPU work happens here.
pub struct ChangeTracker {
    terrain: Arc<dyn TerrainProvider>,
    layout: MeshLayout,
    geometry: Mutex<DirtyCells>,
    shade: Box<dyn ShadeStrategy>,
    fog: AtomicBool,
    packed: AtomicBool,
}

impl ChangeTracker {
    pub fn new(
        terrain: Arc<dyn TerrainProvider>,
        shade: Box<dyn ShadeStrategy>,
        encoding: ShadeEncoding,
    ) -> Self {
        let layout = MeshLayout::new(terrain.width(), terrain.height());
        let fog = terrain.fog_enabled();
        Self {
            terrain,
            layout,
            geometry: Mutex::new(DirtyCells::new(layout.buffer_width(), layout.buffer_height())),
            shade,
            fog: AtomicBool::new(fog),
            packed: AtomicBool::new(encoding == ShadeEncoding::PackedRgba8),
        }
    }

    pub fn layout(&self) -> MeshLayout {
        self.layout
    }

    pub fn terrain(&self) -> &dyn TerrainProvider {
        self.terrain.as_ref()
    }

    pub fn shade(&self) -> &dyn ShadeStrategy {
        self.shade.as_ref()
    }

    pub fn encoding(&self) -> ShadeEncoding {
        if self.packed.load(Ordering::Acquire) {
            ShadeEncoding::PackedRgba8
        } else {
            ShadeEncoding::Float
        }
    }

    pub(crate) fn set_encoding(&self, encoding: ShadeEncoding) {
        self.packed
            .store(encoding == ShadeEncoding::PackedRgba8, Ordering::Release);
    }

    pub fn fog(&self) -> bool {
        self.fog.load(Ordering::Acquire)
    }

    /// Re-read the provider's fog flag. Returns `true` if it changed.
    pub(crate) fn refresh_fog(&self) -> bool {
        let fog = self.terrain.fog_enabled();
        self.fog.swap(fog, Ordering::AcqRel) != fog
    }

    pub fn shade_params(&self) -> ShadeParams<'_> {
        ShadeParams {
            terrain: self.terrain.as_ref(),
            layout: self.layout,
            fog: self.fog(),
            encoding: self.encoding(),
        }
    }

    fn geometry(&self) -> MutexGuard<'_, DirtyCells> {
        self.geometry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cells whose geometry must be regenerated.
    pub fn dirty_cells(&self) -> usize {
        self.geometry().len()
    }

    pub fn is_cell_dirty(&self, x: u32, y: u32) -> bool {
        self.geometry().is_dirty(x, y)
    }

    /// Remove every geometry mark, row-major.
    pub(crate) fn take_dirty_cells(&self) -> Vec<(u32, u32)> {
        self.geometry().drain()
    }

    pub(crate) fn clear_dirty_cells(&self) {
        self.geometry().clear();
    }
}

impl TerrainListener for ChangeTracker {
    fn terrain_changed(&self, x: u32, y: u32) {
        self.visibility_changed(x, y, 1);
        self.geometry().mark_point(x, y);
    }

    fn visibility_changed(&self, x: u32, y: u32, len: u32) {
        let Some(rect) = expand_line(
            x,
            y,
            len,
            self.layout.buffer_width(),
            self.layout.buffer_height(),
        ) else {
            return;
        };
        self.shade.lines_changed(&self.shade_params(), &rect);
    }
}
