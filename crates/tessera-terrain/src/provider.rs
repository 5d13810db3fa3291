//! Terrain provider and change-listener traits.

use std::sync::Weak;

use crate::LandscapeType;

/// Visibility value of a fully visible grid point.
pub const VISIBLE_MAX: u8 = 100;

/// Snapshot of one grid point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainSample {
    pub landscape: LandscapeType,
    pub height: f32,
    /// Fog-of-war visibility in `0..=VISIBLE_MAX`.
    pub visibility: u8,
}

impl Default for TerrainSample {
    fn default() -> Self {
        Self {
            landscape: LandscapeType::Grass,
            height: 0.0,
            visibility: VISIBLE_MAX,
        }
    }
}

/// Read access to map terrain.
///
/// Coordinates are grid points in `[0, width) x [0, height)`. Callers never
/// sample outside that range.
pub trait TerrainProvider: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn landscape(&self, x: u32, y: u32) -> LandscapeType;
    fn height_at(&self, x: u32, y: u32) -> f32;
    fn visibility(&self, x: u32, y: u32) -> u8;
    fn fog_enabled(&self) -> bool;

    /// Register the listener that receives change notifications.
    ///
    /// The provider holds it weakly; notifications stop once it is dropped.
    fn set_listener(&self, listener: Weak<dyn TerrainListener>);

    fn sample(&self, x: u32, y: u32) -> TerrainSample {
        TerrainSample {
            landscape: self.landscape(x, y),
            height: self.height_at(x, y),
            visibility: self.visibility(x, y),
        }
    }
}

/// Receiver of terrain change notifications.
///
/// Notifications may arrive on any thread.
pub trait TerrainListener: Send + Sync {
    /// Landscape or height changed at a grid point.
    fn terrain_changed(&self, x: u32, y: u32);

    /// Visibility changed for `len` points starting at `(x, y)`.
    fn visibility_changed(&self, x: u32, y: u32, len: u32);

    /// Visibility changed inside a rectangle.
    fn region_changed(&self, x: u32, y: u32, width: u32, height: u32) {
        for row in y..y.saturating_add(height) {
            self.visibility_changed(x, row, width);
        }
    }
}
