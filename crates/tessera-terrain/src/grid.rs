//! In-memory terrain provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::{LandscapeType, TerrainListener, TerrainProvider, TerrainSample};

/// Terrain stored in flat row-major grids.
///
/// Every setter notifies the registered listener after its write lock has
/// been released, so listeners may read back from the provider.
pub struct GridTerrain {
    width: u32,
    height: u32,
    samples: RwLock<Vec<TerrainSample>>,
    fog: AtomicBool,
    listener: RwLock<Option<Weak<dyn TerrainListener>>>,
}

impl GridTerrain {
    /// Create a map filled with `fill`.
    pub fn new(width: u32, height: u32, fill: TerrainSample) -> Self {
        Self {
            width,
            height,
            samples: RwLock::new(vec![fill; width as usize * height as usize]),
            fog: AtomicBool::new(false),
            listener: RwLock::new(None),
        }
    }

    /// Create a map from row-major samples.
    ///
    /// Returns `None` if `samples.len() != width * height`.
    pub fn from_samples(width: u32, height: u32, samples: Vec<TerrainSample>) -> Option<Self> {
        if samples.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            samples: RwLock::new(samples),
            fog: AtomicBool::new(false),
            listener: RwLock::new(None),
        })
    }

    /// Create a map by sampling `f` at every grid point in row-major order.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> TerrainSample) -> Self {
        let mut samples = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            samples: RwLock::new(samples),
            fog: AtomicBool::new(false),
            listener: RwLock::new(None),
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height, "({x}, {y}) out of map");
        y as usize * self.width as usize + x as usize
    }

    fn listener(&self) -> Option<Arc<dyn TerrainListener>> {
        self.listener
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn update(&self, x: u32, y: u32, f: impl FnOnce(&mut TerrainSample)) {
        let index = self.index(x, y);
        let mut samples = self.samples.write().unwrap_or_else(|e| e.into_inner());
        f(&mut samples[index]);
    }

    pub fn set_landscape(&self, x: u32, y: u32, landscape: LandscapeType) {
        self.update(x, y, |s| s.landscape = landscape);
        if let Some(listener) = self.listener() {
            listener.terrain_changed(x, y);
        }
    }

    pub fn set_height(&self, x: u32, y: u32, height: f32) {
        self.update(x, y, |s| s.height = height);
        if let Some(listener) = self.listener() {
            listener.terrain_changed(x, y);
        }
    }

    pub fn set_visibility(&self, x: u32, y: u32, visibility: u8) {
        self.update(x, y, |s| s.visibility = visibility);
        if let Some(listener) = self.listener() {
            listener.visibility_changed(x, y, 1);
        }
    }

    /// Set the visibility of a rectangle and send one region notification.
    pub fn set_region_visibility(&self, x: u32, y: u32, width: u32, height: u32, visibility: u8) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        if x >= x_end || y >= y_end {
            return;
        }
        {
            let mut samples = self.samples.write().unwrap_or_else(|e| e.into_inner());
            for row in y..y_end {
                let start = self.index(x, row);
                let end = start + (x_end - x) as usize;
                for sample in &mut samples[start..end] {
                    sample.visibility = visibility;
                }
            }
        }
        if let Some(listener) = self.listener() {
            listener.region_changed(x, y, x_end - x, y_end - y);
        }
    }

    pub fn set_fog_enabled(&self, enabled: bool) {
        self.fog.store(enabled, Ordering::Relaxed);
    }

    /// Copy of the sample at a grid point.
    pub fn get(&self, x: u32, y: u32) -> TerrainSample {
        let samples = self.samples.read().unwrap_or_else(|e| e.into_inner());
        samples[self.index(x, y)]
    }
}

impl TerrainProvider for GridTerrain {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn landscape(&self, x: u32, y: u32) -> LandscapeType {
        self.get(x, y).landscape
    }

    fn height_at(&self, x: u32, y: u32) -> f32 {
        self.get(x, y).height
    }

    fn visibility(&self, x: u32, y: u32) -> u8 {
        self.get(x, y).visibility
    }

    fn fog_enabled(&self) -> bool {
        self.fog.load(Ordering::Relaxed)
    }

    fn set_listener(&self, listener: Weak<dyn TerrainListener>) {
        *self.listener.write().unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }

    fn sample(&self, x: u32, y: u32) -> TerrainSample {
        self.get(x, y)
    }
}
