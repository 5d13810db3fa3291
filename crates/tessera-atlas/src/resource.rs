//! Shared, reference-counted atlas resource.
//!
//! One [`AtlasResource`] is shared by every renderer drawing the same tile
//! library. It keeps the decoded atlas and the uploaded texture handle, and
//! moves through a small state machine:
//!
//! * empty or preloading: no decoded pixels yet, possibly a background decode
//!   in flight;
//! * decoded: pixels cached, no usable texture (first use or context loss);
//! * uploaded: pixels cached and a texture handle that the GPU still accepts;
//! * stale: [`AtlasResource::invalidate`] was called, so the next request
//!   rebuilds from the tile source. The previous texture stays in use until a
//!   rebuild succeeds.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::Receiver;

use crate::builder::{AtlasPixels, build_atlas};
use crate::source::TileSource;
use crate::DecodeError;

/// Atlas shared between renderers.
pub type SharedAtlas<H> = Arc<AtlasResource<H>>;

/// Where atlas textures are uploaded to.
pub trait TextureTarget {
    type Handle: Clone;
    type Error: Display;

    fn is_texture_valid(&self, handle: &Self::Handle) -> bool;
    fn upload_atlas(&mut self, pixels: &AtlasPixels) -> Result<Self::Handle, Self::Error>;
    fn release_texture(&mut self, handle: Self::Handle);
}

struct AtlasState<H> {
    preload: Option<Receiver<Result<AtlasPixels, DecodeError>>>,
    pixels: Option<Arc<AtlasPixels>>,
    texture: Option<H>,
    stale: bool,
}

/// Decoded atlas plus its GPU texture, guarded by one mutex.
pub struct AtlasResource<H> {
    source: Arc<dyn TileSource>,
    file_id: u32,
    state: Mutex<AtlasState<H>>,
    builds: AtomicUsize,
}

impl<H: Clone> AtlasResource<H> {
    pub fn new(source: Arc<dyn TileSource>, file_id: u32) -> SharedAtlas<H> {
        Arc::new(Self {
            source,
            file_id,
            state: Mutex::new(AtlasState {
                preload: None,
                pixels: None,
                texture: None,
                stale: false,
            }),
            builds: AtomicUsize::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AtlasState<H>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start decoding the atlas on a background thread.
    ///
    /// Does nothing if pixels are already decoded or a preload is running.
    pub fn preload_in_background(&self) {
        let mut state = self.lock();
        if state.pixels.is_some() || state.preload.is_some() {
            return;
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let source = Arc::clone(&self.source);
        let file_id = self.file_id;
        let spawned = std::thread::Builder::new()
            .name("atlas-preload".to_string())
            .spawn(move || {
                let _ = tx.send(build_atlas(source.as_ref(), file_id));
            });

        match spawned {
            Ok(_) => {
                self.builds.fetch_add(1, Ordering::Relaxed);
                state.preload = Some(rx);
                log::debug!("Preloading atlas file {file_id} in background");
            }
            Err(e) => log::warn!("Could not spawn atlas preload thread: {e}"),
        }
    }

    /// Force a rebuild from the tile source on the next request.
    pub fn invalidate(&self) {
        self.lock().stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.lock().stale
    }

    /// Number of atlas builds started so far, preloads included.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// The decoded atlas, building it if needed.
    pub fn pixels(&self) -> Result<Arc<AtlasPixels>, DecodeError> {
        let mut state = self.lock();
        self.ensure_pixels(&mut state)
    }

    fn build(&self) -> Result<AtlasPixels, DecodeError> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        build_atlas(self.source.as_ref(), self.file_id)
    }

    fn ensure_pixels(&self, state: &mut AtlasState<H>) -> Result<Arc<AtlasPixels>, DecodeError> {
        if state.stale {
            state.stale = false;
            state.preload = None;
            let pixels = Arc::new(self.build()?);
            state.pixels = Some(Arc::clone(&pixels));
            return Ok(pixels);
        }

        if let Some(rx) = state.preload.take() {
            match rx.recv() {
                Ok(Ok(pixels)) => state.pixels = Some(Arc::new(pixels)),
                Ok(Err(e)) => return Err(e),
                Err(_) => log::warn!("Atlas preload thread exited without a result"),
            }
        }

        if let Some(pixels) = &state.pixels {
            return Ok(Arc::clone(pixels));
        }

        let pixels = Arc::new(self.build()?);
        state.pixels = Some(Arc::clone(&pixels));
        Ok(pixels)
    }

    /// A texture handle valid on `target`, uploading (and rebuilding) as needed.
    ///
    /// Returns `None` only when no atlas can be produced and no earlier
    /// texture is still valid.
    pub fn texture<T>(&self, target: &mut T) -> Option<H>
    where
        T: TextureTarget<Handle = H> + ?Sized,
    {
        let mut state = self.lock();
        if !state.stale
            && let Some(handle) = &state.texture
            && target.is_texture_valid(handle)
        {
            return Some(handle.clone());
        }

        let previous = state
            .texture
            .take()
            .filter(|handle| target.is_texture_valid(handle));

        let pixels = match self.ensure_pixels(&mut state) {
            Ok(pixels) => pixels,
            Err(e) => {
                match previous {
                    Some(_) => log::error!("Atlas rebuild failed, keeping previous atlas: {e}"),
                    None => log::error!("Atlas unavailable: {e}"),
                }
                state.texture = previous.clone();
                return previous;
            }
        };

        match target.upload_atlas(&pixels) {
            Ok(handle) => {
                if let Some(old) = previous {
                    target.release_texture(old);
                }
                state.texture = Some(handle.clone());
                Some(handle)
            }
            Err(e) => {
                log::warn!("Atlas upload failed: {e}");
                state.texture = previous.clone();
                previous
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryTileSource, TileImage};
    use crate::tile_table::TILE_COUNT;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeTarget {
        valid: HashSet<u32>,
        next: u32,
        uploads: usize,
        released: Vec<u32>,
        fail_uploads: bool,
    }

    impl FakeTarget {
        fn lose_context(&mut self) {
            self.valid.clear();
        }
    }

    impl TextureTarget for FakeTarget {
        type Handle = u32;
        type Error = String;

        fn is_texture_valid(&self, handle: &u32) -> bool {
            self.valid.contains(handle)
        }

        fn upload_atlas(&mut self, _pixels: &AtlasPixels) -> Result<u32, String> {
            if self.fail_uploads {
                return Err("out of memory".to_string());
            }
            self.next += 1;
            self.uploads += 1;
            self.valid.insert(self.next);
            Ok(self.next)
        }

        fn release_texture(&mut self, handle: u32) {
            self.valid.remove(&handle);
            self.released.push(handle);
        }
    }

    fn source() -> Arc<dyn TileSource> {
        Arc::new(MemoryTileSource::solid_file(0, TILE_COUNT))
    }

    #[test]
    fn test_texture_is_built_once() {
        let atlas: SharedAtlas<u32> = AtlasResource::new(source(), 0);
        let mut target = FakeTarget::default();
        let first = atlas.texture(&mut target);
        let second = atlas.texture(&mut target);
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(1));
        assert_eq!(atlas.build_count(), 1);
        assert_eq!(target.uploads, 1);
    }

    #[test]
    fn test_context_loss_reuploads_without_rebuilding() {
        let atlas: SharedAtlas<u32> = AtlasResource::new(source(), 0);
        let mut target = FakeTarget::default();
        atlas.texture(&mut target);
        target.lose_context();
        assert_eq!(atlas.texture(&mut target), Some(2));
        assert_eq!(atlas.build_count(), 1);
        assert!(target.released.is_empty());
    }

    #[test]
    fn test_invalidate_rebuilds_and_releases_old_texture() {
        let atlas: SharedAtlas<u32> = AtlasResource::new(source(), 0);
        let mut target = FakeTarget::default();
        atlas.texture(&mut target);
        atlas.invalidate();
        assert!(atlas.is_stale());
        assert_eq!(atlas.texture(&mut target), Some(2));
        assert_eq!(atlas.build_count(), 2);
        assert_eq!(target.released, vec![1]);
        assert!(!atlas.is_stale());
    }

    #[test]
    fn test_broken_source_never_produces_texture() {
        let tiles = MemoryTileSource::solid_file(0, TILE_COUNT).with_tile(
            0,
            3,
            TileImage {
                width: 2,
                height: 2,
                texels: vec![0; 3],
            },
        );
        let atlas: SharedAtlas<u32> = AtlasResource::new(Arc::new(tiles), 0);
        let mut target = FakeTarget::default();
        assert_eq!(atlas.texture(&mut target), None);
        assert_eq!(target.uploads, 0);
        assert!(matches!(
            atlas.pixels(),
            Err(DecodeError::Corrupt { tile_id: 3, .. })
        ));
    }

    #[test]
    fn test_stale_rebuild_failure_keeps_previous() {
        struct Flaky {
            inner: MemoryTileSource,
            broken: std::sync::atomic::AtomicBool,
        }
        impl TileSource for Flaky {
            fn tile_reader(
                &self,
                file_id: u32,
            ) -> Result<Box<dyn crate::TileReader + '_>, DecodeError> {
                if self.broken.load(Ordering::Relaxed) {
                    return Err(DecodeError::NotFound { file_id });
                }
                self.inner.tile_reader(file_id)
            }
        }

        let flaky = Arc::new(Flaky {
            inner: MemoryTileSource::solid_file(0, TILE_COUNT),
            broken: std::sync::atomic::AtomicBool::new(false),
        });
        let atlas: SharedAtlas<u32> = AtlasResource::new(flaky.clone(), 0);
        let mut target = FakeTarget::default();
        assert_eq!(atlas.texture(&mut target), Some(1));

        flaky.broken.store(true, Ordering::Relaxed);
        atlas.invalidate();
        assert_eq!(atlas.texture(&mut target), Some(1));
        assert!(target.released.is_empty());
        // Cached pixels survive the failed rebuild.
        assert!(atlas.pixels().is_ok());
    }

    #[test]
    fn test_upload_failure_returns_none() {
        let atlas: SharedAtlas<u32> = AtlasResource::new(source(), 0);
        let mut target = FakeTarget {
            fail_uploads: true,
            ..Default::default()
        };
        assert_eq!(atlas.texture(&mut target), None);
        target.fail_uploads = false;
        assert_eq!(atlas.texture(&mut target), Some(1));
        assert_eq!(atlas.build_count(), 1);
    }

    #[test]
    fn test_preload_is_consumed() {
        let atlas: SharedAtlas<u32> = AtlasResource::new(source(), 0);
        atlas.preload_in_background();
        atlas.preload_in_background();
        let pixels = atlas.pixels().unwrap();
        assert_eq!(pixels.texel(0, 0), 1);
        assert_eq!(atlas.build_count(), 1);

        let mut target = FakeTarget::default();
        assert_eq!(atlas.texture(&mut target), Some(1));
        assert_eq!(atlas.build_count(), 1);
    }

    #[test]
    fn test_failed_preload_reports_error() {
        let atlas: SharedAtlas<u32> = AtlasResource::new(source(), 5);
        atlas.preload_in_background();
        assert!(matches!(
            atlas.pixels(),
            Err(DecodeError::NotFound { file_id: 5 })
        ));
    }
}
