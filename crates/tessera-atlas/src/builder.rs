//! Atlas assembly.

use std::path::Path;
use std::time::Instant;

use crate::source::{LineSink, TileSource, rgb565_to_rgba8};
use crate::tile_table::{ATLAS_SIZE, AtlasTile, TILE_COUNT, tile};
use crate::DecodeError;

/// A finished `ATLAS_SIZE x ATLAS_SIZE` atlas of RGB565 texels.
#[derive(Clone, PartialEq, Eq)]
pub struct AtlasPixels {
    texels: Vec<u16>,
}

impl std::fmt::Debug for AtlasPixels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasPixels")
            .field("size", &ATLAS_SIZE)
            .finish_non_exhaustive()
    }
}

impl AtlasPixels {
    fn blank() -> Self {
        Self {
            texels: vec![0; (ATLAS_SIZE * ATLAS_SIZE) as usize],
        }
    }

    /// Side length in texels.
    pub fn size(&self) -> u32 {
        ATLAS_SIZE
    }

    /// Row-major texels.
    pub fn texels(&self) -> &[u16] {
        &self.texels
    }

    pub fn texel(&self, x: u32, y: u32) -> u16 {
        self.texels[(y * ATLAS_SIZE + x) as usize]
    }

    /// Expand to RGBA8, for PNG export and backends without packed 16-bit formats.
    pub fn to_rgba8(&self) -> image::RgbaImage {
        let mut raw = Vec::with_capacity(self.texels.len() * 4);
        for &texel in &self.texels {
            raw.extend_from_slice(&rgb565_to_rgba8(texel));
        }
        image::RgbaImage::from_raw(ATLAS_SIZE, ATLAS_SIZE, raw)
            .unwrap_or_else(|| image::RgbaImage::new(ATLAS_SIZE, ATLAS_SIZE))
    }

    /// Write the atlas as a PNG file.
    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.to_rgba8().save(path)
    }
}

/// Writes one tile's decoded rows into its atlas region.
struct TileWriter<'a> {
    texels: &'a mut [u16],
    x0: usize,
    y0: usize,
    extent: usize,
    rows_written: usize,
}

impl<'a> TileWriter<'a> {
    fn new(texels: &'a mut [u16], placement: AtlasTile) -> Self {
        let (x0, y0) = placement.origin();
        Self {
            texels,
            x0: x0 as usize,
            y0: y0 as usize,
            extent: placement.extent() as usize,
            rows_written: 0,
        }
    }

    fn row_start(&self, row: usize) -> usize {
        (self.y0 + row) * ATLAS_SIZE as usize + self.x0
    }

    /// Replicate the last written row down to the bottom of the region.
    fn fill_down(&mut self) {
        if self.rows_written == 0 {
            return;
        }
        let last = self.row_start(self.rows_written - 1);
        for row in self.rows_written..self.extent {
            let dst = self.row_start(row);
            self.texels.copy_within(last..last + self.extent, dst);
        }
        self.rows_written = self.extent;
    }
}

impl LineSink for TileWriter<'_> {
    fn start_image(&mut self, _width: u32, _height: u32) {
        self.rows_written = 0;
    }

    fn write_line(&mut self, row: &[u16]) {
        if row.is_empty() || self.rows_written >= self.extent {
            return;
        }
        let start = self.row_start(self.rows_written);
        let dst = &mut self.texels[start..start + self.extent];
        for (i, texel) in dst.iter_mut().enumerate() {
            *texel = row[i % row.len()];
        }
        self.rows_written += 1;
    }
}

/// Decode every tile of `file_id` into a fresh atlas.
///
/// Rows shorter than the tile's width repeat horizontally; rows past its
/// height are dropped. Continuous tiles whose image is shorter than the tile
/// get their last row replicated downward. The first tile that fails to
/// decode aborts the build.
pub fn build_atlas(source: &dyn TileSource, file_id: u32) -> Result<AtlasPixels, DecodeError> {
    let started = Instant::now();
    let mut reader = source.tile_reader(file_id)?;
    let mut pixels = AtlasPixels::blank();

    for id in 0..TILE_COUNT {
        let Some(placement) = tile(id) else {
            continue;
        };
        let mut writer = TileWriter::new(&mut pixels.texels, placement);
        reader.decode(id, &mut writer)?;
        if placement.is_continuous() && writer.rows_written < writer.extent {
            writer.fill_down();
        }
    }

    log::info!(
        "Built {ATLAS_SIZE}x{ATLAS_SIZE} landscape atlas from file {file_id} in {:.1?}",
        started.elapsed()
    );
    Ok(pixels)
}
