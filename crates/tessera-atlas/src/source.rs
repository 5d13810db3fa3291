//! Tile sources: where landscape tile images come from.
//!
//! A [`TileSource`] hands out one [`TileReader`] per tile file. The reader
//! streams each tile into a [`LineSink`] row by row as RGB565 texels.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::tile_table::{GRID_UNIT, tile};
use crate::DecodeError;

/// Receives a decoded tile one row at a time.
pub trait LineSink {
    /// Called once before the first row.
    fn start_image(&mut self, width: u32, height: u32);

    /// One row of RGB565 texels, top to bottom.
    fn write_line(&mut self, row: &[u16]);
}

/// Decodes tiles from one open tile file.
pub trait TileReader {
    fn decode(&mut self, tile_id: u16, sink: &mut dyn LineSink) -> Result<(), DecodeError>;
}

/// A library of tile files.
pub trait TileSource: Send + Sync {
    /// Open a tile file. Fails with [`DecodeError::NotFound`] if it does not exist.
    fn tile_reader(&self, file_id: u32) -> Result<Box<dyn TileReader + '_>, DecodeError>;
}

/// Pack 8-bit RGB into RGB565.
pub const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    (((r as u16) >> 3) << 11) | (((g as u16) >> 2) << 5) | ((b as u16) >> 3)
}

/// Expand an RGB565 texel to opaque RGBA8, replicating high bits into the low ones.
pub const fn rgb565_to_rgba8(texel: u16) -> [u8; 4] {
    let r = ((texel >> 11) & 0x1f) as u8;
    let g = ((texel >> 5) & 0x3f) as u8;
    let b = (texel & 0x1f) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255]
}

// ---------------------------------------------------------------------------
// ImageDirSource
// ---------------------------------------------------------------------------

/// Tiles stored as image files: `<root>/<file_id>/<tile_id>.png`.
pub struct ImageDirSource {
    root: PathBuf,
}

impl ImageDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileSource for ImageDirSource {
    fn tile_reader(&self, file_id: u32) -> Result<Box<dyn TileReader + '_>, DecodeError> {
        let dir = self.root.join(file_id.to_string());
        if !dir.is_dir() {
            return Err(DecodeError::NotFound { file_id });
        }
        Ok(Box::new(ImageDirReader { dir }))
    }
}

struct ImageDirReader {
    dir: PathBuf,
}

impl TileReader for ImageDirReader {
    fn decode(&mut self, tile_id: u16, sink: &mut dyn LineSink) -> Result<(), DecodeError> {
        let path = self.dir.join(format!("{tile_id}.png"));
        if !path.is_file() {
            return Err(DecodeError::MissingTile { tile_id });
        }
        let img = image::open(&path)?.to_rgba8();
        if img.width() == 0 || img.height() == 0 {
            return Err(DecodeError::Corrupt {
                tile_id,
                reason: "empty image".to_string(),
            });
        }

        sink.start_image(img.width(), img.height());
        let mut row = Vec::with_capacity(img.width() as usize);
        for pixels in img.rows() {
            row.clear();
            row.extend(pixels.map(|p| rgb565(p[0], p[1], p[2])));
            sink.write_line(&row);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTileSource
// ---------------------------------------------------------------------------

/// A decoded tile held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB565 texels.
    pub texels: Vec<u16>,
}

impl TileImage {
    /// A single-colour image.
    pub fn solid(width: u32, height: u32, texel: u16) -> Self {
        Self {
            width,
            height,
            texels: vec![texel; width as usize * height as usize],
        }
    }
}

/// Tile files kept in memory.
#[derive(Default, Clone)]
pub struct MemoryTileSource {
    files: FxHashMap<u32, FxHashMap<u16, TileImage>>,
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a tile, creating its file if needed.
    pub fn insert(&mut self, file_id: u32, tile_id: u16, image: TileImage) {
        self.files.entry(file_id).or_default().insert(tile_id, image);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_tile(mut self, file_id: u32, tile_id: u16, image: TileImage) -> Self {
        self.insert(file_id, tile_id, image);
        self
    }

    /// Fill every tile id of `file_id` with a distinct solid colour.
    pub fn solid_file(file_id: u32, tile_count: u16) -> Self {
        let mut source = Self::new();
        for id in 0..tile_count {
            source.insert(file_id, id, TileImage::solid(GRID_UNIT, GRID_UNIT, id + 1));
        }
        source
    }
}

impl TileSource for MemoryTileSource {
    fn tile_reader(&self, file_id: u32) -> Result<Box<dyn TileReader + '_>, DecodeError> {
        let tiles = self
            .files
            .get(&file_id)
            .ok_or(DecodeError::NotFound { file_id })?;
        Ok(Box::new(MemoryReader { tiles }))
    }
}

struct MemoryReader<'a> {
    tiles: &'a FxHashMap<u16, TileImage>,
}

impl TileReader for MemoryReader<'_> {
    fn decode(&mut self, tile_id: u16, sink: &mut dyn LineSink) -> Result<(), DecodeError> {
        let image = self
            .tiles
            .get(&tile_id)
            .ok_or(DecodeError::MissingTile { tile_id })?;
        if image.width == 0 || image.texels.len() != image.width as usize * image.height as usize
        {
            return Err(DecodeError::Corrupt {
                tile_id,
                reason: format!(
                    "{} texels for a {}x{} image",
                    image.texels.len(),
                    image.width,
                    image.height
                ),
            });
        }
        sink.start_image(image.width, image.height);
        for row in image.texels.chunks_exact(image.width as usize) {
            sink.write_line(row);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SyntheticTileSource
// ---------------------------------------------------------------------------

/// Procedural tiles, used when no tile archive is configured.
///
/// Every tile gets a base colour derived from its id and a deterministic
/// speckle pattern. Continuous tiles are generated at full size; border tiles
/// blend their colour toward the next id's colour along the diagonal.
pub struct SyntheticTileSource {
    file_id: u32,
}

impl SyntheticTileSource {
    pub fn new(file_id: u32) -> Self {
        Self { file_id }
    }
}

impl TileSource for SyntheticTileSource {
    fn tile_reader(&self, file_id: u32) -> Result<Box<dyn TileReader + '_>, DecodeError> {
        if file_id != self.file_id {
            return Err(DecodeError::NotFound { file_id });
        }
        Ok(Box::new(SyntheticReader))
    }
}

struct SyntheticReader;

fn base_color(id: u16) -> [u8; 3] {
    let h = u32::from(id).wrapping_mul(0x9e37_79b9).rotate_left(7);
    [
        64 + (h & 0x7f) as u8,
        80 + ((h >> 8) & 0x7f) as u8,
        32 + ((h >> 16) & 0x5f) as u8,
    ]
}

fn speckle(x: u32, y: u32, id: u16) -> u8 {
    let mut h = x.wrapping_mul(0x85eb_ca6b) ^ y.wrapping_mul(0xc2b2_ae35) ^ u32::from(id);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2c1b_3c6d);
    (h >> 27) as u8
}

impl TileReader for SyntheticReader {
    fn decode(&mut self, tile_id: u16, sink: &mut dyn LineSink) -> Result<(), DecodeError> {
        let placement = tile(tile_id).ok_or(DecodeError::MissingTile { tile_id })?;
        let extent = placement.extent();
        let base = base_color(tile_id);
        let edge = base_color(tile_id.wrapping_add(1));

        sink.start_image(extent, extent);
        let mut row = vec![0u16; extent as usize];
        for y in 0..extent {
            for (x, texel) in (0..extent).zip(row.iter_mut()) {
                let blend = if placement.is_continuous() || x + y < extent {
                    base
                } else {
                    edge
                };
                let s = speckle(x, y, tile_id);
                *texel = rgb565(
                    blend[0].saturating_add(s),
                    blend[1].saturating_add(s),
                    blend[2].saturating_add(s),
                );
            }
            sink.write_line(&row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectSink {
        size: Option<(u32, u32)>,
        rows: Vec<Vec<u16>>,
    }

    impl LineSink for CollectSink {
        fn start_image(&mut self, width: u32, height: u32) {
            self.size = Some((width, height));
        }

        fn write_line(&mut self, row: &[u16]) {
            self.rows.push(row.to_vec());
        }
    }

    #[test]
    fn test_rgb565_packing() {
        assert_eq!(rgb565(255, 255, 255), 0xffff);
        assert_eq!(rgb565(0, 0, 0), 0);
        assert_eq!(rgb565(255, 0, 0), 0xf800);
        assert_eq!(rgb565(0, 255, 0), 0x07e0);
        assert_eq!(rgb565(0, 0, 255), 0x001f);
    }

    #[test]
    fn test_rgb565_expansion_hits_extremes() {
        assert_eq!(rgb565_to_rgba8(0xffff), [255, 255, 255, 255]);
        assert_eq!(rgb565_to_rgba8(0), [0, 0, 0, 255]);
        assert_eq!(rgb565_to_rgba8(0xf800), [255, 0, 0, 255]);
    }

    #[test]
    fn test_memory_source_streams_rows() {
        let image = TileImage {
            width: 2,
            height: 3,
            texels: vec![1, 2, 3, 4, 5, 6],
        };
        let source = MemoryTileSource::new().with_tile(0, 9, image);
        let mut reader = source.tile_reader(0).unwrap();
        let mut sink = CollectSink::default();
        reader.decode(9, &mut sink).unwrap();
        assert_eq!(sink.size, Some((2, 3)));
        assert_eq!(sink.rows, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn test_memory_source_missing_file_and_tile() {
        let source = MemoryTileSource::solid_file(3, 4);
        assert!(matches!(
            source.tile_reader(1).err(),
            Some(DecodeError::NotFound { file_id: 1 })
        ));
        let mut reader = source.tile_reader(3).unwrap();
        let mut sink = CollectSink::default();
        assert!(matches!(
            reader.decode(4, &mut sink),
            Err(DecodeError::MissingTile { tile_id: 4 })
        ));
    }

    #[test]
    fn test_memory_source_insert_replaces_tile() {
        let mut source = MemoryTileSource::solid_file(2, 3);
        source.insert(2, 1, TileImage::solid(1, 1, 0xFFFF));
        source.insert(5, 0, TileImage::solid(1, 2, 7));
        assert_eq!(source.files.len(), 2);
        assert_eq!(source.files[&2].len(), 3);

        let mut sink = CollectSink::default();
        source.tile_reader(2).unwrap().decode(1, &mut sink).unwrap();
        assert_eq!(sink.rows, vec![vec![0xFFFF]]);
        let mut sink = CollectSink::default();
        source.tile_reader(5).unwrap().decode(0, &mut sink).unwrap();
        assert_eq!(sink.rows, vec![vec![7], vec![7]]);
    }

    #[test]
    fn test_memory_source_rejects_short_texels() {
        let image = TileImage {
            width: 4,
            height: 4,
            texels: vec![0; 5],
        };
        let source = MemoryTileSource::new().with_tile(0, 0, image);
        let mut reader = source.tile_reader(0).unwrap();
        let result = reader.decode(0, &mut CollectSink::default());
        assert!(matches!(result, Err(DecodeError::Corrupt { tile_id: 0, .. })));
    }

    #[test]
    fn test_image_dir_source_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let file_dir = dir.path().join("2");
        std::fs::create_dir_all(&file_dir).unwrap();
        let img = image::RgbaImage::from_fn(3, 2, |x, _| {
            if x == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        img.save(file_dir.join("5.png")).unwrap();

        let source = ImageDirSource::new(dir.path());
        let mut reader = source.tile_reader(2).unwrap();
        let mut sink = CollectSink::default();
        reader.decode(5, &mut sink).unwrap();
        assert_eq!(sink.size, Some((3, 2)));
        assert_eq!(sink.rows[0], vec![0xf800, 0x001f, 0x001f]);
        assert!(matches!(
            reader.decode(6, &mut sink),
            Err(DecodeError::MissingTile { tile_id: 6 })
        ));
    }

    #[test]
    fn test_image_dir_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageDirSource::new(dir.path());
        assert!(matches!(
            source.tile_reader(7).err(),
            Some(DecodeError::NotFound { file_id: 7 })
        ));
    }

    #[test]
    fn test_synthetic_tiles_match_placement() {
        let source = SyntheticTileSource::new(1);
        let mut reader = source.tile_reader(1).unwrap();
        let mut sink = CollectSink::default();
        reader.decode(0, &mut sink).unwrap();
        assert_eq!(sink.size, Some((160, 160)));
        assert_eq!(sink.rows.len(), 160);

        let mut again = CollectSink::default();
        reader.decode(0, &mut again).unwrap();
        assert_eq!(sink.rows, again.rows);
    }
}
