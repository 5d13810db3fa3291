//! Landscape tile atlas for Tessera.
//!
//! Packs the landscape tile library into one `1024x1024` RGB565 bitmap at
//! fixed grid positions, selects border-transition tiles between terrain
//! types, and owns the shared atlas resource that renderers upload from.

mod border;
mod builder;
mod error;
mod resource;
mod source;
mod tile_table;

pub use border::{BorderTable, DuplicateBorder, select_border};
pub use builder::{AtlasPixels, build_atlas};
pub use error::DecodeError;
pub use resource::{AtlasResource, SharedAtlas, TextureTarget};
pub use source::{
    ImageDirSource, LineSink, MemoryTileSource, SyntheticTileSource, TileImage, TileReader,
    TileSource, rgb565, rgb565_to_rgba8,
};
pub use tile_table::{ATLAS_SIZE, AtlasTile, GRID_UNIT, TILE_COUNT, tile};
