//! Atlas construction errors.

use thiserror::Error;

/// Errors raised while reading tiles from a tile source.
///
/// Any of these aborts atlas construction; no partial atlas is published.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source has no tile file with this id.
    #[error("tile file {file_id} not found")]
    NotFound { file_id: u32 },

    /// The tile file has no image for this tile id.
    #[error("tile {tile_id} missing from tile file")]
    MissingTile { tile_id: u16 },

    /// The image crate failed to decode a tile.
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem error while reading a tile.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The tile decoded but its contents are unusable.
    #[error("tile {tile_id} is corrupt: {reason}")]
    Corrupt { tile_id: u16, reason: String },
}
