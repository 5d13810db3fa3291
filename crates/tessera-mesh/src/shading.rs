//! Per-vertex shading from height gradient and fog-of-war visibility.

use tessera_config::ShadeEncoding;
use tessera_terrain::{TerrainProvider, VISIBLE_MAX};

use crate::layout::MeshLayout;
use crate::vertex::{SHADE_BYTES_PER_CELL, SHADE_VERTEX_SIZE, VERTICES_PER_CELL};

const BASE_LUMINANCE: f32 = 0.85;
const SLOPE_FACTOR: f32 = 0.15;
const MIN_LUMINANCE: f32 = 0.4;
const MAX_LUMINANCE: f32 = 1.0;

/// Luminance of grid point `(x, y)` in `[0, 1]`.
///
/// Points on the map's outer frame are black, as are unseen points when fog
/// of war is on. Elsewhere a point brightens when its northern neighbour is
/// higher and darkens when it is lower.
pub fn emit_shade(terrain: &dyn TerrainProvider, x: u32, y: u32, fog: bool) -> f32 {
    let on_frame = x == 0
        || y == 0
        || x >= terrain.width().saturating_sub(2)
        || y >= terrain.height().saturating_sub(2);
    if on_frame {
        return 0.0;
    }

    let visibility = terrain.visibility(x, y);
    if fog && visibility == 0 {
        return 0.0;
    }

    let delta = terrain.height_at(x, y - 1) - terrain.height_at(x, y);
    let luminance = (BASE_LUMINANCE + delta * SLOPE_FACTOR).clamp(MIN_LUMINANCE, MAX_LUMINANCE);
    if fog {
        luminance * f32::from(visibility.min(VISIBLE_MAX)) / f32::from(VISIBLE_MAX)
    } else {
        luminance
    }
}

/// Encode a luminance as one 4-byte shade vertex.
pub fn encode_shade(luminance: f32, encoding: ShadeEncoding) -> [u8; SHADE_VERTEX_SIZE] {
    match encoding {
        ShadeEncoding::Float => luminance.to_le_bytes(),
        ShadeEncoding::PackedRgba8 => {
            let gray = (luminance * 255.0).round().clamp(0.0, 255.0) as u8;
            [gray, gray, gray, 255]
        }
    }
}

/// Encoded shade of the six vertices of cell `(x, y)`, in geometry order.
pub fn emit_cell_shade(
    terrain: &dyn TerrainProvider,
    x: u32,
    y: u32,
    fog: bool,
    encoding: ShadeEncoding,
) -> [[u8; SHADE_VERTEX_SIZE]; VERTICES_PER_CELL] {
    let top_left = encode_shade(emit_shade(terrain, x, y, fog), encoding);
    let bottom_left = encode_shade(emit_shade(terrain, x, y + 1, fog), encoding);
    let bottom_right = encode_shade(emit_shade(terrain, x + 1, y + 1, fog), encoding);
    let top_right = encode_shade(emit_shade(terrain, x + 1, y, fog), encoding);
    [
        top_left,
        bottom_left,
        bottom_right,
        top_left,
        bottom_right,
        top_right,
    ]
}

/// Write the shade of cell `(x, y)` into `out`, which must hold one cell.
pub fn write_cell_shade(
    terrain: &dyn TerrainProvider,
    x: u32,
    y: u32,
    fog: bool,
    encoding: ShadeEncoding,
    out: &mut [u8],
) {
    debug_assert_eq!(out.len(), SHADE_BYTES_PER_CELL);
    let vertices = emit_cell_shade(terrain, x, y, fog, encoding);
    for (dst, src) in out.chunks_exact_mut(SHADE_VERTEX_SIZE).zip(vertices) {
        dst.copy_from_slice(&src);
    }
}

/// Shade bytes for every cell, in cell-index order.
pub fn build_shade(
    terrain: &dyn TerrainProvider,
    layout: &MeshLayout,
    fog: bool,
    encoding: ShadeEncoding,
) -> Vec<u8> {
    let mut bytes = vec![0u8; layout.shade_size() as usize];
    for (index, cell) in bytes.chunks_exact_mut(SHADE_BYTES_PER_CELL).enumerate() {
        let x = (index % layout.buffer_width() as usize) as u32;
        let y = (index / layout.buffer_width() as usize) as u32;
        write_cell_shade(terrain, x, y, fog, encoding, cell);
    }
    bytes
}
