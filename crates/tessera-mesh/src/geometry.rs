//! Triangle classification, UV mapping, and geometry vertex emission.
//!
//! Each cell `(x, y)` is split into an up triangle over the corners
//! `(x, y) (x, y+1) (x+1, y+1)` and a down triangle over
//! `(x, y) (x+1, y+1) (x+1, y)`. The landscape types at the three corners pick
//! an atlas tile and the orientation the tile is mapped with.

use tessera_atlas::{ATLAS_SIZE, BorderTable, GRID_UNIT, tile};
use tessera_terrain::{LandscapeType, TerrainProvider};

use crate::layout::MeshLayout;
use crate::orientation::{Orientation, TriangleKind};
use crate::vertex::{GeometryVertex, VERTICES_PER_CELL};

/// Horizontal world pixels between neighbouring grid points.
pub const DISTANCE_X: i32 = 32;

/// Vertical world pixels between neighbouring grid rows.
pub const DISTANCE_Y: i32 = 16;

/// Floor-style modulo: always in `[0, m)` for `m > 0`, also for negative `v`.
pub fn wrap_offset(v: i32, m: i32) -> i32 {
    debug_assert!(m > 0, "wrap modulus must be positive");
    v.rem_euclid(m)
}

/// World pixel position of grid point `(x, y)`. Rows shear left by half a cell.
pub fn world_position(x: u32, y: u32) -> (i32, i32) {
    let (x, y) = (x as i32, y as i32);
    (x * DISTANCE_X - y * (DISTANCE_X / 2), y * DISTANCE_Y)
}

/// Atlas tile and mapping chosen for one triangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriangleTile {
    pub tile_id: u16,
    pub orientation: Orientation,
}

/// Pick the tile for a triangle from its corner types.
///
/// The middle corner is `(x, y)` for up triangles and `(x+1, y+1)` for down
/// triangles.
pub fn classify_triangle(
    kind: TriangleKind,
    left: LandscapeType,
    middle: LandscapeType,
    right: LandscapeType,
    use_alternate: bool,
    borders: &BorderTable,
) -> TriangleTile {
    let (tile_id, orientation) = if left == middle && middle == right {
        (left.image_number(), Orientation::Continuous)
    } else if left == right {
        (
            borders.select(left, middle, use_alternate),
            Orientation::Straight,
        )
    } else if left == middle {
        (borders.select(left, right, use_alternate), Orientation::Left)
    } else {
        let outer = match kind {
            TriangleKind::Up => middle,
            TriangleKind::Down => right,
        };
        (borders.select(outer, left, use_alternate), Orientation::Right)
    };
    TriangleTile {
        tile_id,
        orientation,
    }
}

/// Normalized UVs of a triangle's corners, in emission order.
///
/// `anchor` is the world pixel position of the triangle's bounding box
/// top-left corner. Multi-cell tiles are sampled at that position wrapped
/// by `(size_cells - 1) * GRID_UNIT`, so neighbouring triangles continue the
/// same texture.
fn triangle_uvs(tri: TriangleTile, kind: TriangleKind, anchor: (i32, i32)) -> [[f32; 2]; 3] {
    let placement = tile(tri.tile_id);
    debug_assert!(placement.is_some(), "tile {} not in atlas", tri.tile_id);

    let (mut base_x, mut base_y) = (0, 0);
    if let Some(placement) = placement {
        let (ox, oy) = placement.origin();
        base_x = ox as i32;
        base_y = oy as i32;
        if placement.is_continuous() {
            let m = (i32::from(placement.size_cells) - 1) * GRID_UNIT as i32;
            base_x += wrap_offset(anchor.0, m);
            base_y += wrap_offset(anchor.1, m);
        }
    }

    let scale = ATLAS_SIZE as f32;
    tri.orientation
        .texel_offsets(kind)
        .map(|[u, v]| [(base_x + u) as f32 / scale, (base_y + v) as f32 / scale])
}

fn seed_alternate(seed: u32) -> bool {
    seed & 1 == 0
}

fn vertex(terrain: &dyn TerrainProvider, x: u32, y: u32, uv: [f32; 2]) -> GeometryVertex {
    GeometryVertex {
        x: x as f32,
        y: y as f32,
        height: terrain.height_at(x, y),
        u: uv[0],
        v: uv[1],
    }
}

/// The six geometry vertices of cell `(x, y)`: up triangle then down triangle.
pub fn emit_cell(
    terrain: &dyn TerrainProvider,
    borders: &BorderTable,
    x: u32,
    y: u32,
) -> [GeometryVertex; VERTICES_PER_CELL] {
    let top_left = terrain.landscape(x, y);
    let bottom_left = terrain.landscape(x, y + 1);
    let bottom_right = terrain.landscape(x + 1, y + 1);
    let top_right = terrain.landscape(x + 1, y);

    let up = classify_triangle(
        TriangleKind::Up,
        bottom_left,
        top_left,
        bottom_right,
        seed_alternate(x.wrapping_mul(37).wrapping_add(y.wrapping_mul(17))),
        borders,
    );
    let down = classify_triangle(
        TriangleKind::Down,
        top_left,
        bottom_right,
        top_right,
        seed_alternate(x),
        borders,
    );

    let (wx, wy) = world_position(x, y);
    let up_uv = triangle_uvs(up, TriangleKind::Up, (wx - DISTANCE_X / 2, wy));
    let down_uv = triangle_uvs(down, TriangleKind::Down, (wx, wy));

    [
        vertex(terrain, x, y, up_uv[0]),
        vertex(terrain, x, y + 1, up_uv[1]),
        vertex(terrain, x + 1, y + 1, up_uv[2]),
        vertex(terrain, x, y, down_uv[0]),
        vertex(terrain, x + 1, y + 1, down_uv[1]),
        vertex(terrain, x + 1, y, down_uv[2]),
    ]
}

/// Geometry for every cell, in cell-index order.
pub fn build_geometry(
    terrain: &dyn TerrainProvider,
    borders: &BorderTable,
    layout: &MeshLayout,
) -> Vec<GeometryVertex> {
    let mut vertices = Vec::with_capacity(layout.vertex_count());
    for y in 0..layout.buffer_height() {
        for x in 0..layout.buffer_width() {
            vertices.extend_from_slice(&emit_cell(terrain, borders, x, y));
        }
    }
    vertices
}
