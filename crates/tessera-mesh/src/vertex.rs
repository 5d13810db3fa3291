//! Vertex payloads of the geometry and shade buffers.

use tessera_config::ShadeEncoding;

/// One geometry vertex: grid position, terrain height and atlas UV.
///
/// `x`/`y` are map grid coordinates. The projection handed to the GPU
/// context maps them (and the height) to the screen.
///
/// Layout (20 bytes): `x`, `y`, `height`, `u`, `v`, all `f32`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GeometryVertex {
    pub x: f32,
    pub y: f32,
    pub height: f32,
    pub u: f32,
    pub v: f32,
}

static_assertions::assert_eq_size!(GeometryVertex, [u8; 20]);

/// Two triangles per cell.
pub const VERTICES_PER_CELL: usize = 6;

/// Bytes per shade vertex for either encoding.
pub const SHADE_VERTEX_SIZE: usize = 4;

pub const GEOMETRY_BYTES_PER_CELL: usize = VERTICES_PER_CELL * size_of::<GeometryVertex>();

pub const SHADE_BYTES_PER_CELL: usize = VERTICES_PER_CELL * SHADE_VERTEX_SIZE;

const _: () = assert!(GEOMETRY_BYTES_PER_CELL == 120);
const _: () = assert!(SHADE_BYTES_PER_CELL == 24);

/// What a GPU vertex buffer holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Geometry,
    Shade(ShadeEncoding),
}

impl VertexKind {
    /// Bytes per vertex.
    pub const fn stride(self) -> usize {
        match self {
            Self::Geometry => size_of::<GeometryVertex>(),
            Self::Shade(_) => SHADE_VERTEX_SIZE,
        }
    }
}
