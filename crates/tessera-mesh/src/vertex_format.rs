//! `wgpu::VertexBufferLayout`s for the terrain pipeline.
//!
//! The geometry and shade buffers are bound as two vertex buffers:
//!
//! | Buffer   | Location | Offset | Format    | Field        |
//! |----------|----------|--------|-----------|--------------|
//! | geometry | 0        | 0      | Float32x2 | x, y         |
//! | geometry | 1        | 8      | Float32   | height       |
//! | geometry | 2        | 12     | Float32x2 | u, v         |
//! | shade    | 3        | 0      | Float32 or Unorm8x4 | luminance |

use std::mem;

use tessera_config::ShadeEncoding;
use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

use crate::vertex::{GeometryVertex, SHADE_VERTEX_SIZE, VertexKind};

pub const GEOMETRY_ATTRIBUTES: [VertexAttribute; 3] = [
    VertexAttribute {
        format: VertexFormat::Float32x2,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Float32,
        offset: 8,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Float32x2,
        offset: 12,
        shader_location: 2,
    },
];

const SHADE_FLOAT_ATTRIBUTES: [VertexAttribute; 1] = [VertexAttribute {
    format: VertexFormat::Float32,
    offset: 0,
    shader_location: 3,
}];

const SHADE_PACKED_ATTRIBUTES: [VertexAttribute; 1] = [VertexAttribute {
    format: VertexFormat::Unorm8x4,
    offset: 0,
    shader_location: 3,
}];

pub const GEOMETRY_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: mem::size_of::<GeometryVertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &GEOMETRY_ATTRIBUTES,
};

pub const SHADE_FLOAT_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: SHADE_VERTEX_SIZE as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &SHADE_FLOAT_ATTRIBUTES,
};

pub const SHADE_PACKED_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: SHADE_VERTEX_SIZE as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &SHADE_PACKED_ATTRIBUTES,
};

/// Layout of a buffer holding `kind` vertices.
pub fn vertex_buffer_layout(kind: VertexKind) -> VertexBufferLayout<'static> {
    match kind {
        VertexKind::Geometry => GEOMETRY_LAYOUT,
        VertexKind::Shade(ShadeEncoding::Float) => SHADE_FLOAT_LAYOUT,
        VertexKind::Shade(ShadeEncoding::PackedRgba8) => SHADE_PACKED_LAYOUT,
    }
}

// ---------------------------------------------------------------------------
// Compile-time validation
// ---------------------------------------------------------------------------

const _: () = assert!(
    mem::size_of::<GeometryVertex>() == 20,
    "GeometryVertex size changed, update GEOMETRY_LAYOUT"
);
const _: () = assert!(GEOMETRY_ATTRIBUTES[1].offset == 8);
const _: () = assert!(GEOMETRY_ATTRIBUTES[2].offset == 12);
const _: () = assert!(
    GEOMETRY_ATTRIBUTES[2].offset + 8 <= mem::size_of::<GeometryVertex>() as u64,
    "Last attribute exceeds vertex stride"
);
