//! Terrain mesh generation: vertex formats, triangle classification and UV
//! mapping, per-vertex shading, and dirty-cell tracking.

pub mod geometry;
pub mod invalidation;
pub mod layout;
pub mod orientation;
pub mod shading;
pub mod vertex;
pub mod vertex_format;

pub use geometry::{
    DISTANCE_X, DISTANCE_Y, TriangleTile, build_geometry, classify_triangle, emit_cell,
    world_position, wrap_offset,
};
pub use invalidation::{DirtyCells, DirtyRect, cells_sharing_point, expand_line};
pub use layout::MeshLayout;
pub use orientation::{Orientation, TriangleKind};
pub use shading::{build_shade, emit_cell_shade, emit_shade, encode_shade, write_cell_shade};
pub use vertex::{
    GEOMETRY_BYTES_PER_CELL, GeometryVertex, SHADE_BYTES_PER_CELL, SHADE_VERTEX_SIZE,
    VERTICES_PER_CELL, VertexKind,
};
pub use vertex_format::{
    GEOMETRY_ATTRIBUTES, GEOMETRY_LAYOUT, SHADE_FLOAT_LAYOUT, SHADE_PACKED_LAYOUT,
    vertex_buffer_layout,
};
