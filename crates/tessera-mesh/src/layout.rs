//! Cell indexing and buffer offsets for a map.

use crate::vertex::{GEOMETRY_BYTES_PER_CELL, SHADE_BYTES_PER_CELL, VERTICES_PER_CELL};

/// Dimensions of the mesh built over a `map_width x map_height` grid.
///
/// Cells sit between grid points, so the mesh is one smaller on each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshLayout {
    pub map_width: u32,
    pub map_height: u32,
}

impl MeshLayout {
    pub fn new(map_width: u32, map_height: u32) -> Self {
        Self {
            map_width,
            map_height,
        }
    }

    pub fn buffer_width(&self) -> u32 {
        self.map_width.saturating_sub(1)
    }

    pub fn buffer_height(&self) -> u32 {
        self.map_height.saturating_sub(1)
    }

    pub fn cell_count(&self) -> usize {
        self.buffer_width() as usize * self.buffer_height() as usize
    }

    /// Vertices in either buffer.
    pub fn vertex_count(&self) -> usize {
        self.cell_count() * VERTICES_PER_CELL
    }

    pub fn cell_index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.buffer_width() && y < self.buffer_height());
        y as usize * self.buffer_width() as usize + x as usize
    }

    pub fn geometry_offset(&self, x: u32, y: u32) -> u64 {
        (self.cell_index(x, y) * GEOMETRY_BYTES_PER_CELL) as u64
    }

    pub fn shade_offset(&self, x: u32, y: u32) -> u64 {
        (self.cell_index(x, y) * SHADE_BYTES_PER_CELL) as u64
    }

    pub fn geometry_size(&self) -> u64 {
        (self.cell_count() * GEOMETRY_BYTES_PER_CELL) as u64
    }

    pub fn shade_size(&self) -> u64 {
        (self.cell_count() * SHADE_BYTES_PER_CELL) as u64
    }
}
