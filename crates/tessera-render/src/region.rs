//! The part of the mesh on screen.

use std::ops::Range;

use tessera_mesh::MeshLayout;

use crate::gpu::DrawSpan;

/// Visible window of the map in map coordinates.
///
/// Screen rows shear against map rows by half a cell per row, so each mesh
/// row in the window starts at a different column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibleRegion {
    pub min_x: i32,
    pub min_y: i32,
    pub width: u32,
    pub height: u32,
}

/// Cells of one mesh row inside the visible window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleRow {
    pub y: u32,
    pub cols: Range<u32>,
}

impl VisibleRegion {
    pub fn new(min_x: i32, min_y: i32, width: u32, height: u32) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// A window covering the whole mesh of `layout`.
    pub fn whole_map(layout: &MeshLayout) -> Self {
        let height = layout.buffer_height();
        // Later rows start further right; shift left so the last row still starts at 0.
        let shear = height / 2;
        Self::new(-(shear as i32), 0, layout.buffer_width() + shear, height)
    }

    /// Visible cells of each mesh row, clipped to the mesh.
    pub fn rows(&self, layout: &MeshLayout) -> Vec<VisibleRow> {
        let buffer_width = i64::from(layout.buffer_width());
        let buffer_height = i64::from(layout.buffer_height());
        let min_y = i64::from(self.min_y);
        let first = min_y.max(0);
        let last = (min_y + i64::from(self.height)).min(buffer_height);
        let line_start = i64::from(self.min_x) - i64::from(self.min_y / 2);

        (first..last)
            .filter_map(|y| {
                let start = line_start + y / 2;
                let end = (start + i64::from(self.width)).min(buffer_width);
                let start = start.clamp(0, buffer_width);
                (start < end).then(|| VisibleRow {
                    y: y as u32,
                    cols: start as u32..end as u32,
                })
            })
            .collect()
    }

    /// The draw call covering this window.
    pub fn draw_span(&self, layout: &MeshLayout) -> DrawSpan {
        let buffer_width = i64::from(layout.buffer_width());
        let offset = i64::from(self.min_y) * buffer_width + i64::from(self.min_x);
        DrawSpan {
            first_triangle: (offset * 2).clamp(0, i64::from(u32::MAX)) as u32,
            rows: self.height,
            cols: self.width.saturating_mul(2),
            stride: (2 * buffer_width + 1).min(i64::from(u32::MAX)) as u32,
        }
    }
}
