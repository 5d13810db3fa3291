//! Dirty tracking: which cells need regenerating after terrain changes.

use std::ops::Range;

/// One bit per mesh cell.
#[derive(Clone, Debug)]
pub struct DirtyCells {
    width: u32,
    height: u32,
    bits: Vec<u64>,
    count: usize,
}

impl DirtyCells {
    pub fn new(width: u32, height: u32) -> Self {
        let cells = width as usize * height as usize;
        Self {
            width,
            height,
            bits: vec![0; cells.div_ceil(64)],
            count: 0,
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Mark a cell. Returns `true` if it was clean. Out-of-range cells are ignored.
    pub fn mark(&mut self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = self.index(x, y);
        let (word, bit) = (i / 64, 1u64 << (i % 64));
        if self.bits[word] & bit != 0 {
            return false;
        }
        self.bits[word] |= bit;
        self.count += 1;
        true
    }

    /// Mark every cell that has grid point `(x, y)` as a corner.
    pub fn mark_point(&mut self, x: u32, y: u32) {
        for (cx, cy) in cells_sharing_point(x, y, self.width, self.height) {
            self.mark(cx, cy);
        }
    }

    pub fn is_dirty(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = self.index(x, y);
        self.bits[i / 64] & (1u64 << (i % 64)) != 0
    }

    /// Clear a cell. Returns `true` if it was dirty.
    pub fn take(&mut self, x: u32, y: u32) -> bool {
        if !self.is_dirty(x, y) {
            return false;
        }
        let i = self.index(x, y);
        self.bits[i / 64] &= !(1u64 << (i % 64));
        self.count -= 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.count = 0;
    }

    /// Remove and return every dirty cell in row-major order.
    pub fn drain(&mut self) -> Vec<(u32, u32)> {
        let mut cells = Vec::with_capacity(self.count);
        let width = self.width.max(1) as usize;
        for (word_index, word) in self.bits.iter_mut().enumerate() {
            let mut w = std::mem::take(word);
            while w != 0 {
                let i = word_index * 64 + w.trailing_zeros() as usize;
                cells.push(((i % width) as u32, (i / width) as u32));
                w &= w - 1;
            }
        }
        self.count = 0;
        cells
    }
}

/// Cells `(x, y) (x-1, y) (x-1, y-1) (x, y-1)` that exist in a
/// `width x height` mesh.
pub fn cells_sharing_point(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> impl Iterator<Item = (u32, u32)> {
    let left = x.checked_sub(1);
    let up = y.checked_sub(1);
    [
        Some((x, y)),
        left.map(|lx| (lx, y)),
        left.zip(up),
        up.map(|uy| (x, uy)),
    ]
    .into_iter()
    .flatten()
    .filter(move |&(cx, cy)| cx < width && cy < height)
}

/// Rows and columns of mesh cells to refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub rows: Range<u32>,
    pub cols: Range<u32>,
}

/// Cells affected by a visibility change of `len` points starting at `(x, y)`.
///
/// Columns widen by one on each side and rows cover `y - 1 ..= y + 1`, all
/// clipped to the mesh. A change on the last grid row (`y == height`) is
/// dropped.
pub fn expand_line(x: u32, y: u32, len: u32, width: u32, height: u32) -> Option<DirtyRect> {
    if y >= height {
        return None;
    }
    let cols = x.saturating_sub(1)..x.saturating_add(len).saturating_add(1).min(width);
    let rows = y.saturating_sub(1)..y.saturating_add(2).min(height);
    if cols.is_empty() || rows.is_empty() {
        return None;
    }
    Some(DirtyRect { rows, cols })
}
