//! Shade buffer update strategies.
//!
//! Visibility and height changes alter the shading of whole lines of cells.
//! A [`ShadeStrategy`] decides when that work happens:
//!
//! * [`AsyncShadeCache`] regenerates changed cells into a CPU shadow copy as
//!   soon as the notification arrives, from whatever thread sends it, and
//!   records the stale spans. A draw only copies stale spans of visible rows
//!   to the GPU.
//! * [`SyncShadeCache`] only remembers which cells changed. A draw regenerates
//!   the dirty cells of visible rows in place.

use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tessera_config::{ShadeEncoding, UpdateStrategy};
use tessera_mesh::{
    DirtyCells, DirtyRect, MeshLayout, SHADE_BYTES_PER_CELL, build_shade, write_cell_shade,
};
use tessera_terrain::TerrainProvider;

use crate::gpu::{BufferFault, BufferHandle, GpuContext};
use crate::region::VisibleRow;

/// Everything needed to shade a cell.
#[derive(Clone, Copy)]
pub struct ShadeParams<'a> {
    pub terrain: &'a dyn TerrainProvider,
    pub layout: MeshLayout,
    pub fog: bool,
    pub encoding: ShadeEncoding,
}

/// When shade changes are regenerated and written.
pub trait ShadeStrategy: Send + Sync {
    fn kind(&self) -> UpdateStrategy;

    /// Cells in `rect` need new shading. May be called from any thread.
    fn lines_changed(&self, params: &ShadeParams<'_>, rect: &DirtyRect);

    /// Shade every cell and forget pending changes. Returns the full buffer.
    fn rebuild(&self, params: &ShadeParams<'_>) -> Vec<u8>;

    /// Bring the visible rows of `buffer` up to date. Returns the number of writes.
    fn flush(
        &self,
        params: &ShadeParams<'_>,
        rows: &[VisibleRow],
        gpu: &mut dyn GpuContext,
        buffer: BufferHandle,
    ) -> Result<usize, BufferFault>;

    /// Cells waiting to be written.
    fn pending(&self) -> usize;
}

/// The strategy selected by `kind`.
pub fn shade_strategy(kind: UpdateStrategy, layout: MeshLayout) -> Box<dyn ShadeStrategy> {
    match kind {
        UpdateStrategy::Async => Box::new(AsyncShadeCache::new(layout)),
        UpdateStrategy::Sync => Box::new(SyncShadeCache::new(layout)),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn cell_range(layout: &MeshLayout, y: u32, cols: &Range<u32>) -> Range<usize> {
    let start = layout.shade_offset(cols.start, y) as usize;
    start..start + cols.len() * SHADE_BYTES_PER_CELL
}

/// Stale column spans per mesh row, kept sorted and disjoint.
#[derive(Clone, Debug, Default)]
pub struct RowSpans {
    rows: Vec<Vec<Range<u32>>>,
}

impl RowSpans {
    pub fn new(height: u32) -> Self {
        Self {
            rows: vec![Vec::new(); height as usize],
        }
    }

    /// Add `cols` to row `y`, merging with overlapping or touching spans.
    pub fn mark(&mut self, y: u32, cols: Range<u32>) {
        let Some(spans) = self.rows.get_mut(y as usize) else {
            return;
        };
        if cols.is_empty() {
            return;
        }
        let mut merged = cols;
        spans.retain(|span| {
            if span.start <= merged.end && merged.start <= span.end {
                merged = merged.start.min(span.start)..merged.end.max(span.end);
                false
            } else {
                true
            }
        });
        let at = spans.partition_point(|span| span.start < merged.start);
        spans.insert(at, merged);
    }

    /// Remove and return the parts of row `y` inside `cols`.
    pub fn take(&mut self, y: u32, cols: &Range<u32>) -> Vec<Range<u32>> {
        let Some(spans) = self.rows.get_mut(y as usize) else {
            return Vec::new();
        };
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(spans.len());
        for span in spans.drain(..) {
            let start = span.start.max(cols.start);
            let end = span.end.min(cols.end);
            if start >= end {
                kept.push(span);
                continue;
            }
            taken.push(start..end);
            if span.start < start {
                kept.push(span.start..start);
            }
            if end < span.end {
                kept.push(end..span.end);
            }
        }
        *spans = kept;
        taken
    }

    pub fn row(&self, y: u32) -> &[Range<u32>] {
        self.rows.get(y as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stale cells over all rows.
    pub fn cells(&self) -> usize {
        self.rows.iter().flatten().map(|span| span.len()).sum()
    }

    pub fn clear(&mut self) {
        self.rows.iter_mut().for_each(Vec::clear);
    }
}

struct ShadowState {
    shadow: Vec<u8>,
    stale: RowSpans,
    /// Lines changed while a rebuild shades the map outside the lock.
    /// `Some` only between [`AsyncShadeCache::begin_rebuild`] and
    /// [`AsyncShadeCache::finish_rebuild`].
    journal: Option<Vec<DirtyRect>>,
}

/// Regenerate the cells of `rect` into `shadow`.
fn shade_rect(shadow: &mut [u8], layout: &MeshLayout, params: &ShadeParams<'_>, rect: &DirtyRect) {
    for y in rect.rows.clone() {
        let bytes = &mut shadow[cell_range(layout, y, &rect.cols)];
        for (x, cell) in rect
            .cols
            .clone()
            .zip(bytes.chunks_exact_mut(SHADE_BYTES_PER_CELL))
        {
            write_cell_shade(params.terrain, x, y, params.fog, params.encoding, cell);
        }
    }
}

/// Shadow copy of the shade buffer plus the spans the GPU has not seen yet.
///
/// Both live under one mutex. GPU writes happen after the lock is released,
/// and a full rebuild shades the map without holding it.
pub struct AsyncShadeCache {
    layout: MeshLayout,
    state: Mutex<ShadowState>,
}

impl AsyncShadeCache {
    pub fn new(layout: MeshLayout) -> Self {
        Self {
            layout,
            state: Mutex::new(ShadowState {
                shadow: vec![0; layout.shade_size() as usize],
                stale: RowSpans::new(layout.buffer_height()),
                journal: None,
            }),
        }
    }

    /// Stale spans of row `y`.
    pub fn stale_row(&self, y: u32) -> Vec<Range<u32>> {
        lock(&self.state).stale.row(y).to_vec()
    }

    fn begin_rebuild(&self) {
        lock(&self.state).journal = Some(Vec::new());
    }

    /// Install `fresh` as the shadow, reshading lines that changed since
    /// [`Self::begin_rebuild`]. Returns a copy of the installed shadow.
    fn finish_rebuild(&self, params: &ShadeParams<'_>, mut fresh: Vec<u8>) -> Vec<u8> {
        let mut state = lock(&self.state);
        for rect in state.journal.take().unwrap_or_default() {
            shade_rect(&mut fresh, &self.layout, params, &rect);
        }
        state.shadow = fresh;
        state.stale.clear();
        state.shadow.clone()
    }
}

impl ShadeStrategy for AsyncShadeCache {
    fn kind(&self) -> UpdateStrategy {
        UpdateStrategy::Async
    }

    fn lines_changed(&self, params: &ShadeParams<'_>, rect: &DirtyRect) {
        let mut state = lock(&self.state);
        if let Some(journal) = &mut state.journal {
            journal.push(rect.clone());
            return;
        }
        let ShadowState { shadow, stale, .. } = &mut *state;
        shade_rect(shadow, &self.layout, params, rect);
        for y in rect.rows.clone() {
            stale.mark(y, rect.cols.clone());
        }
    }

    fn rebuild(&self, params: &ShadeParams<'_>) -> Vec<u8> {
        self.begin_rebuild();
        let fresh = build_shade(params.terrain, &self.layout, params.fog, params.encoding);
        self.finish_rebuild(params, fresh)
    }

    fn flush(
        &self,
        _params: &ShadeParams<'_>,
        rows: &[VisibleRow],
        gpu: &mut dyn GpuContext,
        buffer: BufferHandle,
    ) -> Result<usize, BufferFault> {
        let mut updates = Vec::new();
        {
            let mut state = lock(&self.state);
            for row in rows {
                for span in state.stale.take(row.y, &row.cols) {
                    let range = cell_range(&self.layout, row.y, &span);
                    updates.push((range.start as u64, state.shadow[range].to_vec()));
                }
            }
        }

        for (offset, bytes) in &updates {
            gpu.write_buffer(buffer, *offset, bytes)?;
        }
        Ok(updates.len())
    }

    fn pending(&self) -> usize {
        lock(&self.state).stale.cells()
    }
}

/// One dirty bit per cell; dirty cells are shaded on the draw thread.
///
/// Meant for single-threaded use. The bitset sits behind a mutex only so the
/// cache can be shared with the change listener.
pub struct SyncShadeCache {
    layout: MeshLayout,
    written: Mutex<DirtyCells>,
}

impl SyncShadeCache {
    pub fn new(layout: MeshLayout) -> Self {
        Self {
            layout,
            written: Mutex::new(DirtyCells::new(layout.buffer_width(), layout.buffer_height())),
        }
    }
}

impl ShadeStrategy for SyncShadeCache {
    fn kind(&self) -> UpdateStrategy {
        UpdateStrategy::Sync
    }

    fn lines_changed(&self, _params: &ShadeParams<'_>, rect: &DirtyRect) {
        let mut written = lock(&self.written);
        for y in rect.rows.clone() {
            for x in rect.cols.clone() {
                written.mark(x, y);
            }
        }
    }

    fn rebuild(&self, params: &ShadeParams<'_>) -> Vec<u8> {
        lock(&self.written).clear();
        build_shade(params.terrain, &self.layout, params.fog, params.encoding)
    }

    fn flush(
        &self,
        params: &ShadeParams<'_>,
        rows: &[VisibleRow],
        gpu: &mut dyn GpuContext,
        buffer: BufferHandle,
    ) -> Result<usize, BufferFault> {
        let mut writes = 0;
        let mut scratch = Vec::new();
        for row in rows {
            let runs = {
                let mut written = lock(&self.written);
                dirty_runs(&mut written, row)
            };
            for run in runs {
                scratch.resize(run.len() * SHADE_BYTES_PER_CELL, 0);
                for (x, cell) in run
                    .clone()
                    .zip(scratch.chunks_exact_mut(SHADE_BYTES_PER_CELL))
                {
                    write_cell_shade(params.terrain, x, row.y, params.fog, params.encoding, cell);
                }
                gpu.write_buffer(buffer, self.layout.shade_offset(run.start, row.y), &scratch)?;
                writes += 1;
            }
        }
        Ok(writes)
    }

    fn pending(&self) -> usize {
        lock(&self.written).len()
    }
}

/// Clear the dirty cells of `row` and return them as contiguous runs.
fn dirty_runs(written: &mut DirtyCells, row: &VisibleRow) -> Vec<Range<u32>> {
    let mut runs: Vec<Range<u32>> = Vec::new();
    for x in row.cols.clone() {
        if !written.take(x, row.y) {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.end == x => run.end = x + 1,
            _ => runs.push(x..x + 1),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessContext;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tessera_mesh::{VertexKind, expand_line};
    use tessera_terrain::{GridTerrain, TerrainSample};

    fn terrain() -> GridTerrain {
        GridTerrain::from_fn(16, 16, |x, y| TerrainSample {
            height: ((x * 7 + y * 3) % 5) as f32,
            ..TerrainSample::default()
        })
    }

    fn params(terrain: &GridTerrain) -> ShadeParams<'_> {
        ShadeParams {
            terrain,
            layout: MeshLayout::new(16, 16),
            fog: true,
            encoding: ShadeEncoding::Float,
        }
    }

    fn full_rows(layout: &MeshLayout) -> Vec<VisibleRow> {
        (0..layout.buffer_height())
            .map(|y| VisibleRow {
                y,
                cols: 0..layout.buffer_width(),
            })
            .collect()
    }

    // ---- RowSpans ----

    #[test]
    fn test_spans_merge() {
        let mut spans = RowSpans::new(4);
        spans.mark(1, 5..8);
        spans.mark(1, 10..12);
        spans.mark(1, 8..10);
        assert_eq!(spans.row(1), &[5..12]);
        spans.mark(1, 0..2);
        assert_eq!(spans.row(1), &[0..2, 5..12]);
        assert_eq!(spans.cells(), 9);
        spans.mark(9, 0..3);
        assert_eq!(spans.cells(), 9);
    }

    #[test]
    fn test_take_keeps_outside_parts() {
        let mut spans = RowSpans::new(2);
        spans.mark(0, 2..10);
        assert_eq!(spans.take(0, &(4..6)), vec![4..6]);
        assert_eq!(spans.row(0), &[2..4, 6..10]);
        assert_eq!(spans.take(0, &(20..30)), Vec::<Range<u32>>::new());
        assert_eq!(spans.take(0, &(0..16)), vec![2..4, 6..10]);
        assert_eq!(spans.cells(), 0);
    }

    // ---- Async ----

    #[test]
    fn test_async_shadow_tracks_notifications() {
        let terrain = terrain();
        let cache = AsyncShadeCache::new(MeshLayout::new(16, 16));
        cache.rebuild(&params(&terrain));

        terrain.set_visibility(6, 6, 0);
        let rect = expand_line(6, 6, 1, 15, 15).unwrap();
        cache.lines_changed(&params(&terrain), &rect);
        assert_eq!(cache.pending(), 3 * 3);
        assert_eq!(cache.stale_row(6), vec![5..8]);

        let expected = build_shade(&terrain, &MeshLayout::new(16, 16), true, ShadeEncoding::Float);
        assert_eq!(lock(&cache.state).shadow, expected);
    }

    #[test]
    fn test_async_lines_during_rebuild_are_reshaded() {
        let terrain = terrain();
        let layout = MeshLayout::new(16, 16);
        let cache = AsyncShadeCache::new(layout);

        cache.begin_rebuild();
        let before = build_shade(&terrain, &layout, true, ShadeEncoding::Float);
        // Changes after the map was shaded but before the new shadow is installed.
        terrain.set_visibility(9, 3, 0);
        cache.lines_changed(&params(&terrain), &expand_line(9, 3, 1, 15, 15).unwrap());
        assert_eq!(cache.pending(), 0);

        let full = cache.finish_rebuild(&params(&terrain), before);
        let expected = build_shade(&terrain, &layout, true, ShadeEncoding::Float);
        assert_eq!(full, expected);
        assert_eq!(cache.pending(), 0);

        // Back to regular stale tracking once installed.
        cache.lines_changed(&params(&terrain), &expand_line(9, 3, 1, 15, 15).unwrap());
        assert_eq!(cache.pending(), 9);
    }

    #[test]
    fn test_async_rebuild_races_notifier() {
        let terrain = Arc::new(GridTerrain::from_fn(48, 48, |x, y| TerrainSample {
            height: ((x * 5 + y * 11) % 7) as f32,
            ..TerrainSample::default()
        }));
        let layout = MeshLayout::new(48, 48);
        let cache = Arc::new(AsyncShadeCache::new(layout));
        fn params(terrain: &GridTerrain) -> ShadeParams<'_> {
            ShadeParams {
                terrain,
                layout: MeshLayout::new(48, 48),
                fog: true,
                encoding: ShadeEncoding::Float,
            }
        }
        let done = Arc::new(AtomicBool::new(false));

        let notifier = {
            let terrain = Arc::clone(&terrain);
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for i in 0..4000u32 {
                    let (x, y) = ((i * 7) % 48, (i * 13) % 47);
                    terrain.set_visibility(x, y, (i % 101) as u8);
                    if let Some(rect) = expand_line(x, y, 1, 47, 47) {
                        cache.lines_changed(&params(&terrain), &rect);
                    }
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut rebuilds = 0;
        while !done.load(Ordering::Acquire) || rebuilds == 0 {
            cache.rebuild(&params(&terrain));
            rebuilds += 1;
        }
        notifier.join().unwrap();

        let expected = build_shade(terrain.as_ref(), &layout, true, ShadeEncoding::Float);
        assert_eq!(lock(&cache.state).shadow, expected);
        assert!(lock(&cache.state).journal.is_none());
    }

    #[test]
    fn test_async_flush_only_visible_rows() {
        let terrain = terrain();
        let layout = MeshLayout::new(16, 16);
        let cache = AsyncShadeCache::new(layout);
        let mut gpu = HeadlessContext::new();
        let buffer = gpu
            .allocate_buffer(layout.vertex_count(), VertexKind::Shade(ShadeEncoding::Float), "shade")
            .unwrap();
        let full = cache.rebuild(&params(&terrain));
        gpu.write_buffer(buffer, 0, &full).unwrap();
        gpu.reset_counters();

        cache.lines_changed(&params(&terrain), &expand_line(3, 10, 2, 15, 15).unwrap());
        let visible = [VisibleRow { y: 10, cols: 0..15 }];
        let writes = cache.flush(&params(&terrain), &visible, &mut gpu, buffer).unwrap();
        assert_eq!(writes, 1);
        assert_eq!(cache.stale_row(10), Vec::<Range<u32>>::new());
        assert_eq!(cache.stale_row(9), vec![2..6]);
        assert_eq!(cache.stale_row(11), vec![2..6]);
    }

    // ---- Sync ----

    #[test]
    fn test_sync_writes_contiguous_runs() {
        let terrain = terrain();
        let layout = MeshLayout::new(16, 16);
        let cache = SyncShadeCache::new(layout);
        let mut gpu = HeadlessContext::new();
        let buffer = gpu
            .allocate_buffer(layout.vertex_count(), VertexKind::Shade(ShadeEncoding::Float), "shade")
            .unwrap();
        let full = cache.rebuild(&params(&terrain));
        gpu.write_buffer(buffer, 0, &full).unwrap();
        gpu.reset_counters();

        terrain.set_visibility(4, 4, 10);
        terrain.set_visibility(11, 4, 10);
        cache.lines_changed(&params(&terrain), &expand_line(4, 4, 1, 15, 15).unwrap());
        cache.lines_changed(&params(&terrain), &expand_line(11, 4, 1, 15, 15).unwrap());
        assert_eq!(cache.pending(), 2 * 9);

        let writes = cache
            .flush(&params(&terrain), &full_rows(&layout), &mut gpu, buffer)
            .unwrap();
        // Two separate runs on each of rows 3, 4 and 5.
        assert_eq!(writes, 6);
        assert_eq!(cache.pending(), 0);

        let expected = build_shade(&terrain, &layout, true, ShadeEncoding::Float);
        assert_eq!(gpu.buffer_bytes(buffer).unwrap(), expected.as_slice());
    }

    #[test]
    fn test_sync_keeps_bits_outside_visible_range() {
        let terrain = terrain();
        let layout = MeshLayout::new(16, 16);
        let cache = SyncShadeCache::new(layout);
        let mut gpu = HeadlessContext::new();
        let buffer = gpu
            .allocate_buffer(layout.vertex_count(), VertexKind::Shade(ShadeEncoding::Float), "shade")
            .unwrap();

        cache.lines_changed(&params(&terrain), &expand_line(8, 12, 1, 15, 15).unwrap());
        let visible = [VisibleRow { y: 12, cols: 0..8 }];
        let writes = cache.flush(&params(&terrain), &visible, &mut gpu, buffer).unwrap();
        assert_eq!(writes, 1);
        assert_eq!(cache.pending(), 9 - 1);
    }

    #[test]
    fn test_strategy_selection() {
        let layout = MeshLayout::new(4, 4);
        assert_eq!(
            shade_strategy(UpdateStrategy::Async, layout).kind(),
            UpdateStrategy::Async
        );
        assert_eq!(
            shade_strategy(UpdateStrategy::Sync, layout).kind(),
            UpdateStrategy::Sync
        );
    }
}
