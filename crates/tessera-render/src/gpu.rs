//! The narrow GPU interface the terrain renderer draws through.
//!
//! [`GpuContext`] hides buffer allocation, region writes, texture upload and
//! the draw call. Handles carry the generation of the context that issued
//! them, so every handle goes stale at once when the context is lost.

use std::ops::Range;

use rustc_hash::FxHashMap;
use tessera_atlas::{AtlasPixels, TextureTarget};
use tessera_mesh::VertexKind;

/// A vertex buffer issued by a [`GpuContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    id: u32,
    generation: u32,
}

/// A texture issued by a [`GpuContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    id: u32,
    generation: u32,
}

impl BufferHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl TextureHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A rejected GPU buffer operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferFault {
    /// The handle was released or belongs to a lost context.
    #[error("buffer handle is no longer valid")]
    InvalidHandle,

    /// A write reached past the end of the buffer.
    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    /// The context could not create the resource.
    #[error("allocation failed: {0}")]
    Allocation(String),
}

/// Which triangles of the mesh a draw covers, all counts in triangles.
///
/// Row `r` draws `cols` triangles starting at `first_triangle + r * stride`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawSpan {
    pub first_triangle: u32,
    pub rows: u32,
    pub cols: u32,
    pub stride: u32,
}

impl DrawSpan {
    /// Vertex ranges of each row, clipped to a buffer of `vertex_count` vertices.
    pub fn vertex_ranges(&self, vertex_count: u32) -> impl Iterator<Item = Range<u32>> + '_ {
        (0..self.rows).filter_map(move |row| {
            let first = u64::from(self.first_triangle) + u64::from(row) * u64::from(self.stride);
            let start = (first * 3).min(u64::from(vertex_count)) as u32;
            let end = ((first + u64::from(self.cols)) * 3).min(u64::from(vertex_count)) as u32;
            (start < end).then_some(start..end)
        })
    }
}

/// GPU operations needed to keep the terrain mesh resident and draw it.
pub trait GpuContext {
    /// Allocate a vertex buffer for `vertex_count` vertices of `kind`.
    fn allocate_buffer(
        &mut self,
        vertex_count: usize,
        kind: VertexKind,
        label: &str,
    ) -> Result<BufferHandle, BufferFault>;

    /// Overwrite `bytes.len()` bytes at `offset`.
    fn write_buffer(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), BufferFault>;

    /// Upload an RGB565 texture of `width x height` texels.
    fn allocate_texture(
        &mut self,
        width: u32,
        height: u32,
        texels: &[u16],
        label: &str,
    ) -> Result<TextureHandle, BufferFault>;

    fn is_buffer_valid(&self, handle: BufferHandle) -> bool;

    fn is_texture_valid(&self, handle: TextureHandle) -> bool;

    fn release_buffer(&mut self, handle: BufferHandle);

    fn release_texture(&mut self, handle: TextureHandle);

    /// Draw textured, shaded triangles from a geometry and a shade buffer.
    fn draw_triangles(
        &mut self,
        texture: TextureHandle,
        geometry: BufferHandle,
        shade: BufferHandle,
        span: DrawSpan,
    ) -> Result<(), BufferFault>;
}

/// Uploads the shared atlas through a [`GpuContext`].
pub(crate) struct AtlasUpload<'a, G: ?Sized>(pub &'a mut G);

impl<G: GpuContext + ?Sized> TextureTarget for AtlasUpload<'_, G> {
    type Handle = TextureHandle;
    type Error = BufferFault;

    fn is_texture_valid(&self, handle: &TextureHandle) -> bool {
        self.0.is_texture_valid(*handle)
    }

    fn upload_atlas(&mut self, pixels: &AtlasPixels) -> Result<TextureHandle, BufferFault> {
        self.0
            .allocate_texture(pixels.size(), pixels.size(), pixels.texels(), "terrain-atlas")
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.0.release_texture(handle);
    }
}

/// Resource storage keyed by handle id, shared by the context implementations.
///
/// Ids are never reused and all entries share one generation, so a released
/// or pre-loss handle can never alias a live resource.
pub(crate) struct ResourceSlab<T> {
    entries: FxHashMap<u32, T>,
    next_id: u32,
    generation: u32,
}

impl<T> ResourceSlab<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            next_id: 0,
            generation: 0,
        }
    }

    /// Store `value` and return its `(id, generation)`.
    pub(crate) fn insert(&mut self, value: T) -> (u32, u32) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, value);
        (id, self.generation)
    }

    pub(crate) fn get(&self, id: u32, generation: u32) -> Option<&T> {
        if generation != self.generation {
            return None;
        }
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u32, generation: u32) -> Option<&mut T> {
        if generation != self.generation {
            return None;
        }
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: u32, generation: u32) -> Option<T> {
        if generation != self.generation {
            return None;
        }
        self.entries.remove(&id)
    }

    /// Drop every entry and move to a new generation.
    pub(crate) fn invalidate_all(&mut self) {
        self.entries.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn buffer_handle(&mut self, value: T) -> BufferHandle {
        let (id, generation) = self.insert(value);
        BufferHandle { id, generation }
    }

    pub(crate) fn texture_handle(&mut self, value: T) -> TextureHandle {
        let (id, generation) = self.insert(value);
        TextureHandle { id, generation }
    }
}

/// Check that `len` bytes at `offset` fit in a buffer of `size` bytes.
pub(crate) fn check_write(offset: u64, len: usize, size: u64) -> Result<(), BufferFault> {
    let len = len as u64;
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(BufferFault::OutOfBounds { offset, len, size }),
    }
}
