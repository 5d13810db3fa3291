//! In-memory [`GpuContext`] that keeps buffers as byte vectors.
//!
//! Used by tests and the CLI session. It counts writes and draws, can inject
//! faults, and can simulate context loss.

use tessera_mesh::VertexKind;

use crate::gpu::{
    BufferFault, BufferHandle, DrawSpan, GpuContext, ResourceSlab, TextureHandle, check_write,
};

struct HeadlessBuffer {
    kind: VertexKind,
    label: String,
    bytes: Vec<u8>,
}

struct HeadlessTexture {
    width: u32,
    height: u32,
}

/// One recorded draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRecord {
    pub texture: TextureHandle,
    pub geometry: BufferHandle,
    pub shade: BufferHandle,
    pub span: DrawSpan,
}

/// A GPU context without a GPU.
pub struct HeadlessContext {
    buffers: ResourceSlab<HeadlessBuffer>,
    textures: ResourceSlab<HeadlessTexture>,
    writes: usize,
    bytes_written: usize,
    texture_uploads: usize,
    draws: Vec<DrawRecord>,
    write_fault: Option<BufferFault>,
    allocation_fault: Option<BufferFault>,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self {
            buffers: ResourceSlab::new(),
            textures: ResourceSlab::new(),
            writes: 0,
            bytes_written: 0,
            texture_uploads: 0,
            draws: Vec::new(),
            write_fault: None,
            allocation_fault: None,
        }
    }

    /// Drop every resource; all outstanding handles become invalid.
    pub fn lose_context(&mut self) {
        log::debug!(
            "Headless context lost ({} buffers, {} textures)",
            self.buffers.len(),
            self.textures.len()
        );
        self.buffers.invalidate_all();
        self.textures.invalidate_all();
    }

    /// Fail the next buffer write with `fault`.
    pub fn fail_next_write(&mut self, fault: BufferFault) {
        self.write_fault = Some(fault);
    }

    /// Fail the next buffer allocation with `fault`.
    pub fn fail_next_allocation(&mut self, fault: BufferFault) {
        self.allocation_fault = Some(fault);
    }

    /// Successful buffer writes since the last [`reset_counters`](Self::reset_counters).
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn texture_uploads(&self) -> usize {
        self.texture_uploads
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn reset_counters(&mut self) {
        self.writes = 0;
        self.bytes_written = 0;
        self.texture_uploads = 0;
        self.draws.clear();
    }

    /// Current contents of a live buffer.
    pub fn buffer_bytes(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers
            .get(handle.id(), handle.generation())
            .map(|buffer| buffer.bytes.as_slice())
    }

    pub fn buffer_label(&self, handle: BufferHandle) -> Option<&str> {
        self.buffers
            .get(handle.id(), handle.generation())
            .map(|buffer| buffer.label.as_str())
    }

    pub fn buffer_kind(&self, handle: BufferHandle) -> Option<VertexKind> {
        self.buffers
            .get(handle.id(), handle.generation())
            .map(|buffer| buffer.kind)
    }

    pub fn texture_size(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.textures
            .get(handle.id(), handle.generation())
            .map(|texture| (texture.width, texture.height))
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }
}

impl GpuContext for HeadlessContext {
    fn allocate_buffer(
        &mut self,
        vertex_count: usize,
        kind: VertexKind,
        label: &str,
    ) -> Result<BufferHandle, BufferFault> {
        if let Some(fault) = self.allocation_fault.take() {
            return Err(fault);
        }
        let size = vertex_count
            .checked_mul(kind.stride())
            .ok_or_else(|| BufferFault::Allocation(format!("{label}: size overflow")))?;
        Ok(self.buffers.buffer_handle(HeadlessBuffer {
            kind,
            label: label.to_string(),
            bytes: vec![0; size],
        }))
    }

    fn write_buffer(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), BufferFault> {
        if let Some(fault) = self.write_fault.take() {
            return Err(fault);
        }
        let buffer = self
            .buffers
            .get_mut(handle.id(), handle.generation())
            .ok_or(BufferFault::InvalidHandle)?;
        check_write(offset, bytes.len(), buffer.bytes.len() as u64)?;

        let start = offset as usize;
        buffer.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        self.writes += 1;
        self.bytes_written += bytes.len();
        Ok(())
    }

    fn allocate_texture(
        &mut self,
        width: u32,
        height: u32,
        texels: &[u16],
        label: &str,
    ) -> Result<TextureHandle, BufferFault> {
        if let Some(fault) = self.allocation_fault.take() {
            return Err(fault);
        }
        if texels.len() != width as usize * height as usize {
            return Err(BufferFault::Allocation(format!(
                "{label}: {} texels for a {width}x{height} texture",
                texels.len()
            )));
        }
        self.texture_uploads += 1;
        Ok(self
            .textures
            .texture_handle(HeadlessTexture { width, height }))
    }

    fn is_buffer_valid(&self, handle: BufferHandle) -> bool {
        self.buffers.get(handle.id(), handle.generation()).is_some()
    }

    fn is_texture_valid(&self, handle: TextureHandle) -> bool {
        self.textures.get(handle.id(), handle.generation()).is_some()
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        self.buffers.remove(handle.id(), handle.generation());
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(handle.id(), handle.generation());
    }

    fn draw_triangles(
        &mut self,
        texture: TextureHandle,
        geometry: BufferHandle,
        shade: BufferHandle,
        span: DrawSpan,
    ) -> Result<(), BufferFault> {
        if !self.is_texture_valid(texture)
            || !self.is_buffer_valid(geometry)
            || !self.is_buffer_valid(shade)
        {
            return Err(BufferFault::InvalidHandle);
        }
        self.draws.push(DrawRecord {
            texture,
            geometry,
            shade,
            span,
        });
        Ok(())
    }
}
