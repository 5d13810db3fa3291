//! [`GpuContext`] backed by wgpu, rendering into an offscreen target.

use std::num::NonZeroU64;

use glam::{Mat4, Vec4};
use tessera_atlas::rgb565_to_rgba8;
use tessera_config::ShadeEncoding;
use tessera_mesh::{
    DISTANCE_X, DISTANCE_Y, GEOMETRY_LAYOUT, GeometryVertex, SHADE_FLOAT_LAYOUT,
    SHADE_PACKED_LAYOUT, VertexKind,
};

use crate::gpu::{
    BufferFault, BufferHandle, DrawSpan, GpuContext, ResourceSlab, TextureHandle, check_write,
};

/// Terrain shader. `vs_float` and `vs_packed` differ only in the shade input.
pub const TERRAIN_SHADER_SOURCE: &str = r#"
struct Projection {
    matrix: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> projection: Projection;
@group(1) @binding(0) var atlas: texture_2d<f32>;
@group(1) @binding(1) var atlas_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) shade: f32,
};

fn project(pos: vec2<f32>, height: f32, uv: vec2<f32>, shade: f32) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = projection.matrix * vec4<f32>(pos, height, 1.0);
    out.uv = uv;
    out.shade = shade;
    return out;
}

@vertex
fn vs_float(
    @location(0) pos: vec2<f32>,
    @location(1) height: f32,
    @location(2) uv: vec2<f32>,
    @location(3) shade: f32,
) -> VertexOutput {
    return project(pos, height, uv, shade);
}

@vertex
fn vs_packed(
    @location(0) pos: vec2<f32>,
    @location(1) height: f32,
    @location(2) uv: vec2<f32>,
    @location(3) shade: vec4<f32>,
) -> VertexOutput {
    return project(pos, height, uv, shade.r);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(atlas, atlas_sampler, in.uv);
    return vec4<f32>(color.rgb * in.shade, 1.0);
}
"#;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Error type for wgpu context creation.
#[derive(Debug, thiserror::Error)]
pub enum WgpuContextError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ProjectionUniform {
    matrix: [[f32; 4]; 4],
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    kind: VertexKind,
    size: u64,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// Projection from grid coordinates to clip space for a screen window.
///
/// Grid point `(x, y)` sits at world pixel `(32x - 16y, 16y)`. `(left, top)`
/// is the world pixel at the top-left of the window. Terrain height lifts a
/// point `height_scale` pixels up the screen per unit.
pub fn terrain_view(left: f32, top: f32, width: f32, height: f32, height_scale: f32) -> Mat4 {
    let ortho = Mat4::orthographic_rh(left, left + width, top + height, top, -1.0, 1.0);
    let (dx, dy) = (DISTANCE_X as f32, DISTANCE_Y as f32);
    let grid_to_world = Mat4::from_cols(
        Vec4::new(dx, 0.0, 0.0, 0.0),
        Vec4::new(-dx / 2.0, dy, 0.0, 0.0),
        Vec4::new(0.0, -height_scale, 0.0, 0.0),
        Vec4::W,
    );
    ortho * grid_to_world
}

/// wgpu resources for the terrain: vertex buffers, atlas textures, one
/// pipeline per shade encoding, and an offscreen color target.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: ResourceSlab<GpuBuffer>,
    textures: ResourceSlab<GpuTexture>,
    float_pipeline: wgpu::RenderPipeline,
    packed_pipeline: wgpu::RenderPipeline,
    projection_buffer: wgpu::Buffer,
    projection_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuContext {
    /// Create a context on a new device, rendering into a `width x height` target.
    pub async fn headless(width: u32, height: u32) -> Result<Self, WgpuContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| WgpuContextError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessera-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self::from_device(device, queue, width, height))
    }

    /// Blocking wrapper around [`WgpuContext::headless`].
    pub fn headless_blocking(width: u32, height: u32) -> Result<Self, WgpuContextError> {
        pollster::block_on(Self::headless(width, height))
    }

    /// Create a context on an existing device.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let projection_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("terrain-projection-bind-group-layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(size_of::<ProjectionUniform>() as u64),
                    },
                    count: None,
                }],
            });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("terrain-atlas-bind-group-layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let projection_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain-projection"),
            size: size_of::<ProjectionUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let projection_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain-projection-bind-group"),
            layout: &projection_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: projection_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("terrain-atlas-sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain-shader"),
            source: wgpu::ShaderSource::Wgsl(TERRAIN_SHADER_SOURCE.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain-pipeline-layout"),
            bind_group_layouts: &[&projection_bind_group_layout, &texture_bind_group_layout],
            immediate_size: 0,
        });

        let float_pipeline = terrain_pipeline(
            &device,
            &shader,
            &pipeline_layout,
            ShadeEncoding::Float,
        );
        let packed_pipeline = terrain_pipeline(
            &device,
            &shader,
            &pipeline_layout,
            ShadeEncoding::PackedRgba8,
        );

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("terrain-target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            device,
            queue,
            buffers: ResourceSlab::new(),
            textures: ResourceSlab::new(),
            float_pipeline,
            packed_pipeline,
            projection_buffer,
            projection_bind_group,
            texture_bind_group_layout,
            sampler,
            target,
            target_view,
            encoder: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The offscreen color target draws land in.
    pub fn target(&self) -> &wgpu::Texture {
        &self.target
    }

    /// Start recording a frame: set the projection and clear the target.
    pub fn begin_frame(&mut self, projection: Mat4) {
        let uniform = ProjectionUniform {
            matrix: projection.to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.projection_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("terrain-frame"),
            });
        let clear_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("terrain-clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        drop(clear_pass);
        self.encoder = Some(encoder);
    }

    /// Submit everything recorded since [`begin_frame`](Self::begin_frame).
    pub fn end_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    /// Drop every buffer and texture; all outstanding handles become invalid.
    pub fn lose_context(&mut self) {
        log::warn!(
            "Dropping {} buffers and {} textures",
            self.buffers.len(),
            self.textures.len()
        );
        self.encoder = None;
        self.buffers.invalidate_all();
        self.textures.invalidate_all();
    }
}

fn terrain_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    encoding: ShadeEncoding,
) -> wgpu::RenderPipeline {
    let (label, entry_point, shade_layout) = match encoding {
        ShadeEncoding::Float => ("terrain-pipeline-float", "vs_float", SHADE_FLOAT_LAYOUT),
        ShadeEncoding::PackedRgba8 => ("terrain-pipeline-packed", "vs_packed", SHADE_PACKED_LAYOUT),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(entry_point),
            buffers: &[GEOMETRY_LAYOUT, shade_layout],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

impl GpuContext for WgpuContext {
    fn allocate_buffer(
        &mut self,
        vertex_count: usize,
        kind: VertexKind,
        label: &str,
    ) -> Result<BufferHandle, BufferFault> {
        let size = vertex_count
            .checked_mul(kind.stride())
            .ok_or_else(|| BufferFault::Allocation(format!("{label}: size overflow")))?
            as u64;
        if size > self.device.limits().max_buffer_size {
            return Err(BufferFault::Allocation(format!(
                "{label}: {size} bytes exceeds the device limit"
            )));
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(self.buffers.buffer_handle(GpuBuffer { buffer, kind, size }))
    }

    fn write_buffer(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), BufferFault> {
        let buffer = self
            .buffers
            .get(handle.id(), handle.generation())
            .ok_or(BufferFault::InvalidHandle)?;
        check_write(offset, bytes.len(), buffer.size)?;
        debug_assert!(
            offset % wgpu::COPY_BUFFER_ALIGNMENT == 0
                && bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0,
            "unaligned buffer write"
        );
        self.queue.write_buffer(&buffer.buffer, offset, bytes);
        Ok(())
    }

    fn allocate_texture(
        &mut self,
        width: u32,
        height: u32,
        texels: &[u16],
        label: &str,
    ) -> Result<TextureHandle, BufferFault> {
        if width == 0 || height == 0 || texels.len() != width as usize * height as usize {
            return Err(BufferFault::Allocation(format!(
                "{label}: {} texels for a {width}x{height} texture",
                texels.len()
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ATLAS_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let rgba: Vec<u8> = texels.iter().flat_map(|&t| rgb565_to_rgba8(t)).collect();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: None,
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        log::debug!("Uploaded {label} ({width}x{height})");
        Ok(self.textures.texture_handle(GpuTexture {
            _texture: texture,
            bind_group,
        }))
    }

    fn is_buffer_valid(&self, handle: BufferHandle) -> bool {
        self.buffers.get(handle.id(), handle.generation()).is_some()
    }

    fn is_texture_valid(&self, handle: TextureHandle) -> bool {
        self.textures.get(handle.id(), handle.generation()).is_some()
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(handle.id(), handle.generation()) {
            buffer.buffer.destroy();
        }
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
        let geometry = self
            .buffers
            .get(geometry.id(), geometry.generation())
            .ok_or(BufferFault::InvalidHandle)?;
        let shade = self
            .buffers
            .get(shade.id(), shade.generation())
            .ok_or(BufferFault::InvalidHandle)?;
        let texture = self
            .textures
            .get(texture.id(), texture.generation())
            .ok_or(BufferFault::InvalidHandle)?;

        let pipeline = match shade.kind {
            VertexKind::Shade(ShadeEncoding::PackedRgba8) => &self.packed_pipeline,
            _ => &self.float_pipeline,
        };
        let vertex_count = (geometry.size / size_of::<GeometryVertex>() as u64) as u32;

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("terrain-frame"),
            })
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("terrain-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.projection_bind_group, &[]);
        pass.set_bind_group(1, &texture.bind_group, &[]);
        pass.set_vertex_buffer(0, geometry.buffer.slice(..));
        pass.set_vertex_buffer(1, shade.buffer.slice(..));
        for vertices in span.vertex_ranges(vertex_count) {
            pass.draw(vertices, 0..1);
        }
        Ok(())
    }
}
