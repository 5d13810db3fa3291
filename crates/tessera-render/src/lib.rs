//! Incremental terrain rendering: GPU context abstraction, headless and wgpu
//! backends, shade update strategies, and the terrain renderer itself.

pub mod gpu;
pub mod headless;
pub mod region;
pub mod renderer;
pub mod shade_cache;
pub mod tracker;
pub mod wgpu_context;

pub use gpu::{BufferFault, BufferHandle, DrawSpan, GpuContext, TextureHandle};
pub use headless::{DrawRecord, HeadlessContext};
pub use region::{VisibleRegion, VisibleRow};
pub use renderer::{DrawOutcome, TerrainRenderer};
pub use shade_cache::{
    AsyncShadeCache, RowSpans, ShadeParams, ShadeStrategy, SyncShadeCache, shade_strategy,
};
pub use tracker::ChangeTracker;
pub use wgpu_context::{TERRAIN_SHADER_SOURCE, WgpuContext, WgpuContextError, terrain_view};
