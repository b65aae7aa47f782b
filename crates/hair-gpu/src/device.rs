//! Device and presentation interfaces
//!
//! These are the only seams between the frame/simulation logic and a native
//! graphics API. Resources are created from plain descriptions and named by
//! typed handles; command lists are recorded into a [`CommandRecorder`] and
//! handed back through [`Device::submit`].

use crate::command::CommandRecorder;
use crate::error::GpuResult;
use crate::handles::*;
use crate::sync::{SemaphoreWait, Stages};
use bitflags::bitflags;
use std::borrow::Cow;
use std::time::Duration;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const STORAGE = 1 << 2;
        const UNIFORM = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

/// Where a buffer lives.
///
/// Host-visible buffers accept `write_buffer`/`read_buffer` directly;
/// device-local ones can only be filled by a recorded copy (see [`crate::upload`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    HostVisible,
    DeviceLocal,
}

#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub label: Cow<'static, str>,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Depth32Float,
}

impl ImageFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsage: u32 {
        const COLOR_ATTACHMENT = 1 << 0;
        const DEPTH_ATTACHMENT = 1 << 1;
        const SAMPLED = 1 << 2;
        const TRANSFER_SRC = 1 << 3;
    }
}

#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub label: Cow<'static, str>,
    pub format: ImageFormat,
    pub extent: Extent2d,
    pub usage: ImageUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAspect {
    Color,
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageViewKind {
    D2,
    D2Array,
}

#[derive(Debug, Clone)]
pub struct ImageViewDesc {
    pub label: Cow<'static, str>,
    pub image: ImageId,
    pub aspect: ImageAspect,
    pub kind: ImageViewKind,
}

/// Single-subpass render pass: one colour attachment, optional depth, both cleared on load
#[derive(Debug, Clone)]
pub struct RenderPassDesc {
    pub label: Cow<'static, str>,
    pub color_format: ImageFormat,
    pub depth_format: Option<ImageFormat>,
    pub clear_color: [f64; 4],
    pub clear_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Read-only storage buffer
    StorageRead,
    /// Read-write storage buffer
    Storage,
    Uniform,
}

/// Buffer bindings `0..bindings.len()` of one descriptor set
#[derive(Debug, Clone)]
pub struct DescriptorLayoutDesc {
    pub label: Cow<'static, str>,
    pub visibility: Stages,
    pub bindings: Vec<BindingKind>,
}

#[derive(Debug, Clone)]
pub struct DescriptorSetDesc {
    pub label: Cow<'static, str>,
    pub layout: DescriptorLayoutId,
    /// One buffer per layout binding, in binding order
    pub buffers: Vec<BufferId>,
}

/// Shader source in WGSL
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub label: Cow<'static, str>,
    pub source: Cow<'static, str>,
}

#[derive(Debug, Clone)]
pub struct ComputePipelineDesc {
    pub label: Cow<'static, str>,
    pub shader: ShaderDesc,
    pub entry_point: &'static str,
    pub descriptor_layouts: Vec<DescriptorLayoutId>,
    pub push_constant_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    LineStrip,
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub label: Cow<'static, str>,
    pub shader: ShaderDesc,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    pub render_pass: RenderPassId,
    pub vertex_layout: VertexLayout,
    pub topology: Topology,
    pub descriptor_layouts: Vec<DescriptorLayoutId>,
    pub push_constant_size: u32,
    pub push_constant_stages: Stages,
}

/// One batch of recorded work for the queue
pub struct Submission<'a> {
    pub recorder: &'a CommandRecorder,
    pub waits: &'a [SemaphoreWait],
    pub signals: &'a [SemaphoreId],
    pub fence: Option<FenceId>,
}

impl<'a> Submission<'a> {
    pub fn new(recorder: &'a CommandRecorder) -> Self {
        Self {
            recorder,
            waits: &[],
            signals: &[],
            fence: None,
        }
    }

    pub fn fence(mut self, fence: FenceId) -> Self {
        self.fence = Some(fence);
        self
    }
}

/// Resource creation, command submission and host synchronisation.
///
/// All work goes to a single queue and executes in submission order.
pub trait Device {
    fn create_buffer(&mut self, desc: &BufferDesc) -> GpuResult<BufferId>;
    /// Host-visible buffers only
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> GpuResult<()>;
    /// Host-visible buffers only
    fn read_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> GpuResult<Vec<u8>>;
    fn buffer_size(&self, buffer: BufferId) -> GpuResult<u64>;
    fn destroy_buffer(&mut self, buffer: BufferId) -> GpuResult<()>;

    fn create_image(&mut self, desc: &ImageDesc) -> GpuResult<ImageId>;
    fn create_image_view(&mut self, desc: &ImageViewDesc) -> GpuResult<ImageViewId>;
    fn destroy_image_view(&mut self, view: ImageViewId) -> GpuResult<()>;
    fn destroy_image(&mut self, image: ImageId) -> GpuResult<()>;

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> GpuResult<RenderPassId>;
    fn create_descriptor_layout(
        &mut self,
        desc: &DescriptorLayoutDesc,
    ) -> GpuResult<DescriptorLayoutId>;
    fn allocate_descriptor_set(&mut self, desc: &DescriptorSetDesc) -> GpuResult<DescriptorSetId>;
    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> GpuResult<PipelineId>;
    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc)
        -> GpuResult<PipelineId>;
    fn destroy_pipeline(&mut self, pipeline: PipelineId) -> GpuResult<()>;
    fn destroy_descriptor_set(&mut self, set: DescriptorSetId) -> GpuResult<()>;
    fn destroy_descriptor_layout(&mut self, layout: DescriptorLayoutId) -> GpuResult<()>;
    fn destroy_render_pass(&mut self, pass: RenderPassId) -> GpuResult<()>;

    fn create_fence(&mut self, signaled: bool) -> GpuResult<FenceId>;
    /// Block until `fence` is signaled. `None` waits forever.
    fn wait_fence(&mut self, fence: FenceId, timeout: Option<Duration>) -> GpuResult<()>;
    fn reset_fence(&mut self, fence: FenceId) -> GpuResult<()>;
    fn fence_signaled(&mut self, fence: FenceId) -> GpuResult<bool>;
    fn destroy_fence(&mut self, fence: FenceId) -> GpuResult<()>;

    fn create_semaphore(&mut self) -> GpuResult<SemaphoreId>;
    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) -> GpuResult<()>;

    fn create_recorder(&mut self, label: &str) -> GpuResult<CommandRecorder>;
    /// Return `recorder` to its initial state. Its last submission must have completed.
    fn reset_recorder(&mut self, recorder: &mut CommandRecorder) -> GpuResult<()>;
    fn submit(&mut self, submission: &Submission<'_>) -> GpuResult<()>;
    fn wait_idle(&mut self) -> GpuResult<()>;
}

/// Presentable surface images
pub trait Presenter {
    fn image_count(&self) -> u32;
    fn extent(&self) -> Extent2d;
    fn format(&self) -> ImageFormat;
    /// Claim the next image; `signal` is signaled once it may be rendered to.
    ///
    /// `timeout` bounds the wait where the backend can express one. wgpu has
    /// no per-call acquire timeout: `WgpuGpu` ignores it and reports the
    /// surface's own timeout as `GpuError::AcquireTimeout`.
    fn acquire_next_image(
        &mut self,
        signal: SemaphoreId,
        timeout: Option<Duration>,
    ) -> GpuResult<u32>;
    fn present(&mut self, image: u32, waits: &[SemaphoreId]) -> GpuResult<()>;
}
